//! トピックに対するドキュメントの関連度スコアリング。
//!
//! スコアは以下の固定重みの合計:
//! - URL にトピックを含む → [`URL_MATCH`]（何回含まれても 1 回だけ）
//! - いずれかのメタデータ値にトピックを含む → [`METADATA_MATCH`]（マップ全体で 1 回だけ）
//! - 本文中の単語単位の一致 1 件ごと → [`CONTENT_MATCH_PER_OCCURRENCE`]
//!
//! 比較はすべて大文字小文字を区別しない。スコアが [`THRESHOLD`] 以上なら関連ありと判定する。
use regex::Regex;

use super::document::Document;

pub const THRESHOLD: u32 = 15;
pub const URL_MATCH: u32 = 20;
pub const METADATA_MATCH: u32 = 10;
pub const CONTENT_MATCH_PER_OCCURRENCE: u32 = 1;

/// 関連度判定器。状態を持たない。
#[derive(Debug, Clone, Copy, Default)]
pub struct RelevanceScorer;

impl RelevanceScorer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// トピックを一度だけ正規化・コンパイルした判定器を返す。
    ///
    /// 1 回の実行で同じトピックに対し多数のドキュメントを評価する場合はこちらを使う。
    #[must_use]
    pub fn for_topic<'a>(&self, topic: impl Into<Option<&'a str>>) -> TopicScorer {
        TopicScorer::new(topic.into())
    }

    /// `doc` の `topic` に対するスコアを返す。空または未指定のトピックは常に 0。
    #[must_use]
    pub fn score<'a>(&self, doc: &Document, topic: impl Into<Option<&'a str>>) -> u32 {
        self.for_topic(topic).score(doc)
    }

    #[must_use]
    pub fn is_relevant<'a>(&self, doc: &Document, topic: impl Into<Option<&'a str>>) -> bool {
        self.for_topic(topic).is_relevant(doc)
    }
}

/// 特定トピック用にコンパイル済みの判定器。
#[derive(Debug, Clone)]
pub struct TopicScorer {
    pattern: Option<TopicPattern>,
}

#[derive(Debug, Clone)]
struct TopicPattern {
    lowered: String,
    matcher: Regex,
}

impl TopicScorer {
    fn new(topic: Option<&str>) -> Self {
        let pattern = topic.filter(|t| !t.is_empty()).and_then(|t| {
            // escape 済みなので失敗しないが、念のため None 扱いにする
            Regex::new(&format!("(?i){}", regex::escape(t)))
                .ok()
                .map(|matcher| TopicPattern {
                    lowered: t.to_lowercase(),
                    matcher,
                })
        });
        Self { pattern }
    }

    #[must_use]
    pub fn score(&self, doc: &Document) -> u32 {
        let Some(pattern) = &self.pattern else {
            return 0;
        };

        let mut score = 0_u32;

        if doc.url().to_lowercase().contains(&pattern.lowered) {
            score += URL_MATCH;
        }

        if doc
            .metadata()
            .values()
            .any(|value| value.to_lowercase().contains(&pattern.lowered))
        {
            score += METADATA_MATCH;
        }

        let occurrences = u32::try_from(count_whole_word(&pattern.matcher, doc.content()))
            .unwrap_or(u32::MAX);
        score.saturating_add(occurrences.saturating_mul(CONTENT_MATCH_PER_OCCURRENCE))
    }

    #[must_use]
    pub fn is_relevant(&self, doc: &Document) -> bool {
        self.score(doc) >= THRESHOLD
    }
}

/// 前後が単語構成文字でない（または文字列の端である）一致だけを数える。
///
/// 境界を満たさない候補は 1 文字ずらして探索を続けるので、
/// 重なり合う位置にある正しい一致も取りこぼさない。
fn count_whole_word(matcher: &Regex, content: &str) -> usize {
    let mut count = 0;
    let mut pos = 0;

    while let Some(found) = matcher.find_at(content, pos) {
        let before = content[..found.start()].chars().next_back();
        let after = content[found.end()..].chars().next();

        if !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char) {
            count += 1;
            pos = found.end();
        } else {
            pos = found.start()
                + content[found.start()..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
        }

        if pos >= content.len() {
            break;
        }
    }

    count
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
