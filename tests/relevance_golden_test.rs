// 固定ケースを用いた関連度スコアの回帰テスト。
use std::{collections::HashMap, fs, path::PathBuf};

use ingest_worker::pipeline::{Document, RelevanceScorer};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GoldenCase {
    id: String,
    topic: String,
    url: String,
    content: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    expected_score: u32,
    expected_relevant: bool,
}

fn load_cases() -> Vec<GoldenCase> {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data/relevance_golden.json");
    let raw = fs::read_to_string(path).expect("failed to read golden dataset");
    serde_json::from_str(&raw).expect("failed to parse golden dataset")
}

#[test]
fn golden_cases_score_as_expected() {
    let cases = load_cases();
    assert!(!cases.is_empty(), "golden dataset must contain at least one case");

    let scorer = RelevanceScorer::new();
    for case in cases {
        let document = Document::new(case.id.clone())
            .expect("golden case ids are non-empty")
            .with_url(case.url)
            .with_content(case.content)
            .with_metadata(case.metadata);

        assert_eq!(
            scorer.score(&document, case.topic.as_str()),
            case.expected_score,
            "score mismatch for case {}",
            case.id
        );
        assert_eq!(
            scorer.is_relevant(&document, case.topic.as_str()),
            case.expected_relevant,
            "relevance mismatch for case {}",
            case.id
        );
    }
}
