use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use crate::config::OverlapPolicy;

/// トピックごとの実行中フラグ。
///
/// キーは前後の空白を除いて小文字化したトピック。スコアリングが大文字小文字を区別しないので、
/// `Science` と `science` は同じ実行として扱う。
#[derive(Debug, Clone)]
pub(crate) struct TopicLocks {
    policy: OverlapPolicy,
    active: Arc<Mutex<HashSet<String>>>,
}

/// 実行枠。drop されるとトピックの実行中フラグを下ろす。
#[derive(Debug)]
#[must_use = "dropping the permit releases the topic immediately"]
pub struct RunPermit {
    held: Option<(Arc<Mutex<HashSet<String>>>, String)>,
}

impl TopicLocks {
    pub(crate) fn new(policy: OverlapPolicy) -> Self {
        Self {
            policy,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub(crate) fn try_acquire(&self, topic: &str) -> Option<RunPermit> {
        if self.policy == OverlapPolicy::Allow {
            return Some(RunPermit { held: None });
        }

        let key = topic.trim().to_lowercase();
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.clone()) {
            return None;
        }

        Some(RunPermit {
            held: Some((Arc::clone(&self.active), key)),
        })
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        if let Some((active, key)) = self.held.take() {
            active
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        }
    }
}
