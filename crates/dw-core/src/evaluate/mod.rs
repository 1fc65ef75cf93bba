//! Retention evaluation.
//!
//! Evaluators are pure: they read a snapshot, a policy and a single `now`
//! and produce a [`DecisionSet`] without touching the runtime. Every
//! verdict carries the [`Reason`] of the rule that settled it.
//!
//! # Rule precedence
//!
//! ```text
//! images:     age  →  parent  →  keep-list  →  in use      (later wins)
//! containers: state gate  →  finish time  →  keep-list     (later wins)
//! ```

pub mod container;
pub mod image;

pub use container::evaluate_containers;
pub use image::{entry_protects, evaluate_images, first_colon_prefix, keep_list_match, repository};

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Per-record outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Keep,
    Remove,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Keep => write!(f, "keep"),
            Decision::Remove => write!(f, "remove"),
        }
    }
}

/// The rule that settled a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Reason {
    /// Older than the configured lifetime.
    Expired { age_secs: i64 },
    WithinLifetime { age_secs: i64 },
    /// Creation time missing or unparsable.
    AgeUnknown,
    /// Base of at least one other image in the snapshot.
    ParentOfOther { children: usize },
    KeepListed { entry: String },
    /// Referenced by containers.
    InUse { containers: u32 },
    /// Container state outside `exited`/`created`.
    NotEligible { state: String },
    /// No usable completion time.
    NeverFinished,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Expired { age_secs } => write!(f, "expired (age {}s)", age_secs),
            Reason::WithinLifetime { age_secs } => {
                write!(f, "within lifetime (age {}s)", age_secs)
            }
            Reason::AgeUnknown => write!(f, "age unknown"),
            Reason::ParentOfOther { children } => {
                write!(f, "parent of {} image(s)", children)
            }
            Reason::KeepListed { entry } => write!(f, "keep-listed by {:?}", entry),
            Reason::InUse { containers } => write!(f, "used by {} container(s)", containers),
            Reason::NotEligible { state } => write!(f, "state {} is not removable", state),
            Reason::NeverFinished => write!(f, "never finished"),
        }
    }
}

/// A decision and the rule behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: Reason,
}

impl Verdict {
    pub fn keep(reason: Reason) -> Self {
        Self {
            decision: Decision::Keep,
            reason,
        }
    }

    pub fn remove(reason: Reason) -> Self {
        Self {
            decision: Decision::Remove,
            reason,
        }
    }

    pub fn is_remove(&self) -> bool {
        self.decision == Decision::Remove
    }
}

/// Verdicts keyed by record ID, in snapshot order.
#[derive(Debug, Clone)]
pub struct DecisionSet<K> {
    entries: Vec<(K, Verdict)>,
    index: HashMap<K, usize>,
}

impl<K: Clone + Eq + Hash> Default for DecisionSet<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> DecisionSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verdict. A repeated key replaces the earlier verdict in place.
    pub fn insert(&mut self, key: K, verdict: Verdict) {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = verdict,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, verdict));
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<&Verdict> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn decision(&self, key: &K) -> Option<Decision> {
        self.get(key).map(|v| v.decision)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Verdict)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// IDs marked for removal, in snapshot order.
    pub fn removals(&self) -> impl Iterator<Item = &K> {
        self.iter().filter(|(_, v)| v.is_remove()).map(|(k, _)| k)
    }

    pub fn keeps(&self) -> impl Iterator<Item = &K> {
        self.iter().filter(|(_, v)| !v.is_remove()).map(|(k, _)| k)
    }

    pub fn removal_count(&self) -> usize {
        self.removals().count()
    }

    pub fn keep_count(&self) -> usize {
        self.len() - self.removal_count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_set_preserves_order_and_replaces() {
        let mut set = DecisionSet::new();
        set.insert("b", Verdict::remove(Reason::Expired { age_secs: 10 }));
        set.insert("a", Verdict::keep(Reason::AgeUnknown));
        set.insert("c", Verdict::remove(Reason::Expired { age_secs: 20 }));
        set.insert("b", Verdict::keep(Reason::InUse { containers: 1 }));

        assert_eq!(set.len(), 3);
        assert_eq!(set.removals().copied().collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(set.keeps().copied().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(set.decision(&"b"), Some(Decision::Keep));
        assert_eq!(set.keep_count(), 2);
        assert!(set.get(&"z").is_none());
    }

    #[test]
    fn reasons_serialize_with_rule_tag() {
        let json = serde_json::to_value(Reason::KeepListed {
            entry: "myapp".into(),
        })
        .unwrap();
        assert_eq!(json["rule"], "keep_listed");
        assert_eq!(json["entry"], "myapp");
    }
}
