//! 중복 판정 정책
//!
//! 루프 안의 overlap 검사와 종료 후 정리 패스가 같은 [`DuplicatePolicy`]를
//! 사용합니다. 어느 단계에 어떤 정책을 쓸지는 세션 설정에서 고릅니다.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::transaction::TransactionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Equal `transaction` field
    KeyOnly,
    /// Equal account, transaction, amount and currency
    FullField,
}

impl DuplicatePolicy {
    pub fn is_duplicate(self, a: &TransactionRecord, b: &TransactionRecord) -> bool {
        match self {
            Self::KeyOnly => a.key() == b.key(),
            Self::FullField => a.same_fields(b),
        }
    }
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "key_only" | "key" => Ok(Self::KeyOnly),
            "full_field" | "full" => Ok(Self::FullField),
            other => Err(format!("unknown duplicate policy: {other}")),
        }
    }
}

/// Records bucketed by key so both policies avoid a quadratic scan.
#[derive(Debug, Default)]
struct KeyIndex<'a> {
    by_key: HashMap<&'a str, Vec<&'a TransactionRecord>>,
}

impl<'a> KeyIndex<'a> {
    fn contains(&self, record: &TransactionRecord, policy: DuplicatePolicy) -> bool {
        self.by_key.get(record.key()).is_some_and(|bucket| {
            bucket
                .iter()
                .any(|existing| policy.is_duplicate(existing, record))
        })
    }

    fn insert(&mut self, record: &'a TransactionRecord) {
        self.by_key.entry(record.key()).or_default().push(record);
    }
}

/// First record of `incoming` that duplicates something already in `collected`.
///
/// Only checks against `collected`; duplicates inside `incoming` itself are left
/// to the final pass.
pub fn find_overlap<'a>(
    collected: &[TransactionRecord],
    incoming: &'a [TransactionRecord],
    policy: DuplicatePolicy,
) -> Option<&'a TransactionRecord> {
    if collected.is_empty() || incoming.is_empty() {
        return None;
    }
    match policy {
        DuplicatePolicy::KeyOnly => {
            let keys: HashSet<&str> = collected.iter().map(TransactionRecord::key).collect();
            incoming.iter().find(|record| keys.contains(record.key()))
        }
        DuplicatePolicy::FullField => {
            let mut index = KeyIndex::default();
            for record in collected {
                index.insert(record);
            }
            incoming.iter().find(|record| index.contains(record, policy))
        }
    }
}

/// Final cleanup result: first-seen records and the duplicates kept for audit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    pub unique: Vec<TransactionRecord>,
    pub duplicated: Vec<TransactionRecord>,
}

/// Split `records` into unique and duplicated, preserving first-seen order.
pub fn dedup_pass(records: &[TransactionRecord], policy: DuplicatePolicy) -> DedupOutcome {
    let mut index = KeyIndex::default();
    let mut outcome = DedupOutcome::default();

    for record in records {
        if index.contains(record, policy) {
            outcome.duplicated.push(record.clone());
        } else {
            index.insert(record);
            outcome.unique.push(record.clone());
        }
    }

    outcome
}
