use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Running aggregate for one calendar day. Neutral items are implicit:
/// `count - positive - negative`. This is a cache over the stored item
/// collection and is always re-derivable by a full fold, so deserialization
/// tolerates missing fields instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyStats {
    pub count: u64,
    pub positive: u64,
    pub negative: u64,
    pub topics: BTreeMap<String, u64>,
}

impl DailyStats {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn neutral(&self) -> u64 {
        self.count.saturating_sub(self.positive + self.negative)
    }
}
