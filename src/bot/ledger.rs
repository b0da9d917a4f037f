use indexmap::IndexMap;

use crate::bot::moderation::WarningTier;

/// Messages evaluated per user, kept in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionLedger {
    counts: IndexMap<String, u64>,
}

impl InteractionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<(String, u64)>) -> Self {
        Self {
            counts: entries.into_iter().collect(),
        }
    }

    /// Count one more message for `user_id`, returning the new total
    pub fn record(&mut self, user_id: &str) -> u64 {
        let count = self.counts.entry(user_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Users never seen count as zero
    pub fn count(&self, user_id: &str) -> u64 {
        self.counts.get(user_id).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.counts.iter()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn entries(&self) -> Vec<(String, u64)> {
        self.counts.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

/// Current escalation tier per user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarningLedger {
    tiers: IndexMap<String, WarningTier>,
}

impl WarningLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from persisted strike counts
    pub fn from_entries(entries: Vec<(String, u64)>) -> Self {
        Self {
            tiers: entries
                .into_iter()
                .map(|(user, strikes)| (user, WarningTier::from_strikes(strikes)))
                .collect(),
        }
    }

    pub fn tier(&self, user_id: &str) -> WarningTier {
        self.tiers.get(user_id).copied().unwrap_or_default()
    }

    pub fn set(&mut self, user_id: &str, tier: WarningTier) {
        self.tiers.insert(user_id.to_string(), tier);
    }

    /// Forget a user's warnings; returns whether the user had an entry
    pub fn clear_user(&mut self, user_id: &str) -> bool {
        self.tiers.shift_remove(user_id).is_some()
    }

    pub fn clear(&mut self) {
        self.tiers.clear();
    }

    /// Sum of outstanding strikes across all users
    pub fn total(&self) -> u64 {
        self.tiers.values().map(|t| t.strikes()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn entries(&self) -> Vec<(String, u64)> {
        self.tiers.iter().map(|(k, v)| (k.clone(), v.strikes())).collect()
    }
}
