use std::collections::{BTreeMap, BTreeSet};

use crate::types::GroupInfo;

/// Groups under moderation, plus the catalog of groups the account is in
#[derive(Debug, Clone, Default)]
pub struct GroupRegistry {
    active: BTreeSet<String>,
    catalog: BTreeMap<String, GroupInfo>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_active(groups: Vec<String>) -> Self {
        Self {
            active: groups.into_iter().collect(),
            catalog: BTreeMap::new(),
        }
    }

    /// Returns false if the group was already active
    pub fn activate(&mut self, group_id: &str) -> bool {
        self.active.insert(group_id.to_string())
    }

    /// Returns false if the group was not active
    pub fn deactivate(&mut self, group_id: &str) -> bool {
        self.active.remove(group_id)
    }

    pub fn is_active(&self, group_id: &str) -> bool {
        self.active.contains(group_id)
    }

    pub fn active_groups(&self) -> Vec<String> {
        self.active.iter().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Replace the catalog with a fresh listing from the gateway
    pub fn set_catalog(&mut self, groups: Vec<GroupInfo>) {
        self.catalog = groups.into_iter().map(|g| (g.id.clone(), g)).collect();
    }

    pub fn catalog(&self) -> impl Iterator<Item = &GroupInfo> {
        self.catalog.values()
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }
}
