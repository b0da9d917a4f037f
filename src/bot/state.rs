// src/bot/state.rs - Shared moderation state with write-through persistence

use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::bot::classifier::Classifier;
use crate::bot::engagement::{self, Membership};
use crate::bot::ledger::{InteractionLedger, WarningLedger};
use crate::bot::moderation::{self, Outcome, WarningTier};
use crate::bot::persistence::{PersistenceCoordinator, Snapshot};
use crate::bot::registry::GroupRegistry;
use crate::error::ControlError;
use crate::types::GroupInfo;

/// Every mutable container the bot owns
#[derive(Debug, Clone)]
pub struct ModerationState {
    pub registry: GroupRegistry,
    pub interactions: InteractionLedger,
    pub warnings: WarningLedger,
    pub classifier: Classifier,
}

impl Default for ModerationState {
    fn default() -> Self {
        Self {
            registry: GroupRegistry::new(),
            interactions: InteractionLedger::new(),
            warnings: WarningLedger::new(),
            classifier: Classifier::with_defaults(),
        }
    }
}

impl ModerationState {
    /// Rebuild from a snapshot; a snapshot without a word list keeps the classifier's words
    pub fn restore(snapshot: Snapshot, mut classifier: Classifier) -> Self {
        if let Some(words) = snapshot.offensive_words {
            classifier.set_words(words);
        }
        Self {
            registry: GroupRegistry::from_active(snapshot.active_groups),
            interactions: InteractionLedger::from_entries(snapshot.user_interactions),
            warnings: WarningLedger::from_entries(snapshot.user_warnings),
            classifier,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            active_groups: self.registry.active_groups(),
            user_interactions: self.interactions.entries(),
            user_warnings: self.warnings.entries(),
            offensive_words: Some(self.classifier.words().to_vec()),
        }
    }
}

/// What an administrative clear touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    Interactions,
    Warnings,
    All,
}

impl ClearScope {
    pub fn parse(raw: &str) -> Result<Self, ControlError> {
        match raw {
            "interactions" => Ok(ClearScope::Interactions),
            "warnings" => Ok(ClearScope::Warnings),
            "all" => Ok(ClearScope::All),
            other => Err(ControlError::Validation(format!("unknown clear scope '{}'", other))),
        }
    }
}

/// Aggregate counters for the control surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateStats {
    pub active_groups: usize,
    pub total_groups: usize,
    pub total_interactions: u64,
    pub total_warnings: u64,
    pub offensive_words_count: usize,
}

/// Handle onto the shared state.
///
/// All mutation goes through these methods: each takes the single write lock, applies the
/// change, and queues a snapshot with the persistence coordinator before returning.
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<RwLock<ModerationState>>,
    persistence: PersistenceCoordinator,
}

impl StateHandle {
    pub fn new(state: ModerationState, persistence: PersistenceCoordinator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
            persistence,
        }
    }

    /// Load the stored snapshot, falling back to an empty state around `classifier`
    pub async fn load(persistence: PersistenceCoordinator, classifier: Classifier) -> Self {
        let state = match persistence.load().await {
            Some(snapshot) => ModerationState::restore(snapshot, classifier),
            None => ModerationState {
                classifier,
                ..ModerationState::default()
            },
        };
        Self::new(state, persistence)
    }

    async fn mutate<T>(&self, apply: impl FnOnce(&mut ModerationState) -> T) -> T {
        let mut state = self.inner.write().await;
        let result = apply(&mut state);
        self.persistence.save(state.snapshot());
        result
    }

    /// Write the current state and wait for the store
    pub async fn flush(&self) -> bool {
        {
            // Queued under the lock so it cannot overtake a newer mutation
            let state = self.inner.read().await;
            self.persistence.save(state.snapshot());
        }
        self.persistence.flush().await
    }

    // Registry

    pub async fn is_active(&self, group_id: &str) -> bool {
        self.inner.read().await.registry.is_active(group_id)
    }

    pub async fn set_group_active(&self, group_id: &str, active: bool) -> bool {
        let changed = self
            .mutate(|state| {
                if active {
                    state.registry.activate(group_id)
                } else {
                    state.registry.deactivate(group_id)
                }
            })
            .await;
        info!("Group {} {}", group_id, if active { "activated" } else { "deactivated" });
        changed
    }

    /// The catalog is rebuilt from the gateway on every connect and is not persisted
    pub async fn set_catalog(&self, groups: Vec<GroupInfo>) {
        self.inner.write().await.registry.set_catalog(groups);
    }

    /// Catalog entries paired with their activation flag
    pub async fn groups(&self) -> Vec<(GroupInfo, bool)> {
        let state = self.inner.read().await;
        state
            .registry
            .catalog()
            .map(|g| (g.clone(), state.registry.is_active(&g.id)))
            .collect()
    }

    // Moderation

    /// Count and classify a group message. Activation is checked under the same lock.
    pub async fn evaluate(&self, group_id: &str, sender_id: &str, text: &str) -> Outcome {
        self.mutate(|state| moderation::evaluate(state, group_id, sender_id, text)).await
    }

    /// Count a message without classifying it (bot commands). `None` if the group is not active.
    pub async fn record_interaction(&self, group_id: &str, sender_id: &str) -> Option<u64> {
        self.mutate(|state| {
            state
                .registry
                .is_active(group_id)
                .then(|| state.interactions.record(sender_id))
        })
        .await
    }

    pub async fn interaction_count(&self, user_id: &str) -> u64 {
        self.inner.read().await.interactions.count(user_id)
    }

    pub async fn warning_tier(&self, user_id: &str) -> WarningTier {
        self.inner.read().await.warnings.tier(user_id)
    }

    pub async fn blocked_words(&self) -> Vec<String> {
        self.inner.read().await.classifier.words().to_vec()
    }

    pub async fn set_blocked_words(&self, words: Vec<String>) {
        let count = words.len();
        self.mutate(|state| state.classifier.set_words(words)).await;
        info!("Blocked word list updated ({} words)", count);
    }

    // Administrative clears

    pub async fn clear_warnings(&self, user_id: &str) -> bool {
        self.mutate(|state| state.warnings.clear_user(user_id)).await
    }

    pub async fn clear(&self, scope: ClearScope) {
        self.mutate(|state| {
            if scope != ClearScope::Warnings {
                state.interactions.clear();
            }
            if scope != ClearScope::Interactions {
                state.warnings.clear();
            }
        })
        .await;
        info!("Cleared {:?} data", scope);
    }

    // Engagement

    pub async fn ranking(&self, group_id: &str, members: Option<&[String]>, limit: usize) -> Vec<(String, u64)> {
        let membership = members.map(Membership::Members).unwrap_or(Membership::Heuristic);
        engagement::ranking(&self.inner.read().await.interactions, group_id, membership, limit)
    }

    pub async fn lurkers(&self, members: &[String], threshold: u64, limit: usize) -> Vec<(String, u64)> {
        engagement::lurkers(&self.inner.read().await.interactions, members, threshold, limit)
    }

    pub async fn stats(&self) -> StateStats {
        let state = self.inner.read().await;
        StateStats {
            active_groups: state.registry.active_count(),
            total_groups: state.registry.catalog_len(),
            total_interactions: state.interactions.total(),
            total_warnings: state.warnings.total(),
            offensive_words_count: state.classifier.words().len(),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.read().await.snapshot()
    }
}
