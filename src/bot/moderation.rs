// src/bot/moderation.rs - Warning escalation state machine

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::bot::classifier::ViolationKind;
use crate::bot::state::ModerationState;
use crate::types::{user_number, OutboundText};

/// Unresolved warnings a user has accumulated.
///
/// The cycle is `Clear -> FirstWarning -> SecondWarning -> Clear`; the third violation
/// fires the punishment and starts over, so there is no tier above `SecondWarning`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningTier {
    #[default]
    Clear,
    FirstWarning,
    SecondWarning,
}

/// Notice level emitted for a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Escalation {
    FirstWarning,
    SecondWarning,
    Punishment,
}

impl WarningTier {
    /// Transition table: tier before the violation -> (tier after, notice to emit)
    pub fn escalate(self) -> (WarningTier, Escalation) {
        match self {
            WarningTier::Clear => (WarningTier::FirstWarning, Escalation::FirstWarning),
            WarningTier::FirstWarning => (WarningTier::SecondWarning, Escalation::SecondWarning),
            WarningTier::SecondWarning => (WarningTier::Clear, Escalation::Punishment),
        }
    }

    pub fn strikes(self) -> u64 {
        match self {
            WarningTier::Clear => 0,
            WarningTier::FirstWarning => 1,
            WarningTier::SecondWarning => 2,
        }
    }

    /// Persisted counts above two collapse into the last tier
    pub fn from_strikes(strikes: u64) -> Self {
        match strikes {
            0 => WarningTier::Clear,
            1 => WarningTier::FirstWarning,
            _ => WarningTier::SecondWarning,
        }
    }
}

/// Outcome of a violation, addressed to the group it happened in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub group_id: String,
    pub user_id: String,
    pub kind: ViolationKind,
    pub escalation: Escalation,
}

impl Notice {
    pub fn render(&self) -> OutboundText {
        let number = user_number(&self.user_id);
        let reason = self.kind.describe();

        let text = match self.escalation {
            Escalation::FirstWarning => format!(
                "⚠️ *Primeiro aviso!*\n\n@{} por favor evite usar {} no grupo.\n\n🤝 Vamos manter o respeito entre todos!",
                number, reason
            ),
            Escalation::SecondWarning => format!(
                "🚨 *Segundo aviso!*\n\n@{} já te avisei sobre {}!\n\n😤 Se não parar, vai levar uma surra de chibata de boi! 🐂💢",
                number, reason
            ),
            Escalation::Punishment => format!(
                "💥 *TERCEIRO AVISO - CHIBATA DE BOI!* 💥\n\n@{} EU AVISEI! \n\n🐂💢 *TOMOU CHIBATADA VIRTUAL!* 💢🐂\n*ZUPT ZUPT ZUPT ZUPT ZUPT!*\n\n🔥 Agora para com isso ou vai ser pior! \n(Avisos resetados, mas fique esperto!)",
                number
            ),
        };

        OutboundText::new(&self.group_id, text).mentioning(vec![self.user_id.clone()])
    }
}

/// What happened to an evaluated message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Group is not moderated; nothing was recorded
    Ignored,
    Counted,
    Warned(Notice),
}

impl Outcome {
    pub fn notice(self) -> Option<Notice> {
        match self {
            Outcome::Warned(notice) => Some(notice),
            _ => None,
        }
    }
}

/// Evaluate one group message.
///
/// Messages from groups that are not active are ignored. Otherwise every call counts toward
/// the sender's interactions, and a classified violation advances the sender's tier.
pub fn evaluate(state: &mut ModerationState, group_id: &str, sender_id: &str, text: &str) -> Outcome {
    if !state.registry.is_active(group_id) {
        return Outcome::Ignored;
    }

    let count = state.interactions.record(sender_id);
    debug!("{} now has {} interactions", sender_id, count);

    let kind = match state.classifier.classify(text) {
        Some(kind) => kind,
        None => return Outcome::Counted,
    };
    let (next, escalation) = state.warnings.tier(sender_id).escalate();
    state.warnings.set(sender_id, next);

    warn!("{} violation by {} in {}: {:?}", kind.describe(), sender_id, group_id, escalation);

    Outcome::Warned(Notice {
        group_id: group_id.to_string(),
        user_id: sender_id.to_string(),
        kind,
        escalation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = "120363@g.us";
    const ALICE: &str = "5511999@s.whatsapp.net";

    fn active_state() -> ModerationState {
        let mut state = ModerationState::default();
        state.registry.activate(GROUP);
        state
    }

    #[test]
    fn test_transition_table_wraps() {
        assert_eq!(WarningTier::Clear.escalate(), (WarningTier::FirstWarning, Escalation::FirstWarning));
        assert_eq!(WarningTier::FirstWarning.escalate(), (WarningTier::SecondWarning, Escalation::SecondWarning));
        assert_eq!(WarningTier::SecondWarning.escalate(), (WarningTier::Clear, Escalation::Punishment));
    }

    #[test]
    fn test_three_strikes_cycle() {
        let mut state = active_state();

        let levels: Vec<Escalation> = (0..3)
            .map(|_| evaluate(&mut state, GROUP, ALICE, "porra").notice().unwrap().escalation)
            .collect();

        assert_eq!(levels, vec![Escalation::FirstWarning, Escalation::SecondWarning, Escalation::Punishment]);
        assert_eq!(state.warnings.tier(ALICE), WarningTier::Clear);
        assert_eq!(state.interactions.count(ALICE), 3);
    }

    #[test]
    fn test_fourth_violation_starts_new_cycle() {
        let mut state = active_state();
        for _ in 0..3 {
            evaluate(&mut state, GROUP, ALICE, "merda");
        }
        let notice = evaluate(&mut state, GROUP, ALICE, "merda").notice().unwrap();
        assert_eq!(notice.escalation, Escalation::FirstWarning);
        assert_eq!(state.warnings.tier(ALICE), WarningTier::FirstWarning);
    }

    #[test]
    fn test_fourth_violation_after_second_tier_repeats_punishment() {
        let mut state = active_state();
        state.warnings.set(ALICE, WarningTier::SecondWarning);
        assert_eq!(evaluate(&mut state, GROUP, ALICE, "idiota").notice().unwrap().escalation, Escalation::Punishment);
        state.warnings.set(ALICE, WarningTier::SecondWarning);
        assert_eq!(evaluate(&mut state, GROUP, ALICE, "idiota").notice().unwrap().escalation, Escalation::Punishment);
        assert_eq!(state.warnings.tier(ALICE), WarningTier::Clear);
    }

    #[test]
    fn test_clean_message_only_counts() {
        let mut state = active_state();
        assert_eq!(evaluate(&mut state, GROUP, ALICE, "bom dia"), Outcome::Counted);
        assert_eq!(state.interactions.count(ALICE), 1);
        assert_eq!(state.warnings.tier(ALICE), WarningTier::Clear);
        assert!(state.warnings.is_empty());
    }

    #[test]
    fn test_inactive_group_is_not_counted_or_moderated() {
        let mut state = active_state();
        state.registry.deactivate(GROUP);

        assert_eq!(evaluate(&mut state, GROUP, ALICE, "porra"), Outcome::Ignored);
        assert_eq!(state.interactions.count(ALICE), 0);
        assert!(state.warnings.is_empty());
    }

    #[test]
    fn test_notice_rendering_mentions_sender() {
        let mut state = active_state();
        let rendered = evaluate(&mut state, GROUP, ALICE, "veja http://x.example").notice().unwrap().render();

        assert_eq!(rendered.chat_id, GROUP);
        assert_eq!(rendered.mentions, vec![ALICE.to_string()]);
        assert!(rendered.text.contains("Primeiro aviso"));
        assert!(rendered.text.contains("@5511999"));
        assert!(rendered.text.contains("link não autorizado"));
    }

    #[test]
    fn test_punishment_notice_text() {
        let notice = Notice {
            group_id: GROUP.to_string(),
            user_id: ALICE.to_string(),
            kind: ViolationKind::OffensiveWord,
            escalation: Escalation::Punishment,
        };
        assert!(notice.render().text.contains("CHIBATA DE BOI"));
    }
}
