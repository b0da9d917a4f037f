// src/bot/engagement.rs - Activity ranking and lurker reports

use std::collections::HashSet;

use crate::bot::ledger::InteractionLedger;
use crate::types::{user_number, OutboundText};

const MEDALS: [&str; 5] = ["🥇", "🥈", "🥉", "🏅", "🎖️"];

/// Which ledger entries belong to a group
#[derive(Debug, Clone, Copy)]
pub enum Membership<'a> {
    /// Member list fetched from the gateway
    Members(&'a [String]),
    /// No member list available: match the group's numeric prefix inside user identities
    Heuristic,
}

/// Top talkers of a group, busiest first. Ties keep first-seen order.
pub fn ranking(ledger: &InteractionLedger, group_id: &str, membership: Membership<'_>, limit: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = match membership {
        Membership::Members(members) => {
            let members: HashSet<&str> = members.iter().map(String::as_str).collect();
            ledger
                .iter()
                .filter(|(user, _)| members.contains(user.as_str()))
                .map(|(user, count)| (user.clone(), *count))
                .collect()
        }
        Membership::Heuristic => {
            let prefix = user_number(group_id);
            ledger
                .iter()
                .filter(|(user, _)| user.contains(prefix))
                .map(|(user, count)| (user.clone(), *count))
                .collect()
        }
    };

    // sort_by is stable
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(limit);
    entries
}

/// Members with fewer than `threshold` interactions, in membership order
pub fn lurkers(ledger: &InteractionLedger, members: &[String], threshold: u64, limit: usize) -> Vec<(String, u64)> {
    members
        .iter()
        .map(|member| (member.clone(), ledger.count(member)))
        .filter(|(_, count)| *count < threshold)
        .take(limit)
        .collect()
}

pub fn render_ranking(group_id: &str, entries: &[(String, u64)]) -> OutboundText {
    let mut text = String::from("🏆 *RANKING DOS MAIS ATIVOS* 🏆\n\n");

    if entries.is_empty() {
        text.push_str("😴 Ninguém falou nada ainda...\nQuem vai quebrar o silêncio? 🤔");
    } else {
        for (index, (user, count)) in entries.iter().enumerate() {
            let medal = MEDALS.get(index).copied().unwrap_or("🔥");
            text.push_str(&format!("{} @{} - {} msgs\n\n", medal, user_number(user), count));
        }
    }

    let mentions = entries.iter().map(|(user, _)| user.clone()).collect();
    OutboundText::new(group_id, text).mentioning(mentions)
}

pub fn render_lurkers(group_id: &str, entries: &[(String, u64)]) -> OutboundText {
    let mut text = String::from("👻 *GALERA DA TOCAIA* 👻\n\n");

    if entries.is_empty() {
        text.push_str("🎉 Todo mundo participa aqui!\nNinguém tá de tocaia! 🗣️");
    } else {
        text.push_str("🕵️ Esses aqui só ficam espiando...\n\n");
        for (user, count) in entries {
            text.push_str(&format!("👤 @{} - {} msgs\n\n", user_number(user), count));
        }
    }

    let mentions = entries.iter().map(|(user, _)| user.clone()).collect();
    OutboundText::new(group_id, text).mentioning(mentions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(counts: &[(&str, u64)]) -> InteractionLedger {
        InteractionLedger::from_entries(counts.iter().map(|(u, c)| (u.to_string(), *c)).collect())
    }

    fn members(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ranking_orders_by_count_with_stable_ties() {
        let ledger = ledger_with(&[("a", 2), ("b", 5), ("c", 2), ("outsider", 50)]);
        let group = members(&["a", "b", "c"]);

        let top = ranking(&ledger, "g@g.us", Membership::Members(&group), 10);
        assert_eq!(top, vec![("b".to_string(), 5), ("a".to_string(), 2), ("c".to_string(), 2)]);

        let top_one = ranking(&ledger, "g@g.us", Membership::Members(&group), 1);
        assert_eq!(top_one.len(), 1);
    }

    #[test]
    fn test_ranking_heuristic_matches_group_prefix() {
        let ledger = ledger_with(&[("5511-77@s.whatsapp.net", 3), ("4400@s.whatsapp.net", 9)]);
        let top = ranking(&ledger, "5511-77@g.us", Membership::Heuristic, 10);
        assert_eq!(top, vec![("5511-77@s.whatsapp.net".to_string(), 3)]);
    }

    #[test]
    fn test_empty_ranking_renders_no_activity() {
        let rendered = render_ranking("g@g.us", &[]);
        assert!(rendered.text.contains("Ninguém falou nada ainda"));
        assert!(rendered.mentions.is_empty());
    }

    #[test]
    fn test_ranking_rendering_uses_medals_then_fire() {
        let entries: Vec<(String, u64)> = (0..6).map(|i| (format!("{}@s.whatsapp.net", i), 10 - i)).collect();
        let rendered = render_ranking("g@g.us", &entries);
        assert!(rendered.text.contains("🥇 @0 - 10 msgs"));
        assert!(rendered.text.contains("🔥 @5 - 5 msgs"));
        assert_eq!(rendered.mentions.len(), 6);
    }

    #[test]
    fn test_lurkers_threshold_and_order() {
        let ledger = ledger_with(&[("b", 3), ("c", 2), ("d", 1)]);
        let group = members(&["e", "b", "c", "a", "d"]);

        let found = lurkers(&ledger, &group, 3, 10);
        assert_eq!(
            found,
            vec![("e".to_string(), 0), ("c".to_string(), 2), ("a".to_string(), 0), ("d".to_string(), 1)]
        );
        assert_eq!(lurkers(&ledger, &group, 3, 2).len(), 2);
    }

    #[test]
    fn test_no_lurkers_rendering() {
        let rendered = render_lurkers("g@g.us", &[]);
        assert!(rendered.text.contains("Todo mundo participa aqui"));
    }
}
