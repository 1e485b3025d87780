//! Derived presence predicates used to advance phases early.
//!
//! Both predicates are computed from the player rows on every evaluation, not
//! stored, so concurrent flag writes converge by recomputation.

use crate::dao::models::{MATCH_CAPACITY, PlayerRow};

/// True once the match is full and every player has flagged ready. In the
/// lobby this means "ready to start"; at round end, "ready for the next
/// question".
pub fn all_ready(players: &[PlayerRow]) -> bool {
    players.len() == MATCH_CAPACITY && players.iter().all(|p| p.ready)
}

/// True once every present player has submitted for the current question.
/// Empty matches never count as all-answered.
pub fn all_answered(players: &[PlayerRow]) -> bool {
    !players.is_empty() && players.iter().all(|p| p.answered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn player(uid: &str, ready: bool, answered: bool) -> PlayerRow {
        PlayerRow {
            match_id: Uuid::nil(),
            uid: uid.into(),
            name: uid.into(),
            joined_at: OffsetDateTime::now_utc(),
            ready,
            answered,
            score: 0,
        }
    }

    #[test]
    fn all_ready_needs_a_full_match() {
        assert!(!all_ready(&[]));
        assert!(!all_ready(&[player("a", true, false)]));
        assert!(!all_ready(&[player("a", true, false), player("b", false, false)]));
        assert!(all_ready(&[player("a", true, false), player("b", true, false)]));
    }

    #[test]
    fn all_answered_requires_presence() {
        assert!(!all_answered(&[]));
        assert!(!all_answered(&[player("a", false, true), player("b", false, false)]));
        assert!(all_answered(&[player("a", false, true), player("b", false, true)]));
        // A lone player who answered short-circuits the timer too.
        assert!(all_answered(&[player("a", false, true)]));
    }
}
