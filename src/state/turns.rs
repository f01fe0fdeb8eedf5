use rand::{Rng, seq::SliceRandom};

/// Fixed turn order plus a pointer to the player whose turn it is.
///
/// The order is established once when the session starts. Every answer,
/// right or wrong, moves the pointer to the next entry, wrapping around.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnScheduler {
    order: Vec<String>,
    current: Option<String>,
}

impl TurnScheduler {
    /// Rebuild a scheduler from persisted parts.
    pub fn restore(order: Vec<String>, current: Option<String>) -> Self {
        Self { order, current }
    }

    /// Uniformly shuffle `players` into a turn order.
    pub fn shuffled<R: Rng + ?Sized>(
        players: impl IntoIterator<Item = String>,
        rng: &mut R,
    ) -> Vec<String> {
        let mut order = players.into_iter().collect::<Vec<_>>();
        order.shuffle(rng);
        order
    }

    /// Replace the order and hand the turn to its first entry.
    pub fn set_turn_order(&mut self, order: Vec<String>) {
        self.current = order.first().cloned();
        self.order = order;
    }

    /// Move the turn to the next player.
    ///
    /// Without an order or a current player there is no active game and the
    /// scheduler is left unchanged.
    pub fn advance(&mut self) -> Option<&str> {
        let current = self.current.as_deref()?;
        let index = self.order.iter().position(|id| id == current)?;
        let next = (index + 1) % self.order.len();
        self.current = Some(self.order[next].clone());
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn is_turn_of(&self, player_id: &str) -> bool {
        self.current.as_deref() == Some(player_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn players(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn set_turn_order_hands_turn_to_first_entry() {
        let mut turns = TurnScheduler::default();
        turns.set_turn_order(players(&["b", "a", "c"]));
        assert_eq!(turns.current(), Some("b"));
        assert!(turns.is_turn_of("b"));
        assert!(!turns.is_turn_of("a"));
    }

    #[test]
    fn advance_wraps_around() {
        let mut turns = TurnScheduler::default();
        turns.set_turn_order(players(&["a", "b", "c"]));
        assert_eq!(turns.advance(), Some("b"));
        assert_eq!(turns.advance(), Some("c"));
        assert_eq!(turns.advance(), Some("a"));
    }

    #[test]
    fn advancing_roster_size_times_returns_to_start() {
        let mut turns = TurnScheduler::default();
        turns.set_turn_order(players(&["a", "b", "c", "d", "e"]));
        let start = turns.current().map(str::to_string);
        for _ in 0..turns.order().len() {
            turns.advance();
        }
        assert_eq!(turns.current().map(str::to_string), start);
    }

    #[test]
    fn advance_without_game_is_a_no_op() {
        let mut turns = TurnScheduler::default();
        assert_eq!(turns.advance(), None);
        assert_eq!(turns, TurnScheduler::default());

        let mut dangling = TurnScheduler::restore(players(&["a"]), None);
        assert_eq!(dangling.advance(), None);
        assert_eq!(dangling.current(), None);
    }

    #[test]
    fn single_player_keeps_the_turn() {
        let mut turns = TurnScheduler::default();
        turns.set_turn_order(players(&["solo"]));
        assert_eq!(turns.advance(), Some("solo"));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let roster = players(&["a", "b", "c", "d", "e"]);
        let mut order = TurnScheduler::shuffled(roster.clone(), &mut rng);
        order.sort();
        assert_eq!(order, roster);
    }

    #[test]
    fn shuffle_reaches_every_first_player() {
        let mut rng = StdRng::seed_from_u64(42);
        let roster = players(&["a", "b", "c"]);
        let mut firsts = HashMap::new();
        for _ in 0..600 {
            let order = TurnScheduler::shuffled(roster.clone(), &mut rng);
            *firsts.entry(order[0].clone()).or_insert(0u32) += 1;
        }
        assert_eq!(firsts.len(), 3);
        assert!(firsts.values().all(|count| *count > 120));
    }
}
