//! Score keeping and match termination

use super::Side;

/// Scores for one match (owned by the orchestrator)
#[derive(Debug, Clone)]
pub struct MatchState {
    scores: [u32; 2],
    /// Points needed to win this match
    win_score: u32,
    last_scorer: Option<Side>,
    ticks_since_score: u64,
}

impl MatchState {
    pub fn new(win_score: u32) -> Self {
        debug_assert!(win_score > 0, "win score must be positive");
        Self {
            scores: [0, 0],
            win_score,
            last_scorer: None,
            ticks_since_score: 0,
        }
    }

    pub fn score(&self, side: Side) -> u32 {
        self.scores[side.index()]
    }

    pub fn win_score(&self) -> u32 {
        self.win_score
    }

    pub fn last_scorer(&self) -> Option<Side> {
        self.last_scorer
    }

    /// Ticks since the last goal, or since the match started
    pub fn ticks_since_score(&self) -> u64 {
        self.ticks_since_score
    }

    pub fn award(&mut self, side: Side) {
        self.scores[side.index()] += 1;
        self.last_scorer = Some(side);
        self.ticks_since_score = 0;
    }

    pub(crate) fn tick(&mut self) {
        self.ticks_since_score += 1;
    }

    /// Side that reached this match's win score, if any
    pub fn winner(&self) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|side| self.score(*side) >= self.win_score)
    }

    pub fn is_over(&self) -> bool {
        self.winner().is_some()
    }

    /// Side ahead on points, `None` on a tie
    pub fn leader(&self) -> Option<Side> {
        let left = self.score(Side::Left);
        let right = self.score(Side::Right);
        match left.cmp(&right) {
            std::cmp::Ordering::Greater => Some(Side::Left),
            std::cmp::Ordering::Less => Some(Side::Right),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn difference(&self) -> u32 {
        self.score(Side::Left).abs_diff(self.score(Side::Right))
    }

    pub fn reset(&mut self) {
        self.scores = [0, 0];
        self.last_scorer = None;
        self.ticks_since_score = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winner_uses_configured_threshold() {
        let mut state = MatchState::new(3);
        state.award(Side::Right);
        state.award(Side::Right);
        assert!(!state.is_over());

        state.award(Side::Right);
        assert_eq!(state.winner(), Some(Side::Right));
        assert_eq!(state.last_scorer(), Some(Side::Right));
    }

    #[test]
    fn leader_and_difference() {
        let mut state = MatchState::new(21);
        assert_eq!(state.leader(), None);

        state.award(Side::Left);
        state.award(Side::Left);
        state.award(Side::Right);
        assert_eq!(state.leader(), Some(Side::Left));
        assert_eq!(state.difference(), 1);
    }

    #[test]
    fn goal_restarts_score_timer() {
        let mut state = MatchState::new(5);
        state.tick();
        state.tick();
        assert_eq!(state.ticks_since_score(), 2);

        state.award(Side::Left);
        assert_eq!(state.ticks_since_score(), 0);

        state.reset();
        assert_eq!(state.score(Side::Left), 0);
        assert_eq!(state.last_scorer(), None);
        assert_eq!(state.win_score(), 5);
    }
}
