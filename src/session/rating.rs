//! Elo rating deltas.

use crate::session::identity::GameOutcome;

#[derive(Debug, Clone, Copy)]
pub struct EloCalculator {
    k_factor: f64,
}

impl Default for EloCalculator {
    fn default() -> Self {
        Self::new(32)
    }
}

impl EloCalculator {
    pub fn new(k_factor: u32) -> Self {
        Self {
            k_factor: f64::from(k_factor),
        }
    }

    /// Probability-like score `rating` is expected to take against `opponent`.
    pub fn expected_score(rating: i32, opponent: i32) -> f64 {
        1.0 / (1.0 + 10f64.powf(f64::from(opponent - rating) / 400.0))
    }

    /// Rating change for a player rated `rating` who got `outcome` against `opponent`.
    pub fn rating_change(&self, rating: i32, opponent: i32, outcome: GameOutcome) -> i32 {
        let expected = Self::expected_score(rating, opponent);
        (self.k_factor * (outcome.score() - expected)).round() as i32
    }

    /// Changes for `(white, black)` given white's outcome.
    pub fn changes(&self, white: i32, black: i32, white_outcome: GameOutcome) -> (i32, i32) {
        let black_outcome = match white_outcome {
            GameOutcome::Win => GameOutcome::Loss,
            GameOutcome::Loss => GameOutcome::Win,
            GameOutcome::Draw => GameOutcome::Draw,
        };
        (
            self.rating_change(white, black, white_outcome),
            self.rating_change(black, white, black_outcome),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::EloCalculator;
    use crate::session::identity::GameOutcome;

    #[test]
    fn equal_ratings_swing_half_the_k_factor() {
        let elo = EloCalculator::default();
        assert_eq!(elo.changes(600, 600, GameOutcome::Win), (16, -16));
        assert_eq!(elo.changes(600, 600, GameOutcome::Draw), (0, 0));
    }

    #[test]
    fn upsets_move_ratings_further() {
        let elo = EloCalculator::new(32);
        // 1000 vs 1400: expected ~0.091 for the underdog.
        assert_eq!(elo.changes(1000, 1400, GameOutcome::Win), (29, -29));
        assert_eq!(elo.changes(1000, 1400, GameOutcome::Loss), (-3, 3));
        assert_eq!(elo.changes(1000, 1400, GameOutcome::Draw), (13, -13));
    }
}
