use super::session::PlayerId;

/// Terminal result of a match, surfaced once when the end event is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEnded {
    /// Player credited with the win.
    pub winner_id: PlayerId,
    /// Winner's final score.
    pub winner_score: u32,
    /// Best final score among the other players.
    pub loser_score: u32,
}

/// Whether the local player won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// Local player won.
    Victory,
    /// Local player lost.
    Defeat,
}

/// Match result seen from one player's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Victory or defeat.
    pub result: MatchResult,
    /// Score of the viewing player.
    pub my_score: u32,
    /// Score of the opponent.
    pub opponent_score: u32,
}

impl GameEnded {
    /// Project the result onto `player`'s point of view.
    pub fn outcome_for(&self, player: &str) -> MatchOutcome {
        if self.winner_id == player {
            MatchOutcome {
                result: MatchResult::Victory,
                my_score: self.winner_score,
                opponent_score: self.loser_score,
            }
        } else {
            MatchOutcome {
                result: MatchResult::Defeat,
                my_score: self.loser_score,
                opponent_score: self.winner_score,
            }
        }
    }
}
