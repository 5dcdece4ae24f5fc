// Shift reconstruction: raw shift records in, per-second on-ice timeline out.

pub mod interval;
pub mod reconstruct;
pub mod strength;
pub mod timeline;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use interval::{normalize_shifts, parse_clock, parse_shift_feed, RawShift, ShiftInterval};
pub use reconstruct::{reconstruct, ReconstructOptions, Reconstruction};
pub use strength::{Situation, Strength};
pub use timeline::{GameTimeline, Side, SideSlots, TimelineRow};

#[derive(Debug, Error)]
pub enum ShiftError {
    #[error("unparseable clock value '{value}'")]
    BadClock { value: String },

    #[error("malformed shift feed: {message}")]
    Malformed { message: String },
}

/// Data-quality counters collected while normalizing and reconstructing one
/// game. None of these abort the game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftDiagnostics {
    /// Records missing player, team, period or any usable time.
    pub skipped_records: usize,
    /// Records that covered zero seconds.
    pub zero_length: usize,
    /// Records whose end fell before their start and was pushed one period on.
    pub wrapped_ends: usize,
    /// Intervals for a team that is neither home nor road.
    pub unknown_team: usize,
    /// Goalie-seconds dropped while resolving two goalies in net at once.
    pub goalie_conflict_seconds: usize,
    /// Skater-seconds beyond the slot cap.
    pub excess_skaters: usize,
    /// Seconds dropped by the populated-field threshold.
    pub dropped_rows: usize,
}

impl ShiftDiagnostics {
    pub fn merge(&mut self, other: &ShiftDiagnostics) {
        self.skipped_records += other.skipped_records;
        self.zero_length += other.zero_length;
        self.wrapped_ends += other.wrapped_ends;
        self.unknown_team += other.unknown_team;
        self.goalie_conflict_seconds += other.goalie_conflict_seconds;
        self.excess_skaters += other.excess_skaters;
        self.dropped_rows += other.dropped_rows;
    }

    pub fn is_clean(&self) -> bool {
        *self == ShiftDiagnostics::default()
    }
}
