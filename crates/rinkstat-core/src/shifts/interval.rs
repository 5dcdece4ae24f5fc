// Raw shift records and their normalization into absolute-time intervals.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::access;
use crate::player::{PlayerId, PlayerRegistry, Position, TeamId};
use crate::shifts::{ShiftDiagnostics, ShiftError};

/// Seconds in a regulation period.
pub const PERIOD_SECONDS: i64 = 1200;

/// One record from the shift feed. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawShift {
    pub player_id: Option<PlayerId>,
    pub team_id: Option<TeamId>,
    pub period: Option<u8>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Reported duration in seconds.
    pub duration: Option<u32>,
}

/// A validated shift in absolute game seconds, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftInterval {
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub period: u8,
    pub start: u32,
    pub end: u32,
    /// Seconds covered, `end - start + 1`.
    pub duration: u32,
    pub position: Option<Position>,
}

impl ShiftInterval {
    pub fn is_goalie(&self) -> bool {
        self.position.is_some_and(|p| p.is_goalie())
    }

    /// Offset of this interval's period from the start of the game.
    pub fn period_offset(&self) -> u32 {
        PERIOD_SECONDS as u32 * u32::from(self.period.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedShifts {
    pub intervals: Vec<ShiftInterval>,
    pub diagnostics: ShiftDiagnostics,
}

/// Parse a "M:SS" clock into seconds. A clock past the end of a period is
/// rejected.
pub fn parse_clock(clock: &str) -> Result<u32, ShiftError> {
    let bad = || ShiftError::BadClock {
        value: clock.to_string(),
    };
    let (m, s) = clock.trim().split_once(':').ok_or_else(bad)?;
    let m: u32 = m.trim().parse().map_err(|_| bad())?;
    let s: u32 = s.trim().parse().map_err(|_| bad())?;
    if s >= 60 {
        return Err(bad());
    }
    m.checked_mul(60)
        .and_then(|secs| secs.checked_add(s))
        .filter(|&secs| i64::from(secs) <= PERIOD_SECONDS)
        .ok_or_else(bad)
}

/// Read the `data` array of a raw shift page. A page without one yields no
/// records.
pub fn parse_shift_feed(page: &Value) -> Result<Vec<RawShift>, ShiftError> {
    let records = match access::at(page, "/data") {
        None => return Ok(Vec::new()),
        Some(Value::Array(records)) => records,
        Some(_) => {
            return Err(ShiftError::Malformed {
                message: "`data` is not an array".to_string(),
            })
        }
    };

    records
        .iter()
        .map(|rec| -> Result<RawShift, ShiftError> {
            let duration = match access::at(rec, "/duration") {
                Some(Value::String(s)) if s.contains(':') => Some(parse_clock(s)?),
                Some(_) => access::u32_at(rec, "/duration"),
                None => None,
            };
            Ok(RawShift {
                player_id: access::u32_at(rec, "/playerId"),
                team_id: access::u32_at(rec, "/teamId"),
                period: access::u32_at(rec, "/period").and_then(|p| u8::try_from(p).ok()),
                start_time: access::str_at(rec, "/startTime").map(str::to_string),
                end_time: access::str_at(rec, "/endTime").map(str::to_string),
                duration,
            })
        })
        .collect()
}

/// Normalize raw records into absolute-time intervals.
///
/// End times are taken one second early so a shift's last second never
/// collides with the next shift's first. Zero-length records are discarded
/// before inverted ends are pushed forward a period. An unparseable clock
/// fails the whole game.
pub fn normalize_shifts(
    raw: &[RawShift],
    registry: &PlayerRegistry,
) -> Result<NormalizedShifts, ShiftError> {
    let mut out = NormalizedShifts::default();

    for rec in raw {
        let (player_id, team_id, period) = match (rec.player_id, rec.team_id, rec.period) {
            (Some(p), Some(t), Some(n)) if n >= 1 => (p, t, n),
            _ => {
                warn!("skipping shift record with missing player/team/period: {:?}", rec);
                out.diagnostics.skipped_records += 1;
                continue;
            }
        };

        let start_clock = rec.start_time.as_deref().map(parse_clock).transpose()?;
        let end_clock = rec.end_time.as_deref().map(parse_clock).transpose()?;
        let duration = rec.duration.filter(|&d| d > 0).map(i64::from);
        let base = PERIOD_SECONDS * (i64::from(period) - 1);

        let (start, end) = match (start_clock, end_clock, duration) {
            (Some(s), Some(0), Some(d)) => {
                let start = base + i64::from(s);
                (start, start + d - 1)
            }
            (Some(s), Some(e), _) => (base + i64::from(s), base + i64::from(e) - 1),
            (Some(s), None, Some(d)) => {
                let start = base + i64::from(s);
                (start, start + d - 1)
            }
            (None, Some(e), Some(d)) => {
                let end = base + i64::from(e) - 1;
                (end - d + 1, end)
            }
            _ => {
                warn!(
                    "skipping shift for player {} in period {}: no usable times",
                    player_id, period
                );
                out.diagnostics.skipped_records += 1;
                continue;
            }
        };

        if end == start - 1 {
            out.diagnostics.zero_length += 1;
            continue;
        }

        let mut end = end;
        if end < start {
            warn!(
                "shift for player {} ends before it starts ({} < {}), adding one period",
                player_id, end, start
            );
            end += PERIOD_SECONDS;
            out.diagnostics.wrapped_ends += 1;
        }

        if start < 0 || end < start {
            warn!(
                "skipping shift for player {}: unusable interval {}..={}",
                player_id, start, end
            );
            out.diagnostics.skipped_records += 1;
            continue;
        }

        // Both ends are non-negative and bounded by clock values here.
        let (start, end) = (start as u32, end as u32);
        out.intervals.push(ShiftInterval {
            player_id,
            team_id,
            period,
            start,
            end,
            duration: end - start + 1,
            position: registry.position(player_id),
        });
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
