// Head-to-head tables: shared ice time and shot-attempt differential for
// every ordered pair of skaters in a game.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::combinatorics::complete_grid;
use crate::events::{align, EventType, GameEvent};
use crate::player::{PlayerId, TeamId};
use crate::shifts::strength::Situation;
use crate::shifts::timeline::{GameTimeline, Side, TimelineRow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct H2hToi {
    #[serde(rename = "PlayerID1")]
    pub player1: PlayerId,
    #[serde(rename = "PlayerID2")]
    pub player2: PlayerId,
    #[serde(rename = "Team1")]
    pub team1: TeamId,
    #[serde(rename = "Team2")]
    pub team2: TeamId,
    #[serde(rename = "Secs")]
    pub secs: u32,
}

impl H2hToi {
    pub fn minutes(&self) -> f64 {
        f64::from(self.secs) / 60.0
    }
}

/// Shot-attempt differential for the pair, from `player1`'s side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct H2hCorsi {
    #[serde(rename = "PlayerID1")]
    pub player1: PlayerId,
    #[serde(rename = "PlayerID2")]
    pub player2: PlayerId,
    #[serde(rename = "Team1")]
    pub team1: TeamId,
    #[serde(rename = "Team2")]
    pub team2: TeamId,
    #[serde(rename = "HomeCorsi")]
    pub corsi: i32,
}

/// A shot attempt in `situation`, signed for the home team.
#[derive(Debug, Clone, PartialEq)]
pub struct CorsiEvent {
    pub time: u32,
    pub event_type: EventType,
    pub team: TeamId,
    /// +1 if the attempt helps the home team, -1 otherwise.
    pub home_corsi: i32,
}

type Key = (PlayerId, TeamId);

fn on_ice(row: &TimelineRow, timeline: &GameTimeline) -> Vec<Key> {
    [Side::Home, Side::Road]
        .into_iter()
        .flat_map(|side| {
            let team = timeline.team(side);
            row.side(side).skaters.iter().map(move |&p| (p, team))
        })
        .collect()
}

/// Shared seconds for every ordered pair of skaters on the ice together,
/// teammates and opponents alike, self pairs included. The table is completed
/// to every combination of players seen, with zeros.
pub fn game_h2h_toi(timeline: &GameTimeline, situation: &Situation) -> Vec<H2hToi> {
    let mut secs: BTreeMap<(Key, Key), u32> = BTreeMap::new();
    for row in timeline.filtered(situation, Side::Home) {
        let players = on_ice(row, timeline);
        for &a in &players {
            for &b in &players {
                *secs.entry((a, b)).or_insert(0) += 1;
            }
        }
    }

    complete_grid(&secs, 0)
        .into_iter()
        .map(|(((player1, team1), (player2, team2)), secs)| H2hToi {
            player1,
            player2,
            team1,
            team2,
            secs,
        })
        .collect()
}

/// Goals, shots, misses and blocks at seconds in `situation`.
///
/// A blocked shot is listed under the blocking team, so its sign is the
/// inverse of an unblocked attempt by the same team.
pub fn corsi_events(
    events: &[GameEvent],
    timeline: &GameTimeline,
    situation: &Situation,
) -> Vec<CorsiEvent> {
    align(events, timeline)
        .into_iter()
        .filter(|a| a.event.event_type.is_corsi() && situation.matches(a.row, Side::Home))
        .filter_map(|a| {
            let team = a.event.team?;
            let side = timeline.side_of(team)?;
            let for_home = if side == Side::Home { 1 } else { -1 };
            let home_corsi = if a.event.event_type == EventType::BlockedShot {
                -for_home
            } else {
                for_home
            };
            Some(CorsiEvent {
                time: a.event.time,
                event_type: a.event.event_type.clone(),
                team,
                home_corsi,
            })
        })
        .collect()
}

/// Net shot attempts for every ordered pair of skaters on the ice for them,
/// signed from the first player's side and completed with zeros.
pub fn game_h2h_corsi(
    events: &[GameEvent],
    timeline: &GameTimeline,
    situation: &Situation,
) -> Vec<H2hCorsi> {
    let mut net: BTreeMap<(Key, Key), i32> = BTreeMap::new();
    for ev in corsi_events(events, timeline, situation) {
        let Some(row) = timeline.row_at(ev.time) else {
            continue;
        };
        let players = on_ice(row, timeline);
        for &a in &players {
            let sign = if a.1 == timeline.home { 1 } else { -1 };
            for &b in &players {
                *net.entry((a, b)).or_insert(0) += sign * ev.home_corsi;
            }
        }
    }

    complete_grid(&net, 0)
        .into_iter()
        .map(|(((player1, team1), (player2, team2)), corsi)| H2hCorsi {
            player1,
            player2,
            team1,
            team2,
            corsi,
        })
        .collect()
}
