// Forward lines, defense pairings and per-player ice time for one side.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::combinatorics::combinations;
use crate::player::{PlayerId, PlayerRegistry, Position, PositionBucket};
use crate::shifts::strength::Situation;
use crate::shifts::timeline::{GameTimeline, Side};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCombo {
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub player3: PlayerId,
    pub secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub secs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSecs {
    pub player: PlayerId,
    pub position: Option<Position>,
    pub secs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionFilter {
    /// Anyone who is not a defenseman.
    Forwards,
    Exact(Position),
}

impl PositionFilter {
    fn admits(&self, position: Option<Position>) -> bool {
        match self {
            PositionFilter::Forwards => position != Some(Position::Defense),
            PositionFilter::Exact(p) => position == Some(*p),
        }
    }
}

/// Shared seconds for every `k`-player group of one bucket on the ice
/// together. Groups are unordered; ids come out ascending.
fn groups(
    timeline: &GameTimeline,
    side: Side,
    situation: &Situation,
    registry: &PlayerRegistry,
    bucket: PositionBucket,
    k: usize,
) -> BTreeMap<Vec<PlayerId>, u32> {
    let mut secs = BTreeMap::new();
    for row in timeline.filtered(situation, side) {
        let members: Vec<PlayerId> = row
            .side(side)
            .skaters
            .iter()
            .copied()
            .filter(|&p| registry.bucket(p) == bucket)
            .collect();
        for combo in combinations(&members, k) {
            *secs.entry(combo).or_insert(0) += 1;
        }
    }
    secs
}

/// Three-forward combinations, most-used first.
pub fn line_combos(
    timeline: &GameTimeline,
    side: Side,
    situation: &Situation,
    registry: &PlayerRegistry,
) -> Vec<LineCombo> {
    let mut out: Vec<LineCombo> = groups(
        timeline,
        side,
        situation,
        registry,
        PositionBucket::Forward,
        3,
    )
    .into_iter()
    .map(|(ids, secs)| LineCombo {
        player1: ids[0],
        player2: ids[1],
        player3: ids[2],
        secs,
    })
    .collect();
    out.sort_by(|a, b| b.secs.cmp(&a.secs));
    out
}

/// Two-defenseman combinations, most-used first.
pub fn pairings(
    timeline: &GameTimeline,
    side: Side,
    situation: &Situation,
    registry: &PlayerRegistry,
) -> Vec<Pairing> {
    let mut out: Vec<Pairing> = groups(
        timeline,
        side,
        situation,
        registry,
        PositionBucket::Defense,
        2,
    )
    .into_iter()
    .map(|(ids, secs)| Pairing {
        player1: ids[0],
        player2: ids[1],
        secs,
    })
    .collect();
    out.sort_by(|a, b| b.secs.cmp(&a.secs));
    out
}

/// Seconds on ice per skater for one side, most ice time first.
pub fn player_toi(
    timeline: &GameTimeline,
    side: Side,
    situation: &Situation,
    registry: &PlayerRegistry,
    filter: Option<PositionFilter>,
) -> Vec<PlayerSecs> {
    let mut secs: BTreeMap<PlayerId, u32> = BTreeMap::new();
    for row in timeline.filtered(situation, side) {
        for &p in &row.side(side).skaters {
            *secs.entry(p).or_insert(0) += 1;
        }
    }
    let mut out: Vec<PlayerSecs> = secs
        .into_iter()
        .map(|(player, secs)| PlayerSecs {
            player,
            position: registry.position(player),
            secs,
        })
        .filter(|p| filter.map_or(true, |f| f.admits(p.position)))
        .collect();
    out.sort_by(|a, b| b.secs.cmp(&a.secs));
    out
}
