// On-ice / off-ice splits and season TOI60.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::player::{PlayerId, TeamId};
use crate::shifts::strength::Situation;
use crate::shifts::timeline::{GameTimeline, Side};

/// One player's split for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerGameToi {
    pub game: u32,
    pub player: PlayerId,
    pub team: TeamId,
    pub toi_on: u32,
    pub toi_off: u32,
}

/// Season totals. Column names match the cached CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerToi60 {
    #[serde(rename = "Player")]
    pub player: PlayerId,
    #[serde(rename = "TOION")]
    pub toi_on: u32,
    #[serde(rename = "TOIOFF")]
    pub toi_off: u32,
    #[serde(rename = "TOI%")]
    pub toi_pct: f64,
    #[serde(rename = "TOI60")]
    pub toi60: f64,
}

/// Seconds each skater was on and off the ice while their team was in
/// `situation`. Goalies are not counted.
pub fn game_toi(timeline: &GameTimeline, situation: &Situation) -> Vec<PlayerGameToi> {
    let mut out = Vec::new();
    for side in [Side::Home, Side::Road] {
        let mut team_secs = 0u32;
        let mut on: BTreeMap<PlayerId, u32> = BTreeMap::new();
        for row in timeline.filtered(situation, side) {
            team_secs += 1;
            for &p in &row.side(side).skaters {
                *on.entry(p).or_insert(0) += 1;
            }
        }
        let team = timeline.team(side);
        out.extend(on.into_iter().map(|(player, toi_on)| PlayerGameToi {
            game: timeline.game,
            player,
            team,
            toi_on,
            toi_off: team_secs - toi_on,
        }));
    }
    out
}

/// Sum per-game splits into season rows, sorted by player id.
pub fn season_toi60<'a, I>(games: I) -> Vec<PlayerToi60>
where
    I: IntoIterator<Item = &'a PlayerGameToi>,
{
    let mut totals: BTreeMap<PlayerId, (u32, u32)> = BTreeMap::new();
    for g in games {
        let entry = totals.entry(g.player).or_insert((0, 0));
        entry.0 += g.toi_on;
        entry.1 += g.toi_off;
    }
    totals
        .into_iter()
        .map(|(player, (toi_on, toi_off))| {
            let total = toi_on + toi_off;
            let toi_pct = if total == 0 {
                0.0
            } else {
                f64::from(toi_on) / f64::from(total)
            };
            PlayerToi60 {
                player,
                toi_on,
                toi_off,
                toi_pct,
                toi60: toi_pct * 60.0,
            }
        })
        .collect()
}
