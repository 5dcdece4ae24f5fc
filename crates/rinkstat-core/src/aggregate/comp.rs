// Quality of competition and teammates: seconds-weighted TOI60 of the
// skaters a player shared the ice with, split into forward and defense
// buckets.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::player::{PlayerId, PlayerRegistry, PositionBucket, TeamId};
use crate::shifts::strength::Situation;
use crate::shifts::timeline::{GameTimeline, Side};

/// One player's competition and teammate quality for one game. A bucket is
/// empty when the player faced no one with a known TOI60 in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameComp {
    #[serde(rename = "Game")]
    pub game: u32,
    #[serde(rename = "Player")]
    pub player: PlayerId,
    #[serde(rename = "Team")]
    pub team: TeamId,
    #[serde(rename = "FComp")]
    pub f_comp: Option<f64>,
    #[serde(rename = "DComp")]
    pub d_comp: Option<f64>,
    #[serde(rename = "FTeam")]
    pub f_team: Option<f64>,
    #[serde(rename = "DTeam")]
    pub d_team: Option<f64>,
}

/// Running weighted sum for one bucket.
#[derive(Debug, Clone, Copy, Default)]
struct Weighted {
    sum: f64,
    secs: u32,
}

impl Weighted {
    fn add(&mut self, toi60: f64, secs: u32) {
        self.sum += toi60 * f64::from(secs);
        self.secs += secs;
    }

    fn mean(&self) -> Option<f64> {
        (self.secs > 0).then(|| self.sum / f64::from(self.secs))
    }
}

type PairSecs = BTreeMap<(PlayerId, PlayerId), u32>;

fn bucket_means(
    pairs: &PairSecs,
    player: PlayerId,
    toi60: &HashMap<PlayerId, f64>,
    registry: &PlayerRegistry,
) -> (Option<f64>, Option<f64>) {
    let mut forward = Weighted::default();
    let mut defense = Weighted::default();
    for (&(_, other), &secs) in pairs.range((player, PlayerId::MIN)..=(player, PlayerId::MAX)) {
        let Some(&t) = toi60.get(&other) else {
            continue;
        };
        match registry.bucket(other) {
            PositionBucket::Forward => forward.add(t, secs),
            PositionBucket::Defense => defense.add(t, secs),
        }
    }
    (forward.mean(), defense.mean())
}

/// Competition and teammate quality for every skater in one game.
///
/// Each second in `situation` pairs every skater with each opposing skater
/// and each other teammate. Pairs whose partner has no TOI60 are skipped.
pub fn game_comp(
    timeline: &GameTimeline,
    situation: &Situation,
    toi60: &HashMap<PlayerId, f64>,
    registry: &PlayerRegistry,
) -> Vec<PlayerGameComp> {
    let mut out = Vec::new();
    for side in [Side::Home, Side::Road] {
        let mut versus = PairSecs::new();
        let mut with = PairSecs::new();
        let mut seen: Vec<PlayerId> = Vec::new();

        for row in timeline.filtered(situation, side) {
            let team = &row.side(side).skaters;
            let opp = &row.side(side.other()).skaters;
            for &p in team {
                if !seen.contains(&p) {
                    seen.push(p);
                }
                for &o in opp {
                    *versus.entry((p, o)).or_insert(0) += 1;
                }
                for &t in team.iter().filter(|&&t| t != p) {
                    *with.entry((p, t)).or_insert(0) += 1;
                }
            }
        }

        seen.sort_unstable();
        for player in seen {
            let (f_comp, d_comp) = bucket_means(&versus, player, toi60, registry);
            let (f_team, d_team) = bucket_means(&with, player, toi60, registry);
            out.push(PlayerGameComp {
                game: timeline.game,
                player,
                team: timeline.team(side),
                f_comp,
                d_comp,
                f_team,
                d_team,
            });
        }
    }
    out
}
