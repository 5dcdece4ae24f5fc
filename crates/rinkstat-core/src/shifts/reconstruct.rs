// Interval-to-timeline expansion.
//
// Every interval is expanded into a dense per-second presence table for its
// side. Goalies and skaters are kept apart, goalie conflicts are resolved
// against whole-game totals, skaters are slotted by ascending id, and each
// second gets its own strength labels. Seconds with too little data are
// dropped and counted.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::player::{PlayerId, TeamId};
use crate::shifts::interval::ShiftInterval;
use crate::shifts::timeline::{GameTimeline, Side, SideSlots, TimelineRow};
use crate::shifts::ShiftDiagnostics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconstructOptions {
    /// Rows with fewer populated fields than this are dropped.
    pub min_populated_fields: usize,
    /// Skater slots per side.
    pub max_skaters: usize,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            min_populated_fields: 11,
            max_skaters: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub timeline: GameTimeline,
    pub diagnostics: ShiftDiagnostics,
}

/// Dense presence for one side: per-second skater and goalie sets.
struct Presence {
    skaters: Vec<BTreeSet<PlayerId>>,
    goalies: Vec<BTreeSet<PlayerId>>,
}

impl Presence {
    fn new(seconds: usize) -> Self {
        Self {
            skaters: vec![BTreeSet::new(); seconds],
            goalies: vec![BTreeSet::new(); seconds],
        }
    }

    fn mark(&mut self, interval: &ShiftInterval) {
        let column = if interval.is_goalie() {
            &mut self.goalies
        } else {
            &mut self.skaters
        };
        for second in interval.start..=interval.end {
            column[second as usize].insert(interval.player_id);
        }
    }

    /// Seconds each goalie spent in net over the whole game.
    fn goalie_totals(&self) -> HashMap<PlayerId, u32> {
        let mut totals = HashMap::new();
        for second in &self.goalies {
            for &g in second {
                *totals.entry(g).or_insert(0) += 1;
            }
        }
        totals
    }

    /// Keep one goalie per second: the one with the most total time, lowest
    /// id on ties. Returns the number of goalie-seconds dropped.
    fn resolve_goalies(&mut self) -> usize {
        let totals = self.goalie_totals();
        let mut dropped = 0;
        for second in self.goalies.iter_mut() {
            if second.len() < 2 {
                continue;
            }
            let keep = second
                .iter()
                .copied()
                .max_by_key(|g| (totals.get(g).copied().unwrap_or(0), Reverse(*g)));
            dropped += second.len() - 1;
            second.retain(|g| Some(*g) == keep);
        }
        dropped
    }

    fn slots(&self, second: usize, max_skaters: usize, excess: &mut usize) -> SideSlots {
        let present = &self.skaters[second];
        if present.len() > max_skaters {
            *excess += present.len() - max_skaters;
        }
        SideSlots {
            skaters: present.iter().copied().take(max_skaters).collect(),
            goalie: self.goalies[second].iter().next().copied(),
        }
    }
}

/// Build the per-second timeline for one game.
pub fn reconstruct(
    season: u16,
    game: u32,
    home: TeamId,
    road: TeamId,
    intervals: &[ShiftInterval],
    options: &ReconstructOptions,
) -> Reconstruction {
    let mut diagnostics = ShiftDiagnostics::default();
    let mut timeline = GameTimeline {
        season,
        game,
        home,
        road,
        rows: Vec::new(),
    };

    let Some(last) = intervals.iter().map(|i| i.end).max() else {
        debug!("game {} {}: no shift intervals", season, game);
        return Reconstruction {
            timeline,
            diagnostics,
        };
    };
    let seconds = last as usize + 1;

    let mut home_presence = Presence::new(seconds);
    let mut road_presence = Presence::new(seconds);
    for interval in intervals {
        match timeline.side_of(interval.team_id) {
            Some(Side::Home) => home_presence.mark(interval),
            Some(Side::Road) => road_presence.mark(interval),
            None => {
                warn!(
                    "game {} {}: shift for player {} has team {}, not {} or {}",
                    season, game, interval.player_id, interval.team_id, home, road
                );
                diagnostics.unknown_team += 1;
            }
        }
    }

    diagnostics.goalie_conflict_seconds =
        home_presence.resolve_goalies() + road_presence.resolve_goalies();

    for second in 0..seconds {
        let home_slots = home_presence.slots(
            second,
            options.max_skaters,
            &mut diagnostics.excess_skaters,
        );
        let road_slots = road_presence.slots(
            second,
            options.max_skaters,
            &mut diagnostics.excess_skaters,
        );
        let row = TimelineRow::new(second as u32, home_slots, road_slots);
        if row.populated_fields() < options.min_populated_fields {
            diagnostics.dropped_rows += 1;
        } else {
            timeline.rows.push(row);
        }
    }

    if diagnostics.goalie_conflict_seconds > 0 {
        warn!(
            "game {} {}: dropped {} overlapping goalie-seconds",
            season, game, diagnostics.goalie_conflict_seconds
        );
    }
    if diagnostics.excess_skaters > 0 {
        warn!(
            "game {} {}: {} skater-seconds beyond {} slots discarded",
            season, game, diagnostics.excess_skaters, options.max_skaters
        );
    }
    debug!(
        "game {} {}: {} rows kept, {} dropped",
        season,
        game,
        timeline.rows.len(),
        diagnostics.dropped_rows
    );

    Reconstruction {
        timeline,
        diagnostics,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Position;
    use crate::shifts::strength::Strength;

    const HOME: TeamId = 1;
    const ROAD: TeamId = 2;

    fn shift(player: PlayerId, team: TeamId, start: u32, end: u32) -> ShiftInterval {
        ShiftInterval {
            player_id: player,
            team_id: team,
            period: 1,
            start,
            end,
            duration: end - start + 1,
            position: None,
        }
    }

    fn goalie(player: PlayerId, team: TeamId, start: u32, end: u32) -> ShiftInterval {
        ShiftInterval {
            position: Some(Position::Goalie),
            ..shift(player, team, start, end)
        }
    }

    fn keep_all() -> ReconstructOptions {
        ReconstructOptions {
            min_populated_fields: 0,
            ..ReconstructOptions::default()
        }
    }

    /// Five skaters and a goalie for both sides over `0..=end`.
    fn full_strength(end: u32) -> Vec<ShiftInterval> {
        let mut shifts = Vec::new();
        for p in 0..5 {
            shifts.push(shift(100 + p, HOME, 0, end));
            shifts.push(shift(200 + p, ROAD, 0, end));
        }
        shifts.push(goalie(130, HOME, 0, end));
        shifts.push(goalie(230, ROAD, 0, end));
        shifts
    }

    #[test]
    fn three_interval_scenario() {
        // P1 0:00-0:30, P2 0:10-0:40, G1 0:00-1:00, ends already one early.
        let shifts = vec![
            shift(1, HOME, 0, 29),
            shift(2, HOME, 10, 39),
            goalie(9, HOME, 0, 59),
        ];
        let rec = reconstruct(2017, 20001, HOME, ROAD, &shifts, &keep_all());
        let t = &rec.timeline;
        assert_eq!(t.rows.len(), 60);

        for s in 0..10 {
            let row = t.row_at(s).unwrap();
            assert_eq!(row.home.skaters, vec![1]);
            assert_eq!(row.home.goalie, Some(9));
            assert_eq!(row.home_strength, Strength::new(1, true));
        }
        for s in 10..30 {
            let row = t.row_at(s).unwrap();
            assert_eq!(row.home.skaters, vec![1, 2]);
            assert_eq!(row.home_strength.label(), "2");
        }
        for s in 30..40 {
            assert_eq!(t.row_at(s).unwrap().home.skaters, vec![2]);
        }
        assert!(t.row_at(45).unwrap().home.skaters.is_empty());
        assert_eq!(t.row_at(45).unwrap().home_strength.label(), "0");
        assert_eq!(t.row_at(0).unwrap().road_strength.label(), "-1+1");
    }

    #[test]
    fn goalie_conflict_goes_to_larger_total() {
        // A plays 0..=499, B plays 490..=539: overlap 490..=499.
        let shifts = vec![goalie(10, HOME, 0, 499), goalie(20, HOME, 490, 539)];
        for order in [shifts.clone(), shifts.iter().rev().cloned().collect()] {
            let rec = reconstruct(2017, 20001, HOME, ROAD, &order, &keep_all());
            for s in 490..500 {
                assert_eq!(rec.timeline.row_at(s).unwrap().home.goalie, Some(10));
            }
            assert_eq!(rec.timeline.row_at(500).unwrap().home.goalie, Some(20));
            assert_eq!(rec.diagnostics.goalie_conflict_seconds, 10);
        }
    }

    #[test]
    fn goalie_tie_goes_to_lower_id() {
        let shifts = vec![goalie(20, ROAD, 0, 9), goalie(10, ROAD, 0, 9)];
        let rec = reconstruct(2017, 20001, HOME, ROAD, &shifts, &keep_all());
        assert!(rec.timeline.rows.iter().all(|r| r.road.goalie == Some(10)));
    }

    #[test]
    fn skaters_slotted_by_id_and_capped() {
        let shifts: Vec<ShiftInterval> = [17, 3, 12, 8, 1, 25, 9]
            .iter()
            .map(|&p| shift(p, HOME, 0, 4))
            .collect();
        let rec = reconstruct(2017, 20001, HOME, ROAD, &shifts, &keep_all());
        let row = rec.timeline.row_at(2).unwrap();
        assert_eq!(row.home.skaters, vec![1, 3, 8, 9, 12, 17]);
        assert_eq!(row.home_strength.label(), "5+1");
        assert_eq!(rec.diagnostics.excess_skaters, 5);
    }

    #[test]
    fn sparse_rows_are_dropped() {
        let mut shifts = full_strength(99);
        // Only one home skater after second 99.
        shifts.push(shift(100, HOME, 100, 109));
        let rec = reconstruct(
            2017,
            20001,
            HOME,
            ROAD,
            &shifts,
            &ReconstructOptions::default(),
        );
        assert_eq!(rec.timeline.rows.len(), 100);
        assert_eq!(rec.diagnostics.dropped_rows, 10);
        assert!(rec.timeline.rows.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn duplicate_presence_collapses() {
        let mut shifts = full_strength(9);
        shifts.push(shift(100, HOME, 0, 9));
        let rec = reconstruct(2017, 20001, HOME, ROAD, &shifts, &keep_all());
        assert_eq!(rec.timeline.row_at(5).unwrap().home.skaters.len(), 5);
    }

    #[test]
    fn strengths_depend_only_on_their_row() {
        let mut shifts = full_strength(59);
        // Home penalty 20..=39, road net empty 50..=59.
        shifts.retain(|s| !(s.player_id == 104 || s.player_id == 230));
        shifts.push(shift(104, HOME, 0, 19));
        shifts.push(shift(104, HOME, 40, 59));
        shifts.push(goalie(230, ROAD, 0, 49));
        shifts.push(shift(205, ROAD, 50, 59));

        let rec = reconstruct(2017, 20001, HOME, ROAD, &shifts, &keep_all());
        for row in &rec.timeline.rows {
            assert_eq!(row.home_strength, Strength::of(&row.home));
            assert_eq!(row.road_strength, Strength::of(&row.road));
        }
        assert_eq!(rec.timeline.row_at(25).unwrap().home_strength.label(), "4");
        assert_eq!(rec.timeline.row_at(55).unwrap().road_strength.label(), "5+1");
    }

    #[test]
    fn unknown_team_is_ignored() {
        let shifts = vec![shift(1, 99, 0, 9)];
        let rec = reconstruct(2017, 20001, HOME, ROAD, &shifts, &keep_all());
        assert_eq!(rec.diagnostics.unknown_team, 1);
        assert!(rec.timeline.rows.iter().all(|r| r.home.skaters.is_empty()));
    }

    #[test]
    fn no_intervals_is_empty_timeline() {
        let rec = reconstruct(2017, 20001, HOME, ROAD, &[], &ReconstructOptions::default());
        assert!(rec.timeline.is_empty());
        assert!(rec.diagnostics.is_clean());
    }
}
