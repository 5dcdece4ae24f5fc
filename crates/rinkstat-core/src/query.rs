// Event query surface: composable filters over persisted play-by-play,
// joined with game metadata and the on-ice timeline.
//
// Filters from different categories combine with AND; several values
// within one category combine with OR. An empty category does not filter.

use std::collections::BTreeSet;

use anyhow::Result;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use crate::db::Artifact;
use crate::events::{EventType, GameEvent, GameInfo};
use crate::player::{PlayerId, TeamId};
use crate::season::{season_for_date, SeasonContext};
use crate::shifts::strength::{Situation, Strength};
use crate::shifts::timeline::{GameTimeline, Side, SideSlots};

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("filter `{filter}` has no defined semantics yet")]
    NotYetSpecified { filter: String },

    #[error("unknown event type '{name}'")]
    UnknownEventType { name: String },

    #[error("invalid range for `{field}`: {message}")]
    InvalidRange { field: String, message: String },
}

/// Game-number prefix, `game / 10000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeasonType {
    Preseason = 1,
    Regular = 2,
    Playoffs = 3,
    AllStar = 4,
    Olympics = 6,
    WorldCup = 8,
}

impl SeasonType {
    pub fn of_game(game: u32) -> Option<SeasonType> {
        match game / 10000 {
            1 => Some(SeasonType::Preseason),
            2 => Some(SeasonType::Regular),
            3 => Some(SeasonType::Playoffs),
            4 => Some(SeasonType::AllStar),
            6 => Some(SeasonType::Olympics),
            8 => Some(SeasonType::WorldCup),
            _ => None,
        }
    }
}

/// Who was on the ice when an event happened.
#[derive(Debug, Clone, PartialEq)]
pub struct OnIce {
    pub home: SideSlots,
    pub road: SideSlots,
}

/// One matching event with its game context.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub season: u16,
    pub game: u32,
    pub date: Option<NaiveDate>,
    pub home: TeamId,
    pub road: TeamId,
    pub event: GameEvent,
    /// Strength of the side the event is read from, when the game has a
    /// timeline row at the event's time. That side is the acting team, or
    /// for a team-less event the queried team.
    pub team_strength: Option<Strength>,
    pub opp_strength: Option<Strength>,
    /// Score of the side the event is read from minus the opponent's.
    pub score_diff: Option<i32>,
    /// Present only when on-ice columns were requested.
    pub on_ice: Option<OnIce>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    event_types: Vec<EventType>,
    teams: Vec<TeamId>,
    teams_for: Vec<TeamId>,
    teams_against: Vec<TeamId>,
    home_teams: Vec<TeamId>,
    road_teams: Vec<TeamId>,
    start_season: Option<u16>,
    end_season: Option<u16>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    start_game: Option<u32>,
    end_game: Option<u32>,
    season_types: BTreeSet<SeasonType>,
    strengths: Vec<Situation>,
    home_road_strengths: Vec<(Strength, Strength)>,
    score_diffs: Vec<i32>,
    start_time: Option<u32>,
    end_time: Option<u32>,
    acting_players: Vec<PlayerId>,
    receiving_players: Vec<PlayerId>,
    players_on_ice: Vec<PlayerId>,
    players_on_ice_for: Vec<PlayerId>,
    players_on_ice_against: Vec<PlayerId>,
    add_on_ice: bool,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQuery {
    /// Regular season and playoffs, at 5v5.
    pub fn new() -> Self {
        Self {
            event_types: Vec::new(),
            teams: Vec::new(),
            teams_for: Vec::new(),
            teams_against: Vec::new(),
            home_teams: Vec::new(),
            road_teams: Vec::new(),
            start_season: None,
            end_season: None,
            start_date: None,
            end_date: None,
            start_game: None,
            end_game: None,
            season_types: [SeasonType::Regular, SeasonType::Playoffs].into(),
            strengths: vec![Situation::even()],
            home_road_strengths: Vec::new(),
            score_diffs: Vec::new(),
            start_time: None,
            end_time: None,
            acting_players: Vec::new(),
            receiving_players: Vec::new(),
            players_on_ice: Vec::new(),
            players_on_ice_for: Vec::new(),
            players_on_ice_against: Vec::new(),
            add_on_ice: false,
        }
    }

    // ------------------------------------------------------------------
    // Builder
    // ------------------------------------------------------------------

    pub fn event_type(mut self, ty: EventType) -> Self {
        self.event_types.push(ty);
        self
    }

    /// Add an event type by alias ("fac", "sog", ...) or feed name.
    pub fn event_alias(self, alias: &str) -> Result<Self, QueryError> {
        let ty = EventType::from_alias(alias).ok_or_else(|| QueryError::UnknownEventType {
            name: alias.to_string(),
        })?;
        Ok(self.event_type(ty))
    }

    /// Games where `team` is home or road.
    pub fn team(mut self, team: TeamId) -> Self {
        self.teams.push(team);
        self
    }

    /// Events by `team`.
    pub fn team_for(mut self, team: TeamId) -> Self {
        self.teams_for.push(team);
        self
    }

    /// Events in `team`'s games not credited to `team`.
    pub fn team_against(mut self, team: TeamId) -> Self {
        self.teams_against.push(team);
        self
    }

    pub fn home_team(mut self, team: TeamId) -> Self {
        self.home_teams.push(team);
        self
    }

    pub fn road_team(mut self, team: TeamId) -> Self {
        self.road_teams.push(team);
        self
    }

    pub fn seasons(mut self, start: u16, end: u16) -> Self {
        self.start_season = Some(start);
        self.end_season = Some(end);
        self
    }

    pub fn start_season(mut self, season: u16) -> Self {
        self.start_season = Some(season);
        self
    }

    pub fn end_season(mut self, season: u16) -> Self {
        self.end_season = Some(season);
        self
    }

    /// Inclusive date range. Seasons not set explicitly are inferred from it.
    pub fn dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// `start` applies within the first season, `end` within the last.
    pub fn games(mut self, start: Option<u32>, end: Option<u32>) -> Self {
        self.start_game = start;
        self.end_game = end;
        self
    }

    pub fn season_types<I: IntoIterator<Item = SeasonType>>(mut self, types: I) -> Self {
        self.season_types = types.into_iter().collect();
        self
    }

    /// Replace the strength filter with the given team-relative situations.
    pub fn strengths<I: IntoIterator<Item = Situation>>(mut self, situations: I) -> Self {
        self.strengths = situations.into_iter().collect();
        self
    }

    pub fn any_strength(mut self) -> Self {
        self.strengths.clear();
        self
    }

    /// Strength by (home, road) tuple.
    pub fn home_road_strength(mut self, home: Strength, road: Strength) -> Self {
        self.home_road_strengths.push((home, road));
        self
    }

    pub fn score_diff(mut self, diff: i32) -> Self {
        self.score_diffs.push(diff);
        self
    }

    /// Inclusive range of absolute game seconds.
    pub fn time_range(mut self, start: Option<u32>, end: Option<u32>) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn acting_player(mut self, player: PlayerId) -> Self {
        self.acting_players.push(player);
        self
    }

    pub fn receiving_player(mut self, player: PlayerId) -> Self {
        self.receiving_players.push(player);
        self
    }

    /// Events with `player` on the ice for either side.
    pub fn player_on_ice(mut self, player: PlayerId) -> Self {
        self.players_on_ice.push(player);
        self
    }

    pub fn player_on_ice_for(mut self, player: PlayerId) -> Self {
        self.players_on_ice_for.push(player);
        self
    }

    pub fn player_on_ice_against(mut self, player: PlayerId) -> Self {
        self.players_on_ice_against.push(player);
        self
    }

    pub fn with_on_ice(mut self) -> Self {
        self.add_on_ice = true;
        self
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    pub fn validate(&self) -> Result<(), QueryError> {
        if !self.players_on_ice_for.is_empty() {
            return Err(QueryError::NotYetSpecified {
                filter: "players_on_ice_for".to_string(),
            });
        }
        if !self.players_on_ice_against.is_empty() {
            return Err(QueryError::NotYetSpecified {
                filter: "players_on_ice_ag".to_string(),
            });
        }
        if !self.home_road_strengths.is_empty() {
            return Err(QueryError::NotYetSpecified {
                filter: "strength_hr".to_string(),
            });
        }
        check_order("season", self.start_season, self.end_season)?;
        check_order("date", self.start_date, self.end_date)?;
        check_order("time", self.start_time, self.end_time)?;
        Ok(())
    }

    /// Seasons to read, explicit bounds first, then dates, then the context
    /// defaults.
    pub fn season_range(&self, ctx: &SeasonContext) -> (u16, u16) {
        let start = self
            .start_season
            .or(self.start_date.map(season_for_date))
            .unwrap_or(ctx.config.first_season);
        let end = self
            .end_season
            .or(self.end_date.map(season_for_date))
            .unwrap_or(ctx.current_season);
        (start, end)
    }

    pub fn run(&self, ctx: &SeasonContext) -> Result<Vec<EventRow>> {
        self.validate()?;
        let (first, last) = self.season_range(ctx);
        if first > last {
            return Err(QueryError::InvalidRange {
                field: "season".to_string(),
                message: format!("{first} is after {last}"),
            }
            .into());
        }

        let needs_timeline =
            !self.strengths.is_empty() || !self.players_on_ice.is_empty() || self.add_on_ice;

        let mut out = Vec::new();
        for season in first..=last {
            for game in ctx.db.parsed_games(season, Artifact::Events)? {
                if !self.game_in_range(season, game, first, last) {
                    continue;
                }
                let Some(info) = ctx.db.load_game_info(season, game)? else {
                    continue;
                };
                if !self.game_matches(&info) {
                    continue;
                }
                let Some(events) = ctx.db.load_events(season, game)? else {
                    continue;
                };
                let timeline = if needs_timeline {
                    ctx.db.load_timeline(season, game)?
                } else {
                    None
                };
                let before = out.len();
                out.extend(
                    events
                        .into_iter()
                        .filter_map(|event| self.event_row(&info, timeline.as_ref(), event)),
                );
                debug!("{season} {game}: {} matching events", out.len() - before);
            }
        }
        Ok(out)
    }

    fn game_in_range(&self, season: u16, game: u32, first: u16, last: u16) -> bool {
        if !self.season_types.is_empty()
            && !SeasonType::of_game(game).is_some_and(|t| self.season_types.contains(&t))
        {
            return false;
        }
        if season == first && self.start_game.is_some_and(|g| game < g) {
            return false;
        }
        if season == last && self.end_game.is_some_and(|g| game > g) {
            return false;
        }
        true
    }

    fn game_matches(&self, info: &GameInfo) -> bool {
        let plays_in = |t: &TeamId| info.home == *t || info.road == *t;
        if !self.teams.is_empty() && !self.teams.iter().any(plays_in) {
            return false;
        }
        if !self.home_teams.is_empty() && !self.home_teams.contains(&info.home) {
            return false;
        }
        if !self.road_teams.is_empty() && !self.road_teams.contains(&info.road) {
            return false;
        }
        if self.start_date.is_some() || self.end_date.is_some() {
            let Some(date) = info.date else {
                return false;
            };
            if self.start_date.is_some_and(|d| date < d) || self.end_date.is_some_and(|d| date > d)
            {
                return false;
            }
        }
        true
    }

    fn event_row(
        &self,
        info: &GameInfo,
        timeline: Option<&GameTimeline>,
        event: GameEvent,
    ) -> Option<EventRow> {
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return None;
        }
        if !self.teams_for.is_empty() && !event.team.is_some_and(|t| self.teams_for.contains(&t)) {
            return None;
        }
        if !self.teams_against.is_empty()
            && !self.teams_against.iter().any(|&t| {
                (info.home == t || info.road == t) && event.team != Some(t)
            })
        {
            return None;
        }
        if self.start_time.is_some_and(|t| event.time < t)
            || self.end_time.is_some_and(|t| event.time > t)
        {
            return None;
        }
        if !self.acting_players.is_empty()
            && !event.actor.is_some_and(|p| self.acting_players.contains(&p))
        {
            return None;
        }
        if !self.receiving_players.is_empty()
            && !event.recipient.is_some_and(|p| self.receiving_players.contains(&p))
        {
            return None;
        }

        let side = self.perspective(info, &event);
        let score_diff = event.score_diff_from(side);
        if !self.score_diffs.is_empty() && !self.score_diffs.contains(&score_diff) {
            return None;
        }

        let row = timeline.and_then(|t| t.row_at(event.time));
        let (team_strength, opp_strength) = match row {
            Some(row) => (
                Some(row.strength(side)),
                Some(row.strength(side.other())),
            ),
            None => (None, None),
        };

        if !self.strengths.is_empty() {
            let row = row?;
            if !self.strengths.iter().any(|s| s.matches(row, side)) {
                return None;
            }
        }
        if !self.players_on_ice.is_empty() {
            let row = row?;
            if !self.players_on_ice.iter().any(|&p| row.on_ice(p)) {
                return None;
            }
        }

        let on_ice = if self.add_on_ice {
            row.map(|r| OnIce {
                home: r.home.clone(),
                road: r.road.clone(),
            })
        } else {
            None
        };

        Some(EventRow {
            season: info.season,
            game: info.game,
            date: info.date,
            home: info.home,
            road: info.road,
            event,
            team_strength,
            opp_strength,
            score_diff: Some(score_diff),
            on_ice,
        })
    }

    /// Side an event is read from. The acting team when it plays in the
    /// game, otherwise the first queried team that does (the opponent of a
    /// `team_against`), then the queried home/road side, then home.
    fn perspective(&self, info: &GameInfo, event: &GameEvent) -> Side {
        let side_of = |team: TeamId| {
            if team == info.home {
                Some(Side::Home)
            } else if team == info.road {
                Some(Side::Road)
            } else {
                None
            }
        };
        if let Some(side) = event.team.and_then(side_of) {
            return side;
        }
        if let Some(side) = self.teams.iter().find_map(|&t| side_of(t)) {
            return side;
        }
        if let Some(side) = self.teams_against.iter().find_map(|&t| side_of(t)) {
            return side.other();
        }
        if self.home_teams.is_empty() && !self.road_teams.is_empty() {
            Side::Road
        } else {
            Side::Home
        }
    }
}

fn check_order<T: PartialOrd + std::fmt::Display>(
    field: &str,
    start: Option<T>,
    end: Option<T>,
) -> Result<(), QueryError> {
    match (start, end) {
        (Some(s), Some(e)) if s > e => Err(QueryError::InvalidRange {
            field: field.to_string(),
            message: format!("{s} is after {e}"),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, Config, SourcesConfig};
    use crate::db::Database;
    use crate::events::Period;
    use crate::player::PlayerRegistry;
    use crate::shifts::timeline::TimelineRow;
    use crate::shifts::ShiftDiagnostics;

    const HOME: TeamId = 15;
    const ROAD: TeamId = 6;

    fn ctx() -> SeasonContext {
        let config = Config {
            db_path: ":memory:".to_string(),
            data_dir: std::env::temp_dir().join("rinkstat_query"),
            sources: SourcesConfig {
                raw_dir: "data/raw".to_string(),
                players_csv: "data/players.csv".to_string(),
            },
            first_season: 2016,
            analysis: AnalysisConfig::default(),
        };
        let db = Database::open(":memory:").unwrap();
        let mut ctx = SeasonContext::new(config, db, PlayerRegistry::new());
        ctx.current_season = 2017;
        ctx
    }

    fn event(index: usize, time: u32, ty: EventType, team: Option<TeamId>) -> GameEvent {
        GameEvent {
            index,
            period: Period::Number(1),
            clock: format!("{}:{:02}", time / 60, time % 60),
            time,
            event_type: ty,
            team,
            actor: Some(100 + index as u32),
            actor_role: "Shooter".to_string(),
            recipient: None,
            recipient_role: String::new(),
            x: None,
            y: None,
            note: String::new(),
            home_score: 0,
            road_score: 0,
        }
    }

    fn slots(base: PlayerId, n: u32, goalie: PlayerId) -> SideSlots {
        SideSlots {
            skaters: (base..base + n).collect(),
            goalie: Some(goalie),
        }
    }

    /// Game with 5v5 at 0..100 and a home power play at 100..120.
    fn store_game(ctx: &SeasonContext, season: u16, game: u32, date: (i32, u32, u32)) {
        let info = GameInfo {
            season,
            game,
            home: HOME,
            road: ROAD,
            status: "Final".to_string(),
            home_score: 1,
            road_score: 0,
            final_period: Some("3rd".to_string()),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
        };
        ctx.db.save_game_info(&info).unwrap();

        let mut rows = Vec::new();
        for t in 0..100 {
            rows.push(TimelineRow::new(t, slots(1, 5, 30), slots(11, 5, 31)));
        }
        for t in 100..120 {
            rows.push(TimelineRow::new(t, slots(1, 5, 30), slots(11, 4, 31)));
        }
        let timeline = GameTimeline {
            season,
            game,
            home: HOME,
            road: ROAD,
            rows,
        };
        ctx.db
            .save_timeline(&timeline, &ShiftDiagnostics::default())
            .unwrap();

        let mut goal = event(3, 110, EventType::Goal, Some(HOME));
        goal.home_score = 1;
        goal.recipient = Some(31);
        let events = vec![
            event(0, 0, EventType::Faceoff, Some(HOME)),
            event(1, 10, EventType::Shot, Some(ROAD)),
            event(2, 50, EventType::BlockedShot, Some(HOME)),
            goal,
            event(4, 200, EventType::Stoppage, None),
        ];
        ctx.db.save_events(season, game, &events).unwrap();
    }

    fn indices(rows: &[EventRow]) -> Vec<usize> {
        rows.iter().map(|r| r.event.index).collect()
    }

    #[test]
    fn default_query_is_even_strength() {
        let ctx = ctx();
        store_game(&ctx, 2017, 20001, (2017, 10, 5));
        let rows = EventQuery::new().run(&ctx).unwrap();
        // The power-play goal and the untimed stoppage drop out.
        assert_eq!(indices(&rows), vec![0, 1, 2]);
        assert!(rows.iter().all(|r| r.team_strength == Some(Strength::FULL)));
        assert!(rows.iter().all(|r| r.on_ice.is_none()));
    }

    #[test]
    fn team_relative_strength() {
        let ctx = ctx();
        store_game(&ctx, 2017, 20001, (2017, 10, 5));
        let pp = Situation::new(Strength::FULL, Strength::new(4, true));
        let rows = EventQuery::new().strengths([pp]).run(&ctx).unwrap();
        assert_eq!(indices(&rows), vec![3]);
        assert_eq!(rows[0].opp_strength, Some(Strength::new(4, true)));

        let all = EventQuery::new().any_strength().run(&ctx).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn types_or_teams_and() {
        let ctx = ctx();
        store_game(&ctx, 2017, 20001, (2017, 10, 5));
        let rows = EventQuery::new()
            .event_type(EventType::Shot)
            .event_alias("block")
            .unwrap()
            .run(&ctx)
            .unwrap();
        assert_eq!(indices(&rows), vec![1, 2]);

        let rows = EventQuery::new()
            .event_type(EventType::Shot)
            .event_type(EventType::BlockedShot)
            .team_for(HOME)
            .run(&ctx)
            .unwrap();
        assert_eq!(indices(&rows), vec![2]);

        let rows = EventQuery::new().team_against(HOME).run(&ctx).unwrap();
        assert_eq!(indices(&rows), vec![1]);

        assert!(EventQuery::new().home_team(ROAD).run(&ctx).unwrap().is_empty());
        assert_eq!(EventQuery::new().road_team(ROAD).run(&ctx).unwrap().len(), 3);
        assert!(EventQuery::new().team(99).run(&ctx).unwrap().is_empty());
    }

    #[test]
    fn players_and_time() {
        let ctx = ctx();
        store_game(&ctx, 2017, 20001, (2017, 10, 5));
        let q = EventQuery::new().any_strength();

        let rows = q.clone().acting_player(101).run(&ctx).unwrap();
        assert_eq!(indices(&rows), vec![1]);
        let rows = q.clone().receiving_player(31).run(&ctx).unwrap();
        assert_eq!(indices(&rows), vec![3]);

        let rows = q.clone().player_on_ice(15).run(&ctx).unwrap();
        assert_eq!(indices(&rows), vec![0, 1, 2]);

        let rows = q.clone().time_range(Some(10), Some(110)).run(&ctx).unwrap();
        assert_eq!(indices(&rows), vec![1, 2, 3]);

        let rows = q.clone().score_diff(0).run(&ctx).unwrap();
        assert_eq!(indices(&rows), vec![0, 1, 2, 4]);
        let rows = q.score_diff(1).with_on_ice().run(&ctx).unwrap();
        assert_eq!(indices(&rows), vec![3]);
        let on_ice = rows[0].on_ice.as_ref().unwrap();
        assert_eq!(on_ice.road.skaters.len(), 4);
    }

    #[test]
    fn events_without_a_team_use_the_queried_side() {
        let ctx = ctx();
        store_game(&ctx, 2017, 20001, (2017, 10, 5));
        let stop = |index, time, home_score| {
            let mut ev = event(index, time, EventType::Stoppage, None);
            ev.home_score = home_score;
            ev
        };
        let events = vec![
            event(0, 0, EventType::Faceoff, Some(HOME)),
            stop(1, 20, 0),
            stop(2, 60, 0),
            stop(3, 105, 1),
            stop(4, 200, 1),
        ];
        ctx.db.save_events(2017, 20001, &events).unwrap();

        let rows = EventQuery::new().event_alias("stop").unwrap().run(&ctx).unwrap();
        assert_eq!(indices(&rows), vec![1, 2]);
        assert!(rows.iter().all(|r| r.team_strength == Some(Strength::FULL)));
        assert!(rows.iter().all(|r| r.score_diff == Some(0)));

        let shorthanded = Situation::new(Strength::new(4, true), Strength::FULL);
        let rows = EventQuery::new()
            .team(ROAD)
            .strengths([shorthanded])
            .event_type(EventType::Stoppage)
            .run(&ctx)
            .unwrap();
        assert_eq!(indices(&rows), vec![3]);
        assert_eq!(rows[0].team_strength, Some(Strength::new(4, true)));
        assert_eq!(rows[0].score_diff, Some(-1));

        let pp = Situation::new(Strength::FULL, Strength::new(4, true));
        let rows = EventQuery::new()
            .team_against(ROAD)
            .strengths([pp])
            .event_type(EventType::Stoppage)
            .run(&ctx)
            .unwrap();
        assert_eq!(indices(&rows), vec![3]);
        assert_eq!(rows[0].score_diff, Some(1));

        let rows = EventQuery::new()
            .any_strength()
            .event_type(EventType::Stoppage)
            .score_diff(1)
            .run(&ctx)
            .unwrap();
        assert_eq!(indices(&rows), vec![3, 4]);
        assert_eq!(rows[1].team_strength, None);
    }

    #[test]
    fn seasons_games_and_dates() {
        let ctx = ctx();
        store_game(&ctx, 2016, 20500, (2017, 1, 10));
        store_game(&ctx, 2016, 30111, (2017, 4, 20));
        store_game(&ctx, 2016, 10001, (2016, 9, 25));
        store_game(&ctx, 2017, 20001, (2017, 10, 5));
        store_game(&ctx, 2017, 20900, (2018, 2, 1));

        let games = |q: EventQuery| -> BTreeSet<(u16, u32)> {
            q.event_type(EventType::Faceoff)
                .run(&ctx)
                .unwrap()
                .into_iter()
                .map(|r| (r.season, r.game))
                .collect()
        };

        let set = |games: &[(u16, u32)]| games.iter().copied().collect::<BTreeSet<_>>();

        // Preseason excluded by default.
        assert_eq!(games(EventQuery::new()).len(), 4);
        assert_eq!(
            games(EventQuery::new().season_types([SeasonType::Playoffs])),
            set(&[(2016, 30111)])
        );
        assert_eq!(
            games(EventQuery::new().games(Some(21000), Some(20500))),
            set(&[(2016, 30111), (2017, 20001)])
        );
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day);
        assert_eq!(
            games(EventQuery::new().dates(d(2017, 9, 1), d(2018, 1, 1))),
            set(&[(2017, 20001)])
        );
        assert_eq!(
            games(EventQuery::new().seasons(2016, 2016)),
            set(&[(2016, 20500), (2016, 30111)])
        );
    }

    #[test]
    fn unfinished_filters_are_rejected() {
        let ctx = ctx();
        let err = EventQuery::new().player_on_ice_for(1).validate().unwrap_err();
        assert_eq!(
            err,
            QueryError::NotYetSpecified {
                filter: "players_on_ice_for".to_string()
            }
        );
        assert!(EventQuery::new().player_on_ice_against(1).run(&ctx).is_err());
        assert!(EventQuery::new()
            .home_road_strength(Strength::FULL, Strength::FULL)
            .validate()
            .is_err());
        assert!(matches!(
            EventQuery::new().event_alias("post"),
            Err(QueryError::UnknownEventType { .. })
        ));
        assert!(matches!(
            EventQuery::new().seasons(2017, 2016).validate(),
            Err(QueryError::InvalidRange { .. })
        ));
    }

    #[test]
    fn season_types_from_game_numbers() {
        assert_eq!(SeasonType::of_game(20001), Some(SeasonType::Regular));
        assert_eq!(SeasonType::of_game(30417), Some(SeasonType::Playoffs));
        assert_eq!(SeasonType::of_game(10001), Some(SeasonType::Preseason));
        assert_eq!(SeasonType::of_game(50001), None);
    }
}
