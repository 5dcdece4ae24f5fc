// Play-by-play normalization: raw feed plays into GameEvent rows with
// absolute game time and a running score, plus game metadata from the same
// page.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::access;
use crate::player::{PlayerId, TeamId};
use crate::shifts::interval::PERIOD_SECONDS;
use crate::shifts::parse_clock;
use crate::shifts::timeline::{GameTimeline, Side, TimelineRow};

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event {index}: unparseable clock '{value}'")]
    BadClock { index: usize, value: String },

    #[error("malformed play-by-play feed: {message}")]
    Malformed { message: String },

    #[error("game {season} {game}: feed has no home/road team ids")]
    MissingTeams { season: u16, game: u32 },
}

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Number(u8),
    Overtime,
    Shootout,
}

impl Period {
    /// Seconds from the start of the game to the start of this period.
    pub fn offset(&self) -> u32 {
        match self {
            Period::Number(n) => PERIOD_SECONDS as u32 * u32::from(n.saturating_sub(1)),
            Period::Overtime => 3600,
            Period::Shootout => 3900,
        }
    }

    /// Read the period from one play. Regular-season overtime and shootouts
    /// get their fixed offsets; playoff overtimes stay numbered.
    fn from_play(play: &Value, playoffs: bool) -> Period {
        let period_type = access::str_at(play, "/about/periodType").unwrap_or("");
        if period_type.eq_ignore_ascii_case("SHOOTOUT") {
            return Period::Shootout;
        }
        match access::at(play, "/about/period") {
            Some(Value::String(s)) if s.eq_ignore_ascii_case("SO") => Period::Shootout,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("OT") => Period::Overtime,
            _ => {
                let n = access::u32_at(play, "/about/period")
                    .and_then(|n| u8::try_from(n).ok())
                    .unwrap_or(1);
                if !playoffs && period_type.eq_ignore_ascii_case("OVERTIME") {
                    Period::Overtime
                } else {
                    Period::Number(n)
                }
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Number(n) => write!(f, "{}", n),
            Period::Overtime => write!(f, "OT"),
            Period::Shootout => write!(f, "SO"),
        }
    }
}

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Faceoff,
    Shot,
    Hit,
    Stoppage,
    BlockedShot,
    MissedShot,
    Giveaway,
    Takeaway,
    Penalty,
    Goal,
    PeriodStart,
    PeriodEnd,
    PeriodReady,
    PeriodOfficial,
    GameScheduled,
    GameEnd,
    ShootoutComplete,
    Challenge,
    Other(String),
}

impl EventType {
    pub fn from_feed(name: &str) -> EventType {
        match name {
            "Faceoff" => EventType::Faceoff,
            "Shot" => EventType::Shot,
            "Hit" => EventType::Hit,
            "Stoppage" => EventType::Stoppage,
            "Blocked Shot" => EventType::BlockedShot,
            "Missed Shot" => EventType::MissedShot,
            "Giveaway" => EventType::Giveaway,
            "Takeaway" => EventType::Takeaway,
            "Penalty" => EventType::Penalty,
            "Goal" => EventType::Goal,
            "Period Start" => EventType::PeriodStart,
            "Period End" => EventType::PeriodEnd,
            "Period Ready" => EventType::PeriodReady,
            "Period Official" => EventType::PeriodOfficial,
            "Game Scheduled" => EventType::GameScheduled,
            "Game End" => EventType::GameEnd,
            "Shootout Complete" => EventType::ShootoutComplete,
            "Official Challenge" => EventType::Challenge,
            other => EventType::Other(other.to_string()),
        }
    }

    pub fn feed_name(&self) -> &str {
        match self {
            EventType::Faceoff => "Faceoff",
            EventType::Shot => "Shot",
            EventType::Hit => "Hit",
            EventType::Stoppage => "Stoppage",
            EventType::BlockedShot => "Blocked Shot",
            EventType::MissedShot => "Missed Shot",
            EventType::Giveaway => "Giveaway",
            EventType::Takeaway => "Takeaway",
            EventType::Penalty => "Penalty",
            EventType::Goal => "Goal",
            EventType::PeriodStart => "Period Start",
            EventType::PeriodEnd => "Period End",
            EventType::PeriodReady => "Period Ready",
            EventType::PeriodOfficial => "Period Official",
            EventType::GameScheduled => "Game Scheduled",
            EventType::GameEnd => "Game End",
            EventType::ShootoutComplete => "Shootout Complete",
            EventType::Challenge => "Official Challenge",
            EventType::Other(name) => name,
        }
    }

    /// Resolve a query name: either a short alias ("fac", "sog", "penl", ...)
    /// or the feed name itself, case-insensitively.
    pub fn from_alias(alias: &str) -> Option<EventType> {
        let key = alias.trim().to_lowercase();
        let ty = match key.as_str() {
            "fac" | "faceoff" => EventType::Faceoff,
            "shot" | "sog" | "save" => EventType::Shot,
            "hit" => EventType::Hit,
            "stop" | "stoppage" => EventType::Stoppage,
            "block" | "blocked shot" => EventType::BlockedShot,
            "miss" | "post" | "missed shot" => EventType::MissedShot,
            "give" | "giveaway" => EventType::Giveaway,
            "take" | "takeaway" => EventType::Takeaway,
            "penl" | "penalty" => EventType::Penalty,
            "goal" => EventType::Goal,
            "period start" => EventType::PeriodStart,
            "period end" => EventType::PeriodEnd,
            "period ready" => EventType::PeriodReady,
            "period official" => EventType::PeriodOfficial,
            "game scheduled" => EventType::GameScheduled,
            "gend" | "game end" => EventType::GameEnd,
            "shootout complete" => EventType::ShootoutComplete,
            "chal" | "official challenge" => EventType::Challenge,
            _ => return None,
        };
        Some(ty)
    }

    /// Goals, shots on goal, misses and blocks.
    pub fn is_corsi(&self) -> bool {
        matches!(
            self,
            EventType::Goal | EventType::Shot | EventType::MissedShot | EventType::BlockedShot
        )
    }

    /// Corsi minus blocked shots.
    pub fn is_fenwick(&self) -> bool {
        self.is_corsi() && *self != EventType::BlockedShot
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        EventType::from_feed(&value)
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.feed_name().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.feed_name())
    }
}

// ---------------------------------------------------------------------------
// GameEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub index: usize,
    pub period: Period,
    /// Elapsed time in the period, "M:SS".
    pub clock: String,
    /// Absolute game second.
    pub time: u32,
    pub event_type: EventType,
    pub team: Option<TeamId>,
    pub actor: Option<PlayerId>,
    pub actor_role: String,
    pub recipient: Option<PlayerId>,
    pub recipient_role: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub note: String,
    pub home_score: u32,
    pub road_score: u32,
}

impl GameEvent {
    /// Score differential from one side's point of view.
    pub fn score_diff_from(&self, side: Side) -> i32 {
        let diff = self.home_score as i32 - self.road_score as i32;
        match side {
            Side::Home => diff,
            Side::Road => -diff,
        }
    }
}

fn clock_seconds(clock: &str) -> Option<u32> {
    parse_clock(clock).ok()
}

/// Parse the play list at `/liveData/plays/allPlays`. A page without plays
/// yields no events.
pub fn parse_events(
    page: &Value,
    season: u16,
    game: u32,
    home: TeamId,
    road: TeamId,
) -> Result<Vec<GameEvent>, EventError> {
    let plays = match access::at(page, "/liveData/plays/allPlays") {
        None => return Ok(Vec::new()),
        Some(Value::Array(plays)) => plays,
        Some(_) => {
            return Err(EventError::Malformed {
                message: "`allPlays` is not an array".to_string(),
            })
        }
    };
    let playoffs = game / 10000 == 3;

    let mut events = Vec::with_capacity(plays.len());
    let (mut home_score, mut road_score) = (0u32, 0u32);
    for (index, play) in plays.iter().enumerate() {
        let period = Period::from_play(play, playoffs);
        let clock = access::str_at(play, "/about/periodTime")
            .unwrap_or("0:00")
            .to_string();
        let in_period = clock_seconds(&clock).ok_or_else(|| EventError::BadClock {
            index,
            value: clock.clone(),
        })?;
        let event_type = EventType::from_feed(access::str_at(play, "/result/event").unwrap_or("NA"));
        let team = access::u32_at(play, "/team/id");

        if event_type == EventType::Goal {
            match team {
                Some(t) if t == home => home_score += 1,
                Some(t) if t == road => road_score += 1,
                _ => {}
            }
        }

        events.push(GameEvent {
            index,
            period,
            time: period.offset() + in_period,
            clock,
            event_type,
            team,
            actor: access::u32_at(play, "/players/0/player/id"),
            actor_role: access::str_at(play, "/players/0/playerType")
                .unwrap_or("")
                .to_string(),
            recipient: access::u32_at(play, "/players/1/player/id"),
            recipient_role: access::str_at(play, "/players/1/playerType")
                .unwrap_or("")
                .to_string(),
            x: access::f64_at(play, "/coordinates/x"),
            y: access::f64_at(play, "/coordinates/y"),
            note: access::str_at(play, "/result/description")
                .unwrap_or("")
                .to_string(),
            home_score,
            road_score,
        });
    }

    if let Some(first) = events.first_mut() {
        first.home_score = 0;
        first.road_score = 0;
    }

    debug!(
        "game {} {}: {} events, final {}-{}",
        season,
        game,
        events.len(),
        home_score,
        road_score
    );
    Ok(events)
}

// ---------------------------------------------------------------------------
// Game metadata
// ---------------------------------------------------------------------------

/// Decision from the home team's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    W,
    L,
    OTW,
    OTL,
    SOW,
    SOL,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    pub season: u16,
    pub game: u32,
    pub home: TeamId,
    pub road: TeamId,
    pub status: String,
    pub home_score: u32,
    pub road_score: u32,
    /// Ordinal of the last period played ("3rd", "OT", "SO", ...).
    pub final_period: Option<String>,
    pub date: Option<NaiveDate>,
}

impl GameInfo {
    pub fn from_feed(season: u16, game: u32, page: &Value) -> Result<GameInfo, EventError> {
        let home = access::u32_at(page, "/gameData/teams/home/id");
        let road = access::u32_at(page, "/gameData/teams/away/id");
        let (Some(home), Some(road)) = (home, road) else {
            return Err(EventError::MissingTeams { season, game });
        };

        let date = access::str_at(page, "/gameData/datetime/dateTime")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.date_naive());

        Ok(GameInfo {
            season,
            game,
            home,
            road,
            status: access::str_at(page, "/gameData/status/abstractGameState")
                .unwrap_or("")
                .to_string(),
            home_score: access::u32_at(page, "/liveData/linescore/teams/home/goals").unwrap_or(0),
            road_score: access::u32_at(page, "/liveData/linescore/teams/away/goals").unwrap_or(0),
            final_period: access::str_at(page, "/liveData/linescore/currentPeriodOrdinal")
                .map(str::to_string),
            date,
        })
    }

    pub fn is_final(&self) -> bool {
        self.status == "Final"
    }

    /// Home-team result for a finished game. Ties (incomplete data) and
    /// unfinished games have no result.
    pub fn result(&self) -> Option<GameResult> {
        if !self.is_final() || self.home_score == self.road_score {
            return None;
        }
        let home_won = self.home_score > self.road_score;
        let margin = self.home_score.abs_diff(self.road_score);
        let pick = |w, l| if home_won { w } else { l };
        if margin >= 2 {
            return Some(pick(GameResult::W, GameResult::L));
        }
        match self.final_period.as_deref() {
            None => None,
            Some("SO") => Some(pick(GameResult::SOW, GameResult::SOL)),
            Some(p) if p.ends_with("OT") => Some(pick(GameResult::OTW, GameResult::OTL)),
            Some(_) => Some(pick(GameResult::W, GameResult::L)),
        }
    }

    /// 1 preseason, 2 regular season, 3 playoffs, ...
    pub fn season_type(&self) -> u32 {
        self.game / 10000
    }
}

// ---------------------------------------------------------------------------
// Alignment with the timeline
// ---------------------------------------------------------------------------

/// An event joined with the timeline row at the same second.
#[derive(Debug, Clone, Copy)]
pub struct AlignedEvent<'a> {
    pub event: &'a GameEvent,
    pub row: &'a TimelineRow,
}

impl<'a> AlignedEvent<'a> {
    /// Side of the acting team, if it is home or road.
    pub fn acting_side(&self, timeline: &GameTimeline) -> Option<Side> {
        self.event.team.and_then(|t| timeline.side_of(t))
    }
}

/// Inner join of events and timeline rows on game second. Events at seconds
/// without a usable row are left out.
pub fn align<'a>(events: &'a [GameEvent], timeline: &'a GameTimeline) -> Vec<AlignedEvent<'a>> {
    let aligned: Vec<AlignedEvent<'a>> = events
        .iter()
        .filter_map(|event| {
            timeline
                .row_at(event.time)
                .map(|row| AlignedEvent { event, row })
        })
        .collect();
    if aligned.len() < events.len() {
        debug!(
            "game {} {}: {} of {} events had no timeline row",
            timeline.season,
            timeline.game,
            events.len() - aligned.len(),
            events.len()
        );
    }
    aligned
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
