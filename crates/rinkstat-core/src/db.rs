// SQLite persistence for per-game artifacts: game metadata, reconstructed
// timelines, normalized events and the player reference.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use crate::events::{GameEvent, GameInfo};
use crate::player::{PlayerId, PlayerRegistry, Position};
use crate::shifts::timeline::{GameTimeline, SideSlots, TimelineRow};
use crate::shifts::ShiftDiagnostics;

/// Kind of per-game artifact tracked in `parsed_games`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Timeline,
    Events,
}

impl Artifact {
    fn as_str(&self) -> &'static str {
        match self {
            Artifact::Timeline => "timeline",
            Artifact::Events => "events",
        }
    }
}

/// Tables keyed by (season, game). `parsed_games` records which artifacts
/// of a game are stored and how many rows they had.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS players (
        id       INTEGER PRIMARY KEY,
        position TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS games (
        season       INTEGER NOT NULL,
        game         INTEGER NOT NULL,
        home         INTEGER NOT NULL,
        road         INTEGER NOT NULL,
        status       TEXT NOT NULL,
        home_score   INTEGER NOT NULL,
        road_score   INTEGER NOT NULL,
        final_period TEXT,
        date         TEXT,
        PRIMARY KEY (season, game)
    );

    CREATE TABLE IF NOT EXISTS timeline_rows (
        season        INTEGER NOT NULL,
        game          INTEGER NOT NULL,
        time          INTEGER NOT NULL,
        home_skaters  TEXT NOT NULL,
        home_goalie   INTEGER,
        road_skaters  TEXT NOT NULL,
        road_goalie   INTEGER,
        home_strength TEXT NOT NULL,
        road_strength TEXT NOT NULL,
        PRIMARY KEY (season, game, time),
        FOREIGN KEY (season, game) REFERENCES games(season, game)
    );

    CREATE TABLE IF NOT EXISTS events (
        season     INTEGER NOT NULL,
        game       INTEGER NOT NULL,
        idx        INTEGER NOT NULL,
        time       INTEGER NOT NULL,
        event_type TEXT NOT NULL,
        team       INTEGER,
        data       TEXT NOT NULL,
        PRIMARY KEY (season, game, idx),
        FOREIGN KEY (season, game) REFERENCES games(season, game)
    );

    CREATE TABLE IF NOT EXISTS parsed_games (
        season      INTEGER NOT NULL,
        game        INTEGER NOT NULL,
        artifact    TEXT NOT NULL,
        row_count   INTEGER NOT NULL,
        diagnostics TEXT,
        parsed_at   TEXT NOT NULL,
        PRIMARY KEY (season, game, artifact)
    );
";

/// SQLite-backed store keyed by (season, game).
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the game store at `path`, creating its tables on first use.
    /// `":memory:"` gives a throwaway store.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open game store at {path}"))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;
        conn.execute_batch(SCHEMA)
            .context("failed to create game store tables")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Replace the stored player reference with `registry` in one transaction.
    pub fn save_players(&self, registry: &PlayerRegistry) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        tx.execute("DELETE FROM players", [])
            .context("failed to clear players")?;
        for (id, pos) in registry.entries() {
            tx.execute(
                "INSERT INTO players (id, position) VALUES (?1, ?2)",
                params![id, pos.code()],
            )
            .context("failed to insert player")?;
        }
        tx.commit().context("failed to commit players")?;
        Ok(())
    }

    pub fn load_players(&self) -> Result<PlayerRegistry> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, position FROM players")
            .context("failed to prepare load_players query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, PlayerId>(0)?, row.get::<_, String>(1)?))
            })
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, code)| Position::from_str_pos(&code).map(|p| (id, p)))
            .collect())
    }

    // ------------------------------------------------------------------
    // Games
    // ------------------------------------------------------------------

    pub fn save_game_info(&self, info: &GameInfo) -> Result<()> {
        let conn = self.conn()?;
        write_game_info(&conn, info)
    }

    /// Store everything produced for one game (metadata, timeline and
    /// events) in a single transaction. Nothing is written if any part fails.
    pub fn save_game(
        &self,
        info: &GameInfo,
        timeline: &GameTimeline,
        diagnostics: &ShiftDiagnostics,
        events: &[GameEvent],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        write_game_info(&tx, info)?;
        write_timeline(&tx, timeline, diagnostics)?;
        write_events(&tx, info.season, info.game, events)?;
        tx.commit()
            .with_context(|| format!("failed to commit game {} {}", info.season, info.game))?;
        Ok(())
    }

    pub fn load_game_info(&self, season: u16, game: u32) -> Result<Option<GameInfo>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT season, game, home, road, status, home_score, road_score, final_period, date
             FROM games WHERE season = ?1 AND game = ?2",
            params![season, game],
            game_info_from_row,
        )
        .optional()
        .context("failed to load game info")
    }

    /// Every stored game of a season, ordered by game number.
    pub fn games_in_season(&self, season: u16) -> Result<Vec<GameInfo>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT season, game, home, road, status, home_score, road_score, final_period, date
                 FROM games WHERE season = ?1 ORDER BY game",
            )
            .context("failed to prepare games_in_season query")?;
        let games = stmt
            .query_map(params![season], game_info_from_row)
            .context("failed to query games")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game rows")?;
        Ok(games)
    }

    // ------------------------------------------------------------------
    // Timelines
    // ------------------------------------------------------------------

    /// Replace a game's timeline rows and record the artifact marker. The
    /// game's metadata must already be saved.
    pub fn save_timeline(
        &self,
        timeline: &GameTimeline,
        diagnostics: &ShiftDiagnostics,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        write_timeline(&tx, timeline, diagnostics)?;
        tx.commit().context("failed to commit timeline")?;
        Ok(())
    }

    /// Load a stored timeline. Returns `None` if the game has not been
    /// reconstructed yet.
    pub fn load_timeline(&self, season: u16, game: u32) -> Result<Option<GameTimeline>> {
        if !self.is_parsed(season, game, Artifact::Timeline)? {
            return Ok(None);
        }
        let info = self
            .load_game_info(season, game)?
            .with_context(|| format!("timeline for {season} {game} has no game row"))?;

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT time, home_skaters, home_goalie, road_skaters, road_goalie
                 FROM timeline_rows WHERE season = ?1 AND game = ?2 ORDER BY time",
            )
            .context("failed to prepare load_timeline query")?;
        let raw = stmt
            .query_map(params![season, game], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<PlayerId>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<PlayerId>>(4)?,
                ))
            })
            .context("failed to query timeline rows")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map timeline rows")?;

        let mut rows = Vec::with_capacity(raw.len());
        for (time, home_json, home_goalie, road_json, road_goalie) in raw {
            let home = SideSlots {
                skaters: serde_json::from_str(&home_json)
                    .context("failed to deserialize home skaters")?,
                goalie: home_goalie,
            };
            let road = SideSlots {
                skaters: serde_json::from_str(&road_json)
                    .context("failed to deserialize road skaters")?,
                goalie: road_goalie,
            };
            rows.push(TimelineRow::new(time, home, road));
        }

        Ok(Some(GameTimeline {
            season,
            game,
            home: info.home,
            road: info.road,
            rows,
        }))
    }

    /// Diagnostics recorded with a game's timeline.
    pub fn load_diagnostics(&self, season: u16, game: u32) -> Result<Option<ShiftDiagnostics>> {
        let conn = self.conn()?;
        let json: Option<Option<String>> = conn
            .query_row(
                "SELECT diagnostics FROM parsed_games
                 WHERE season = ?1 AND game = ?2 AND artifact = ?3",
                params![season, game, Artifact::Timeline.as_str()],
                |row| row.get(0),
            )
            .optional()
            .context("failed to load diagnostics")?;
        match json.flatten() {
            Some(s) => Ok(Some(
                serde_json::from_str(&s).context("failed to deserialize diagnostics")?,
            )),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Replace a game's events and record the artifact marker.
    pub fn save_events(&self, season: u16, game: u32, events: &[GameEvent]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        write_events(&tx, season, game, events)?;
        tx.commit().context("failed to commit events")?;
        Ok(())
    }

    /// Load a game's events in feed order. Returns `None` if the game's
    /// events have not been parsed yet.
    pub fn load_events(&self, season: u16, game: u32) -> Result<Option<Vec<GameEvent>>> {
        if !self.is_parsed(season, game, Artifact::Events)? {
            return Ok(None);
        }
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT data FROM events WHERE season = ?1 AND game = ?2 ORDER BY idx")
            .context("failed to prepare load_events query")?;
        let raw = stmt
            .query_map(params![season, game], |row| row.get::<_, String>(0))
            .context("failed to query events")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map event rows")?;
        let events = raw
            .iter()
            .map(|s| serde_json::from_str(s).context("failed to deserialize event"))
            .collect::<Result<Vec<GameEvent>>>()?;
        Ok(Some(events))
    }

    // ------------------------------------------------------------------
    // Artifact markers
    // ------------------------------------------------------------------

    pub fn is_parsed(&self, season: u16, game: u32, artifact: Artifact) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM parsed_games
                 WHERE season = ?1 AND game = ?2 AND artifact = ?3)",
                params![season, game, artifact.as_str()],
                |row| row.get(0),
            )
            .context("failed to check parsed_games")?;
        Ok(exists)
    }

    /// Games of a season with the given artifact stored, ascending.
    pub fn parsed_games(&self, season: u16, artifact: Artifact) -> Result<Vec<u32>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT game FROM parsed_games
                 WHERE season = ?1 AND artifact = ?2 ORDER BY game",
            )
            .context("failed to prepare parsed_games query")?;
        let games = stmt
            .query_map(params![season, artifact.as_str()], |row| row.get(0))
            .context("failed to query parsed_games")?
            .collect::<std::result::Result<Vec<u32>, _>>()
            .context("failed to map parsed_games rows")?;
        Ok(games)
    }
}

fn game_info_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GameInfo> {
    let date: Option<String> = row.get(8)?;
    Ok(GameInfo {
        season: row.get(0)?,
        game: row.get(1)?,
        home: row.get(2)?,
        road: row.get(3)?,
        status: row.get(4)?,
        home_score: row.get(5)?,
        road_score: row.get(6)?,
        final_period: row.get(7)?,
        date: date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
    })
}

// ---------------------------------------------------------------------------
// Row writers shared by the single-artifact saves and `save_game`
// ---------------------------------------------------------------------------

fn write_game_info(conn: &Connection, info: &GameInfo) -> Result<()> {
    conn.execute(
        "INSERT INTO games
            (season, game, home, road, status, home_score, road_score, final_period, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(season, game) DO UPDATE SET
            home         = excluded.home,
            road         = excluded.road,
            status       = excluded.status,
            home_score   = excluded.home_score,
            road_score   = excluded.road_score,
            final_period = excluded.final_period,
            date         = excluded.date",
        params![
            info.season,
            info.game,
            info.home,
            info.road,
            info.status,
            info.home_score,
            info.road_score,
            info.final_period,
            info.date.map(|d| d.to_string()),
        ],
    )
    .context("failed to save game info")?;
    Ok(())
}

fn write_timeline(
    conn: &Connection,
    timeline: &GameTimeline,
    diagnostics: &ShiftDiagnostics,
) -> Result<()> {
    let diag_json =
        serde_json::to_string(diagnostics).context("failed to serialize diagnostics")?;
    conn.execute(
        "DELETE FROM timeline_rows WHERE season = ?1 AND game = ?2",
        params![timeline.season, timeline.game],
    )
    .context("failed to clear timeline rows")?;
    let mut stmt = conn
        .prepare(
            "INSERT INTO timeline_rows
                (season, game, time, home_skaters, home_goalie, road_skaters,
                 road_goalie, home_strength, road_strength)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .context("failed to prepare timeline insert")?;
    for row in &timeline.rows {
        stmt.execute(params![
            timeline.season,
            timeline.game,
            row.time,
            serde_json::to_string(&row.home.skaters).context("failed to serialize skaters")?,
            row.home.goalie,
            serde_json::to_string(&row.road.skaters).context("failed to serialize skaters")?,
            row.road.goalie,
            row.home_strength.label(),
            row.road_strength.label(),
        ])
        .context("failed to insert timeline row")?;
    }
    mark_parsed(
        conn,
        timeline.season,
        timeline.game,
        Artifact::Timeline,
        timeline.rows.len(),
        Some(&diag_json),
    )
}

fn write_events(conn: &Connection, season: u16, game: u32, events: &[GameEvent]) -> Result<()> {
    conn.execute(
        "DELETE FROM events WHERE season = ?1 AND game = ?2",
        params![season, game],
    )
    .context("failed to clear events")?;
    let mut stmt = conn
        .prepare(
            "INSERT INTO events (season, game, idx, time, event_type, team, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .context("failed to prepare event insert")?;
    for ev in events {
        let data = serde_json::to_string(ev).context("failed to serialize event")?;
        stmt.execute(params![
            season,
            game,
            ev.index as i64,
            ev.time,
            ev.event_type.feed_name(),
            ev.team,
            data,
        ])
        .context("failed to insert event")?;
    }
    mark_parsed(conn, season, game, Artifact::Events, events.len(), None)
}

fn mark_parsed(
    conn: &Connection,
    season: u16,
    game: u32,
    artifact: Artifact,
    row_count: usize,
    diagnostics: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO parsed_games
            (season, game, artifact, row_count, diagnostics, parsed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            season,
            game,
            artifact.as_str(),
            row_count as i64,
            diagnostics,
            chrono::Utc::now().to_rfc3339(),
        ],
    )
    .context("failed to record parsed artifact")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventType, Period};
    use crate::shifts::strength::Strength;

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn sample_info(game: u32) -> GameInfo {
        GameInfo {
            season: 2017,
            game,
            home: 15,
            road: 6,
            status: "Final".to_string(),
            home_score: 3,
            road_score: 2,
            final_period: Some("3rd".to_string()),
            date: NaiveDate::from_ymd_opt(2017, 10, 5),
        }
    }

    fn sample_timeline(game: u32) -> GameTimeline {
        let home = SideSlots {
            skaters: vec![1, 2, 3, 4, 5],
            goalie: Some(30),
        };
        let road = SideSlots {
            skaters: vec![11, 12, 13, 14, 15, 16],
            goalie: None,
        };
        GameTimeline {
            season: 2017,
            game,
            home: 15,
            road: 6,
            rows: vec![
                TimelineRow::new(0, home.clone(), road.clone()),
                TimelineRow::new(1, home, road),
            ],
        }
    }

    fn sample_event(index: usize) -> GameEvent {
        GameEvent {
            index,
            period: Period::Number(1),
            clock: "0:01".to_string(),
            time: 1,
            event_type: EventType::Shot,
            team: Some(15),
            actor: Some(1),
            actor_role: "Shooter".to_string(),
            recipient: Some(31),
            recipient_role: "Goalie".to_string(),
            x: Some(60.0),
            y: None,
            note: String::new(),
            home_score: 0,
            road_score: 0,
        }
    }

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn().unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"players".to_string()));
        assert!(tables.contains(&"games".to_string()));
        assert!(tables.contains(&"timeline_rows".to_string()));
        assert!(tables.contains(&"events".to_string()));
        assert!(tables.contains(&"parsed_games".to_string()));
    }

    #[test]
    fn players_save_and_load() {
        let db = test_db();
        let registry: PlayerRegistry = vec![(1, Position::Center), (30, Position::Goalie)]
            .into_iter()
            .collect();
        db.save_players(&registry).unwrap();
        let loaded = db.load_players().unwrap();
        assert_eq!(loaded.entries(), registry.entries());
    }

    #[test]
    fn game_info_save_and_load() {
        let db = test_db();
        db.save_game_info(&sample_info(20002)).unwrap();
        db.save_game_info(&sample_info(20001)).unwrap();

        assert_eq!(db.load_game_info(2017, 20001).unwrap(), Some(sample_info(20001)));
        assert!(db.load_game_info(2017, 20099).unwrap().is_none());

        let games: Vec<u32> = db
            .games_in_season(2017)
            .unwrap()
            .iter()
            .map(|g| g.game)
            .collect();
        assert_eq!(games, vec![20001, 20002]);
    }

    #[test]
    fn timeline_save_and_load() {
        let db = test_db();
        db.save_game_info(&sample_info(20001)).unwrap();
        let diag = ShiftDiagnostics {
            dropped_rows: 4,
            ..ShiftDiagnostics::default()
        };
        db.save_timeline(&sample_timeline(20001), &diag).unwrap();

        let loaded = db.load_timeline(2017, 20001).unwrap().unwrap();
        assert_eq!(loaded, sample_timeline(20001));
        assert_eq!(loaded.rows[0].road_strength, Strength::new(6, false));
        assert_eq!(db.load_diagnostics(2017, 20001).unwrap(), Some(diag));
        assert_eq!(db.parsed_games(2017, Artifact::Timeline).unwrap(), vec![20001]);
    }

    #[test]
    fn saving_twice_replaces_rows() {
        let db = test_db();
        db.save_game_info(&sample_info(20001)).unwrap();
        db.save_timeline(&sample_timeline(20001), &ShiftDiagnostics::default())
            .unwrap();
        let mut shorter = sample_timeline(20001);
        shorter.rows.truncate(1);
        db.save_timeline(&shorter, &ShiftDiagnostics::default())
            .unwrap();
        assert_eq!(db.load_timeline(2017, 20001).unwrap().unwrap().rows.len(), 1);
    }

    #[test]
    fn save_game_is_all_or_nothing() {
        let db = test_db();
        db.save_game(
            &sample_info(20001),
            &sample_timeline(20001),
            &ShiftDiagnostics::default(),
            &[sample_event(0)],
        )
        .unwrap();
        assert!(db.is_parsed(2017, 20001, Artifact::Timeline).unwrap());
        assert_eq!(db.load_events(2017, 20001).unwrap().unwrap().len(), 1);

        // Timeline rows for a game with no metadata row violate the foreign
        // key, so the metadata written earlier in the same call rolls back.
        let result = db.save_game(
            &sample_info(20002),
            &sample_timeline(20003),
            &ShiftDiagnostics::default(),
            &[sample_event(0)],
        );
        assert!(result.is_err());
        assert!(db.load_game_info(2017, 20002).unwrap().is_none());
        assert!(!db.is_parsed(2017, 20002, Artifact::Events).unwrap());
        assert!(!db.is_parsed(2017, 20003, Artifact::Timeline).unwrap());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = std::env::temp_dir().join("rinkstat_db_reopen");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("games.db");
        let path = path.to_str().unwrap();

        let db = Database::open(path).unwrap();
        db.save_game(
            &sample_info(20001),
            &sample_timeline(20001),
            &ShiftDiagnostics::default(),
            &[sample_event(0)],
        )
        .unwrap();
        drop(db);

        let db = Database::open(path).unwrap();
        assert_eq!(db.load_game_info(2017, 20001).unwrap(), Some(sample_info(20001)));
        assert!(db.is_parsed(2017, 20001, Artifact::Events).unwrap());
        drop(db);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_artifacts_are_none() {
        let db = test_db();
        assert!(db.load_timeline(2017, 20001).unwrap().is_none());
        assert!(db.load_events(2017, 20001).unwrap().is_none());
        assert!(db.load_diagnostics(2017, 20001).unwrap().is_none());
        assert!(!db.is_parsed(2017, 20001, Artifact::Events).unwrap());
    }

    #[test]
    fn events_save_and_load() {
        let db = test_db();
        db.save_game_info(&sample_info(20001)).unwrap();
        let events = vec![sample_event(0), sample_event(1)];
        db.save_events(2017, 20001, &events).unwrap();
        assert_eq!(db.load_events(2017, 20001).unwrap(), Some(events));

        // An empty event list is still a parsed artifact.
        db.save_game_info(&sample_info(20002)).unwrap();
        db.save_events(2017, 20002, &[]).unwrap();
        assert_eq!(db.load_events(2017, 20002).unwrap(), Some(vec![]));
    }
}
