// Season pipeline: per-game parse and reconstruct, season cache tables, and
// per-game derived tables read back from the store.
//
// Everything hangs off an explicit SeasonContext (config, database, player
// reference, current season). Raw feed pages come from a RawSource.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::aggregate::{
    game_comp, game_h2h_corsi, game_h2h_toi, game_toi, line_combos, pairings, player_toi,
    season_toi60, H2hCorsi, H2hToi, LineCombo, Pairing, PlayerGameComp, PlayerSecs,
    PlayerToi60, PositionFilter,
};
use crate::config::Config;
use crate::db::{Artifact, Database};
use crate::events::{parse_events, GameInfo};
use crate::player::{load_registry, PlayerId, PlayerRegistry};
use crate::shifts::timeline::Side;
use crate::shifts::{normalize_shifts, parse_shift_feed, reconstruct, ShiftDiagnostics};

// ---------------------------------------------------------------------------
// Season arithmetic
// ---------------------------------------------------------------------------

/// Season a date belongs to, named by its starting year. September onward
/// belongs to the season that starts that year.
pub fn season_for_date(date: NaiveDate) -> u16 {
    let year = date.year() as u16;
    if date.month() >= 9 {
        year
    } else {
        year - 1
    }
}

pub fn current_season() -> u16 {
    season_for_date(chrono::Local::now().date_naive())
}

// ---------------------------------------------------------------------------
// Raw sources
// ---------------------------------------------------------------------------

/// Provider of raw feed pages. `Ok(None)` means the page is not available
/// yet, which is not an error.
pub trait RawSource {
    /// Game numbers known for a season, ascending.
    fn games(&self, season: u16) -> Result<Vec<u32>>;
    fn shifts(&self, season: u16, game: u32) -> Result<Option<Value>>;
    fn events(&self, season: u16, game: u32) -> Result<Option<Value>>;
}

/// Reads `{root}/{season}/{game}_shifts.json` and `{game}_events.json`.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn page_path(&self, season: u16, game: u32, kind: &str) -> PathBuf {
        self.root
            .join(season.to_string())
            .join(format!("{game}_{kind}.json"))
    }

    fn read_page(&self, path: &Path) -> Result<Option<Value>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse JSON in {}", path.display()))?;
        Ok(Some(value))
    }
}

impl RawSource for DirectorySource {
    fn games(&self, season: u16) -> Result<Vec<u32>> {
        let dir = self.root.join(season.to_string());
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut games = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))? {
            let entry = entry.context("failed to read directory entry")?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(game) = name
                .strip_suffix("_events.json")
                .and_then(|g| g.parse::<u32>().ok())
            {
                games.push(game);
            }
        }
        games.sort_unstable();
        Ok(games)
    }

    fn shifts(&self, season: u16, game: u32) -> Result<Option<Value>> {
        self.read_page(&self.page_path(season, game, "shifts"))
    }

    fn events(&self, season: u16, game: u32) -> Result<Option<Value>> {
        self.read_page(&self.page_path(season, game, "events"))
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum GameOutcome {
    Parsed {
        rows: usize,
        events: usize,
        diagnostics: ShiftDiagnostics,
    },
    /// One of the raw pages is not available yet.
    NotAvailable,
}

#[derive(Debug, Clone, Default)]
pub struct SeasonReport {
    pub season: u16,
    pub parsed: Vec<u32>,
    /// Parsed, but reconstruction kept no rows.
    pub no_usable_rows: Vec<u32>,
    pub not_available: Vec<u32>,
    pub failed: Vec<(u32, String)>,
    pub diagnostics: ShiftDiagnostics,
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

pub struct SeasonContext {
    pub config: Config,
    pub db: Database,
    players: PlayerRegistry,
    pub current_season: u16,
}

impl SeasonContext {
    pub fn new(config: Config, db: Database, players: PlayerRegistry) -> Self {
        Self {
            config,
            db,
            players,
            current_season: current_season(),
        }
    }

    /// Open the configured database and load the player reference, falling
    /// back to the stored copy if the CSV is missing.
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config.db_path).context("failed to open database")?;
        let mut ctx = Self::new(config, db, PlayerRegistry::new());
        if Path::new(&ctx.config.sources.players_csv).exists() {
            ctx.refresh_players()?;
        } else {
            warn!(
                "player reference {} not found, using stored players",
                ctx.config.sources.players_csv
            );
            ctx.players = ctx.db.load_players()?;
        }
        Ok(ctx)
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    /// Reload the player reference CSV and store it. Returns the number of
    /// players loaded.
    pub fn refresh_players(&mut self) -> Result<usize> {
        let path = Path::new(&self.config.sources.players_csv);
        let registry = load_registry(path).context("failed to load player reference")?;
        self.db.save_players(&registry)?;
        info!("Loaded {} players from {}", registry.len(), path.display());
        self.players = registry;
        Ok(self.players.len())
    }

    /// Parse, reconstruct and store one game.
    pub fn process_game(
        &self,
        source: &dyn RawSource,
        season: u16,
        game: u32,
    ) -> Result<GameOutcome> {
        let Some(events_page) = source.events(season, game)? else {
            debug!("{season} {game}: events not available");
            return Ok(GameOutcome::NotAvailable);
        };
        let Some(shifts_page) = source.shifts(season, game)? else {
            debug!("{season} {game}: shifts not available");
            return Ok(GameOutcome::NotAvailable);
        };

        let info = GameInfo::from_feed(season, game, &events_page)?;
        let raw = parse_shift_feed(&shifts_page)
            .with_context(|| format!("{season} {game}: bad shift feed"))?;
        let normalized = normalize_shifts(&raw, &self.players)
            .with_context(|| format!("{season} {game}: bad shift record"))?;
        let mut diagnostics = normalized.diagnostics;
        let rec = reconstruct(
            season,
            game,
            info.home,
            info.road,
            &normalized.intervals,
            &self.config.analysis.reconstruct,
        );
        diagnostics.merge(&rec.diagnostics);
        let events = parse_events(&events_page, season, game, info.home, info.road)
            .with_context(|| format!("{season} {game}: bad play-by-play"))?;

        self.db
            .save_game(&info, &rec.timeline, &diagnostics, &events)?;

        debug!(
            "{season} {game}: {} rows, {} events",
            rec.timeline.len(),
            events.len()
        );
        Ok(GameOutcome::Parsed {
            rows: rec.timeline.len(),
            events: events.len(),
            diagnostics,
        })
    }

    /// Process every game the source knows for `season`. A failing game is
    /// logged and skipped.
    pub fn process_season(&self, source: &dyn RawSource, season: u16) -> Result<SeasonReport> {
        let games = source.games(season)?;
        info!("Processing {} games for {}", games.len(), season);

        let mut report = SeasonReport {
            season,
            ..SeasonReport::default()
        };
        for game in games {
            match self.process_game(source, season, game) {
                Ok(GameOutcome::Parsed {
                    rows, diagnostics, ..
                }) => {
                    if rows == 0 {
                        warn!("{season} {game}: no usable shift data");
                        report.no_usable_rows.push(game);
                    }
                    report.diagnostics.merge(&diagnostics);
                    report.parsed.push(game);
                }
                Ok(GameOutcome::NotAvailable) => report.not_available.push(game),
                Err(e) => {
                    warn!("{season} {game}: skipped: {e:#}");
                    report.failed.push((game, format!("{e:#}")));
                }
            }
        }

        info!(
            "Season {}: {} parsed, {} unavailable, {} failed",
            season,
            report.parsed.len(),
            report.not_available.len(),
            report.failed.len()
        );
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Season cache tables
    // ------------------------------------------------------------------

    pub fn toi60_path(&self, season: u16) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{season}_season_toi60.csv"))
    }

    pub fn toicomp_path(&self, season: u16) -> PathBuf {
        self.config.data_dir.join(format!("{season}_toicomp.csv"))
    }

    /// Season TOI60 table, read from the cache file unless `force` is set or
    /// the file is missing.
    pub fn toi60_table(&self, season: u16, force: bool) -> Result<Vec<PlayerToi60>> {
        let path = self.toi60_path(season);
        if path.exists() && !force {
            return read_csv(&path);
        }

        let situation = &self.config.analysis.situation;
        let mut per_game = Vec::new();
        for game in self.db.parsed_games(season, Artifact::Timeline)? {
            if let Some(timeline) = self.db.load_timeline(season, game)? {
                per_game.extend(game_toi(&timeline, situation));
            }
        }
        let table = season_toi60(&per_game);
        write_csv_atomic(&path, &table)?;
        info!("Wrote TOI60 for {} players to {}", table.len(), path.display());
        Ok(table)
    }

    /// Season TOICOMP table. Uses the TOI60 cache; regenerate that first to
    /// refresh both.
    pub fn toicomp_table(&self, season: u16, force: bool) -> Result<Vec<PlayerGameComp>> {
        let path = self.toicomp_path(season);
        if path.exists() && !force {
            return read_csv(&path);
        }

        let toi60: HashMap<PlayerId, f64> = self
            .toi60_table(season, false)?
            .into_iter()
            .map(|r| (r.player, r.toi60))
            .collect();
        let situation = &self.config.analysis.situation;
        let mut table = Vec::new();
        for game in self.db.parsed_games(season, Artifact::Timeline)? {
            if let Some(timeline) = self.db.load_timeline(season, game)? {
                table.extend(game_comp(&timeline, situation, &toi60, &self.players));
            }
        }
        write_csv_atomic(&path, &table)?;
        info!("Wrote TOICOMP ({} rows) to {}", table.len(), path.display());
        Ok(table)
    }

    // ------------------------------------------------------------------
    // Per-game tables
    // ------------------------------------------------------------------

    pub fn game_h2h_toi(&self, season: u16, game: u32) -> Result<Option<Vec<H2hToi>>> {
        Ok(self
            .db
            .load_timeline(season, game)?
            .map(|t| game_h2h_toi(&t, &self.config.analysis.situation)))
    }

    pub fn game_h2h_corsi(&self, season: u16, game: u32) -> Result<Option<Vec<H2hCorsi>>> {
        let Some(timeline) = self.db.load_timeline(season, game)? else {
            return Ok(None);
        };
        let Some(events) = self.db.load_events(season, game)? else {
            return Ok(None);
        };
        Ok(Some(game_h2h_corsi(
            &events,
            &timeline,
            &self.config.analysis.situation,
        )))
    }

    pub fn game_line_combos(
        &self,
        season: u16,
        game: u32,
        side: Side,
    ) -> Result<Option<Vec<LineCombo>>> {
        Ok(self.db.load_timeline(season, game)?.map(|t| {
            line_combos(&t, side, &self.config.analysis.situation, &self.players)
        }))
    }

    pub fn game_pairings(&self, season: u16, game: u32, side: Side) -> Result<Option<Vec<Pairing>>> {
        Ok(self
            .db
            .load_timeline(season, game)?
            .map(|t| pairings(&t, side, &self.config.analysis.situation, &self.players)))
    }

    pub fn game_player_toi(
        &self,
        season: u16,
        game: u32,
        side: Side,
        filter: Option<PositionFilter>,
    ) -> Result<Option<Vec<PlayerSecs>>> {
        Ok(self.db.load_timeline(season, game)?.map(|t| {
            player_toi(
                &t,
                side,
                &self.config.analysis.situation,
                &self.players,
                filter,
            )
        }))
    }
}

// ---------------------------------------------------------------------------
// Cache file helpers
// ---------------------------------------------------------------------------

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(rows)
}

/// Write rows to a temporary file next to `path`, then rename over it.
fn write_csv_atomic<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)
            .with_context(|| format!("failed to create {}", tmp.display()))?;
        for row in rows {
            writer.serialize(row).context("failed to write cache row")?;
        }
        writer.flush().context("failed to flush cache file")?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", tmp.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_boundaries() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(season_for_date(d(2017, 8, 31)), 2016);
        assert_eq!(season_for_date(d(2017, 9, 1)), 2017);
        assert_eq!(season_for_date(d(2017, 10, 4)), 2017);
        assert_eq!(season_for_date(d(2018, 4, 7)), 2017);
    }

    #[test]
    fn directory_source_lists_games() {
        let tmp = std::env::temp_dir().join("rinkstat_dir_source");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("2017")).unwrap();
        fs::write(tmp.join("2017/20002_events.json"), "{}").unwrap();
        fs::write(tmp.join("2017/20001_events.json"), "{}").unwrap();
        fs::write(tmp.join("2017/20001_shifts.json"), "{\"data\": []}").unwrap();
        fs::write(tmp.join("2017/notes.txt"), "").unwrap();

        let source = DirectorySource::new(&tmp);
        assert_eq!(source.games(2017).unwrap(), vec![20001, 20002]);
        assert!(source.games(2016).unwrap().is_empty());
        assert!(source.shifts(2017, 20001).unwrap().is_some());
        assert!(source.shifts(2017, 20002).unwrap().is_none());

        fs::write(tmp.join("2017/20003_events.json"), "not json").unwrap();
        assert!(source.events(2017, 20003).is_err());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn atomic_write_replaces_file() {
        let tmp = std::env::temp_dir().join("rinkstat_atomic_write");
        let _ = fs::remove_dir_all(&tmp);
        let path = tmp.join("2017_season_toi60.csv");
        let row = |player| PlayerToi60 {
            player,
            toi_on: 10,
            toi_off: 30,
            toi_pct: 0.25,
            toi60: 15.0,
        };

        write_csv_atomic(&path, &[row(1), row(2)]).unwrap();
        write_csv_atomic(&path, &[row(3)]).unwrap();
        let back: Vec<PlayerToi60> = read_csv(&path).unwrap();
        assert_eq!(back, vec![row(3)]);
        assert!(!path.with_extension("csv.tmp").exists());

        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("Player,TOION,TOIOFF,TOI%,TOI60"));

        let _ = fs::remove_dir_all(&tmp);
    }
}
