// Configuration loading and parsing (rinkstat.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::shifts::reconstruct::ReconstructOptions;
use crate::shifts::strength::{Situation, Strength};

const CONFIG_FILE: &str = "rinkstat.toml";

/// Earliest season with the richer feed format.
pub const EARLIEST_SEASON: u16 = 2010;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no rinkstat.toml at {path}")]
    Missing { path: PathBuf },

    #[error("{path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("bad value for `{field}`: {message}")]
    Invalid { field: String, message: String },

    #[error("no config/rinkstat.toml or defaults/rinkstat.toml under {base}")]
    NoConfig { base: PathBuf },

    #[error("could not install {path}: {source}")]
    Install {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// Where season cache files are written.
    pub data_dir: PathBuf,
    pub sources: SourcesConfig,
    pub first_season: u16,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Root of the raw feed tree, `{raw_dir}/{season}/{game}_shifts.json`.
    pub raw_dir: String,
    /// `ID,Pos` player reference table.
    pub players_csv: String,
}

/// Strength filter and reconstruction thresholds.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisConfig {
    pub situation: Situation,
    pub reconstruct: ReconstructOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            situation: Situation::even(),
            reconstruct: ReconstructOptions::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// rinkstat.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire rinkstat.toml file.
#[derive(Debug, Clone, Deserialize)]
struct RinkstatFile {
    storage: StorageSection,
    sources: SourcesConfig,
    seasons: SeasonsSection,
    analysis: AnalysisSection,
}

#[derive(Debug, Clone, Deserialize)]
struct StorageSection {
    db_path: String,
    /// Falls back to the platform data directory when omitted.
    #[serde(default)]
    data_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SeasonsSection {
    first_season: u16,
}

#[derive(Debug, Clone, Deserialize)]
struct AnalysisSection {
    team_strength: String,
    opp_strength: String,
    min_populated_fields: usize,
    max_skaters: usize,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/rinkstat.toml` under `base_dir`. Does not
/// install defaults.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let file: RinkstatFile = toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.clone(),
        source: e,
    })?;

    let analysis = AnalysisConfig {
        situation: Situation::new(
            parse_strength("analysis.team_strength", &file.analysis.team_strength)?,
            parse_strength("analysis.opp_strength", &file.analysis.opp_strength)?,
        ),
        reconstruct: ReconstructOptions {
            min_populated_fields: file.analysis.min_populated_fields,
            max_skaters: file.analysis.max_skaters,
        },
    };

    let data_dir = match file.storage.data_dir {
        Some(dir) => PathBuf::from(dir),
        None => default_data_dir(),
    };

    let config = Config {
        db_path: file.storage.db_path,
        data_dir,
        sources: file.sources,
        first_season: file.seasons.first_season,
        analysis,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy `defaults/rinkstat.toml` to `config/rinkstat.toml` unless the
/// latter already exists. Returns the installed path, or `None` when there
/// was nothing to do.
pub fn install_default_config(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let shipped = base_dir.join("defaults").join(CONFIG_FILE);
    let target = base_dir.join("config").join(CONFIG_FILE);

    if target.exists() {
        return Ok(None);
    }
    if !shipped.exists() {
        return Err(ConfigError::NoConfig {
            base: base_dir.to_path_buf(),
        });
    }

    let install_err = |source| ConfigError::Install {
        path: target.clone(),
        source,
    };
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(install_err)?;
    }
    let template = std::fs::read(&shipped).map_err(install_err)?;
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(mut dest) => {
            std::io::Write::write_all(&mut dest, &template).map_err(install_err)?;
            Ok(Some(target))
        }
        // Another process got there first.
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(install_err(e)),
    }
}

/// Load `config/rinkstat.toml` under the working directory, installing the
/// shipped defaults on first run.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::Missing {
        path: PathBuf::from(CONFIG_FILE),
    })?;
    install_default_config(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::Missing {
        path: path.to_path_buf(),
    })
}

fn parse_strength(field: &str, label: &str) -> Result<Strength, ConfigError> {
    label.parse().map_err(|_| ConfigError::Invalid {
        field: field.into(),
        message: format!("not a strength label: '{label}'"),
    })
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "rinkstat")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.db_path.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: "storage.db_path".into(),
            message: "must not be empty".into(),
        });
    }

    if config.first_season < EARLIEST_SEASON {
        return Err(ConfigError::Invalid {
            field: "seasons.first_season".into(),
            message: format!(
                "must be {EARLIEST_SEASON} or later, got {}",
                config.first_season
            ),
        });
    }

    let opts = &config.analysis.reconstruct;
    if !(1..=6).contains(&opts.max_skaters) {
        return Err(ConfigError::Invalid {
            field: "analysis.max_skaters".into(),
            message: format!("must be between 1 and 6, got {}", opts.max_skaters),
        });
    }

    // Time, six skater columns and a goalie per side, two strengths.
    if !(3..=17).contains(&opts.min_populated_fields) {
        return Err(ConfigError::Invalid {
            field: "analysis.min_populated_fields".into(),
            message: format!("must be between 3 and 17, got {}", opts.min_populated_fields),
        });
    }

    let situation = &config.analysis.situation;
    for (name, s) in [
        ("analysis.team_strength", situation.team),
        ("analysis.opp_strength", situation.opp),
    ] {
        if usize::from(s.skaters) > opts.max_skaters {
            return Err(ConfigError::Invalid {
                field: name.to_string(),
                message: format!(
                    "'{}' needs more than {} skater slots",
                    s, opts.max_skaters
                ),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
