// Player reference data: positions keyed by player id.
//
// The master player list is maintained elsewhere; this module only reads the
// `ID,Pos` reference table and answers "skater or goalie, forward or defense".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// NHL player identifier (e.g. 8471214).
pub type PlayerId = u32;

/// NHL team identifier (e.g. 15 for Washington).
pub type TeamId = u32;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Hockey positions as reported by the player reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Center,
    LeftWing,
    RightWing,
    Defense,
    Goalie,
}

/// Two-way split used by the quality-of-competition tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PositionBucket {
    Forward,
    Defense,
}

impl Position {
    /// Parse a position code or name.
    ///
    /// Accepts the one-letter feed codes ("C", "L", "R", "D", "G") as well as
    /// the spelled-out names ("Center", "Left Wing", "Defenseman", ...).
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "C" | "CENTER" | "CENTRE" => Some(Position::Center),
            "L" | "LW" | "LEFT" | "LEFT WING" => Some(Position::LeftWing),
            "R" | "RW" | "RIGHT" | "RIGHT WING" => Some(Position::RightWing),
            "D" | "DEFENSE" | "DEFENCE" | "DEFENSEMAN" => Some(Position::Defense),
            "G" | "GOALIE" | "GOALTENDER" => Some(Position::Goalie),
            _ => None,
        }
    }

    /// One-letter code, as used in the reference file.
    pub fn code(&self) -> &'static str {
        match self {
            Position::Center => "C",
            Position::LeftWing => "L",
            Position::RightWing => "R",
            Position::Defense => "D",
            Position::Goalie => "G",
        }
    }

    pub fn is_goalie(&self) -> bool {
        matches!(self, Position::Goalie)
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Position::Center | Position::LeftWing | Position::RightWing)
    }

    /// Forward/defense bucket. Anything that is not a defenseman counts as a
    /// forward, goalies included (they never reach the skater tables).
    pub fn bucket(&self) -> PositionBucket {
        if *self == Position::Defense {
            PositionBucket::Defense
        } else {
            PositionBucket::Forward
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Lookup table from player id to position.
#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    positions: HashMap<PlayerId, Position>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, player: PlayerId, position: Position) {
        self.positions.insert(player, position);
    }

    pub fn position(&self, player: PlayerId) -> Option<Position> {
        self.positions.get(&player).copied()
    }

    /// Whether the player is a known goalie. Unknown players are skaters.
    pub fn is_goalie(&self, player: PlayerId) -> bool {
        self.position(player).is_some_and(|p| p.is_goalie())
    }

    /// Forward/defense bucket; unknown players fall into the forward bucket.
    pub fn bucket(&self, player: PlayerId) -> PositionBucket {
        self.position(player)
            .map(|p| p.bucket())
            .unwrap_or(PositionBucket::Forward)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Iterate entries in ascending id order.
    pub fn entries(&self) -> Vec<(PlayerId, Position)> {
        let mut entries: Vec<(PlayerId, Position)> =
            self.positions.iter().map(|(&id, &pos)| (id, pos)).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}

impl FromIterator<(PlayerId, Position)> for PlayerRegistry {
    fn from_iter<I: IntoIterator<Item = (PlayerId, Position)>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// CSV loading
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

/// Reference CSV row. Extra columns (names, birth dates, ...) are ignored.
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawPlayerRow {
    ID: PlayerId,
    Pos: String,
    #[serde(flatten)]
    _extra: HashMap<String, serde_json::Value>,
}

fn load_registry_from_reader<R: Read>(rdr: R) -> Result<PlayerRegistry, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut registry = PlayerRegistry::new();
    for result in reader.deserialize::<RawPlayerRow>() {
        match result {
            Ok(raw) => match Position::from_str_pos(&raw.Pos) {
                Some(pos) => {
                    if let Some(prev) = registry.position(raw.ID) {
                        if prev != pos {
                            warn!(
                                "player {} listed as both {} and {}, using latest",
                                raw.ID, prev, pos
                            );
                        }
                    }
                    registry.insert(raw.ID, pos);
                }
                None => {
                    warn!("skipping player {}: unknown position '{}'", raw.ID, raw.Pos);
                }
            },
            Err(e) => {
                warn!("skipping malformed player row: {}", e);
            }
        }
    }
    Ok(registry)
}

/// Load the `ID,Pos` player reference table from a CSV file.
pub fn load_registry(path: &Path) -> Result<PlayerRegistry, PlayerError> {
    let file = std::fs::File::open(path).map_err(|e| PlayerError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_registry_from_reader(file).map_err(|e| PlayerError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_codes_and_names() {
        assert_eq!(Position::from_str_pos("C"), Some(Position::Center));
        assert_eq!(Position::from_str_pos("l"), Some(Position::LeftWing));
        assert_eq!(Position::from_str_pos("Right Wing"), Some(Position::RightWing));
        assert_eq!(Position::from_str_pos("Defenseman"), Some(Position::Defense));
        assert_eq!(Position::from_str_pos(" G "), Some(Position::Goalie));
        assert_eq!(Position::from_str_pos("X"), None);
    }

    #[test]
    fn buckets() {
        assert_eq!(Position::Center.bucket(), PositionBucket::Forward);
        assert_eq!(Position::RightWing.bucket(), PositionBucket::Forward);
        assert_eq!(Position::Defense.bucket(), PositionBucket::Defense);
        assert!(Position::LeftWing.is_forward());
        assert!(!Position::Defense.is_forward());
    }

    #[test]
    fn registry_defaults_for_unknown_players() {
        let registry: PlayerRegistry = vec![(1, Position::Goalie), (2, Position::Defense)]
            .into_iter()
            .collect();
        assert!(registry.is_goalie(1));
        assert!(!registry.is_goalie(99));
        assert_eq!(registry.bucket(2), PositionBucket::Defense);
        assert_eq!(registry.bucket(99), PositionBucket::Forward);
    }

    #[test]
    fn registry_csv_loading() {
        let csv_data = "\
ID,Pos,Name
8471214,L,Alex Ovechkin
8474651,D,John Carlson
8471679,G,Carey Price";

        let registry = load_registry_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.position(8471214), Some(Position::LeftWing));
        assert_eq!(registry.position(8474651), Some(Position::Defense));
        assert!(registry.is_goalie(8471679));
    }

    #[test]
    fn registry_csv_skips_bad_rows() {
        let csv_data = "\
ID,Pos
1,C
not_an_id,D
3,Z
4,D";

        let registry = load_registry_from_reader(csv_data.as_bytes()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.position(1), Some(Position::Center));
        assert_eq!(registry.position(4), Some(Position::Defense));
    }

    #[test]
    fn registry_entries_sorted() {
        let registry: PlayerRegistry = vec![(30, Position::Center), (10, Position::Goalie)]
            .into_iter()
            .collect();
        let ids: Vec<PlayerId> = registry.entries().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![10, 30]);
    }
}
