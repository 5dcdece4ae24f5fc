// Derived tables built from reconstructed timelines and events. Every
// operation takes the strength situation it is restricted to.

pub mod combinatorics;
pub mod comp;
pub mod h2h;
pub mod lines;
pub mod toi;

pub use comp::{game_comp, PlayerGameComp};
pub use h2h::{corsi_events, game_h2h_corsi, game_h2h_toi, CorsiEvent, H2hCorsi, H2hToi};
pub use lines::{line_combos, pairings, player_toi, LineCombo, Pairing, PlayerSecs, PositionFilter};
pub use toi::{game_toi, season_toi60, PlayerGameToi, PlayerToi60};
