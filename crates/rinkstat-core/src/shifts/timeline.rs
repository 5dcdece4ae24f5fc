// Per-second on-ice timeline for one game.

use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::player::{PlayerId, TeamId};
use crate::shifts::strength::{Situation, Strength};

/// Maximum number of skater columns per side in the flat table layout.
pub const SKATER_COLUMNS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Home,
    Road,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Home => Side::Road,
            Side::Road => Side::Home,
        }
    }

    /// Column prefix in the flat layout ("H" or "R").
    pub fn prefix(self) -> &'static str {
        match self {
            Side::Home => "H",
            Side::Road => "R",
        }
    }
}

/// Who is on the ice for one side at one second.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideSlots {
    /// Skaters in slot order (ascending player id), at most six.
    pub skaters: Vec<PlayerId>,
    pub goalie: Option<PlayerId>,
}

impl SideSlots {
    pub fn contains(&self, player: PlayerId) -> bool {
        self.goalie == Some(player) || self.skaters.contains(&player)
    }

    /// Skaters followed by the goalie, if any.
    pub fn everyone(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.skaters.iter().copied().chain(self.goalie)
    }

    /// Slot value by 1-based skater column number.
    pub fn slot(&self, column: usize) -> Option<PlayerId> {
        column
            .checked_sub(1)
            .and_then(|i| self.skaters.get(i))
            .copied()
    }

    fn populated(&self) -> usize {
        self.skaters.len() + usize::from(self.goalie.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineRow {
    pub time: u32,
    pub home: SideSlots,
    pub road: SideSlots,
    pub home_strength: Strength,
    pub road_strength: Strength,
}

impl TimelineRow {
    /// Build a row, deriving both strength labels from the slots.
    pub fn new(time: u32, home: SideSlots, road: SideSlots) -> Self {
        let home_strength = Strength::of(&home);
        let road_strength = Strength::of(&road);
        Self {
            time,
            home,
            road,
            home_strength,
            road_strength,
        }
    }

    pub fn side(&self, side: Side) -> &SideSlots {
        match side {
            Side::Home => &self.home,
            Side::Road => &self.road,
        }
    }

    pub fn strength(&self, side: Side) -> Strength {
        match side {
            Side::Home => self.home_strength,
            Side::Road => self.road_strength,
        }
    }

    /// Number of non-empty fields in the flat layout: Time, every filled
    /// slot and goalie column, and the two strength labels.
    pub fn populated_fields(&self) -> usize {
        3 + self.home.populated() + self.road.populated()
    }

    pub fn on_ice(&self, player: PlayerId) -> bool {
        self.home.contains(player) || self.road.contains(player)
    }
}

// ---------------------------------------------------------------------------
// GameTimeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameTimeline {
    pub season: u16,
    pub game: u32,
    pub home: TeamId,
    pub road: TeamId,
    /// Sorted by `time`, unique.
    pub rows: Vec<TimelineRow>,
}

impl GameTimeline {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn side_of(&self, team: TeamId) -> Option<Side> {
        if team == self.home {
            Some(Side::Home)
        } else if team == self.road {
            Some(Side::Road)
        } else {
            None
        }
    }

    pub fn team(&self, side: Side) -> TeamId {
        match side {
            Side::Home => self.home,
            Side::Road => self.road,
        }
    }

    /// Row at exactly `time`, if that second survived reconstruction.
    pub fn row_at(&self, time: u32) -> Option<&TimelineRow> {
        self.rows
            .binary_search_by_key(&time, |r| r.time)
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Rows matching `situation` from `side`'s perspective.
    pub fn filtered<'a>(
        &'a self,
        situation: &'a Situation,
        side: Side,
    ) -> impl Iterator<Item = &'a TimelineRow> + 'a {
        self.rows.iter().filter(move |r| situation.matches(r, side))
    }

    /// Header of the flat layout: `Time` first, the rest in lexicographic order.
    pub fn csv_header() -> Vec<String> {
        let mut rest: Vec<String> = Vec::new();
        for side in [Side::Home, Side::Road] {
            for n in 1..=SKATER_COLUMNS {
                rest.push(format!("{}{}", side.prefix(), n));
            }
            rest.push(format!("{}G", side.prefix()));
        }
        rest.push("HomeStrength".to_string());
        rest.push("RoadStrength".to_string());
        rest.sort();
        let mut header = vec!["Time".to_string()];
        header.extend(rest);
        header
    }

    /// Write the timeline as CSV with the flat column layout. Empty slots
    /// are written as empty cells.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let header = Self::csv_header();
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&header)?;
        for row in &self.rows {
            let record: Vec<String> = header.iter().map(|col| cell(row, col)).collect();
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn cell(row: &TimelineRow, column: &str) -> String {
    let id = |v: Option<PlayerId>| v.map(|p| p.to_string()).unwrap_or_default();
    match column {
        "Time" => row.time.to_string(),
        "HomeStrength" => row.home_strength.label(),
        "RoadStrength" => row.road_strength.label(),
        "HG" => id(row.home.goalie),
        "RG" => id(row.road.goalie),
        _ => {
            let (slots, rest) = match column.split_at(1) {
                ("H", rest) => (&row.home, rest),
                ("R", rest) => (&row.road, rest),
                _ => return String::new(),
            };
            id(rest.parse().ok().and_then(|n| slots.slot(n)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(skaters: &[PlayerId], goalie: Option<PlayerId>) -> SideSlots {
        SideSlots {
            skaters: skaters.to_vec(),
            goalie,
        }
    }

    #[test]
    fn header_order() {
        let header = GameTimeline::csv_header();
        assert_eq!(header[0], "Time");
        assert_eq!(header[1], "H1");
        assert_eq!(header[7], "HG");
        assert_eq!(header[8], "HomeStrength");
        assert_eq!(header[9], "R1");
        assert_eq!(header[15], "RG");
        assert_eq!(header[16], "RoadStrength");
        assert_eq!(header.len(), 17);
    }

    #[test]
    fn row_strengths_from_slots() {
        let row = TimelineRow::new(
            10,
            slots(&[1, 2, 3, 4, 5], Some(30)),
            slots(&[11, 12, 13, 14, 15, 16], None),
        );
        assert_eq!(row.home_strength.label(), "5");
        assert_eq!(row.road_strength.label(), "5+1");
        assert_eq!(row.populated_fields(), 3 + 6 + 6);
        assert!(row.on_ice(30));
        assert!(!row.on_ice(99));
    }

    #[test]
    fn csv_export_layout() {
        let timeline = GameTimeline {
            season: 2017,
            game: 20001,
            home: 1,
            road: 2,
            rows: vec![TimelineRow::new(
                0,
                slots(&[5, 7], Some(30)),
                slots(&[8], Some(31)),
            )],
        };
        let mut buf = Vec::new();
        timeline.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Time,H1,H2,H3,H4,H5,H6,HG,HomeStrength,R1,R2,R3,R4,R5,R6,RG,RoadStrength"
        );
        assert_eq!(lines.next().unwrap(), "0,5,7,,,,,30,2,8,,,,,,31,1");
    }

    #[test]
    fn row_lookup_and_side() {
        let timeline = GameTimeline {
            season: 2017,
            game: 20001,
            home: 1,
            road: 2,
            rows: vec![
                TimelineRow::new(3, SideSlots::default(), SideSlots::default()),
                TimelineRow::new(8, SideSlots::default(), SideSlots::default()),
            ],
        };
        assert!(timeline.row_at(8).is_some());
        assert!(timeline.row_at(5).is_none());
        assert_eq!(timeline.side_of(2), Some(Side::Road));
        assert_eq!(timeline.side_of(9), None);
    }
}
