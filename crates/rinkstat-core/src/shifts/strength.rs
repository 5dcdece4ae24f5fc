// Manpower strength labels.
//
// Labels follow the scraper convention: "5" means five skaters plus a goalie,
// "5+1" means six skaters with the net empty. Degenerate labels such as
// "0+1" or "-1+1" can appear for seconds with no skaters; those seconds are
// normally dropped by the row filter before anyone sees them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shifts::timeline::{Side, SideSlots, TimelineRow};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid strength label '{0}'")]
pub struct StrengthParseError(pub String);

/// Skater count and goalie presence for one side at one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Strength {
    pub skaters: u8,
    pub goalie: bool,
}

impl Strength {
    /// Five skaters plus a goalie.
    pub const FULL: Strength = Strength {
        skaters: 5,
        goalie: true,
    };

    pub fn new(skaters: u8, goalie: bool) -> Self {
        Self { skaters, goalie }
    }

    /// Strength implied by one side's slot columns.
    pub fn of(slots: &SideSlots) -> Self {
        Self {
            skaters: slots.skaters.len() as u8,
            goalie: slots.goalie.is_some(),
        }
    }

    pub fn label(&self) -> String {
        if self.goalie {
            format!("{}", self.skaters)
        } else {
            format!("{}+1", i32::from(self.skaters) - 1)
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Strength {
    type Err = StrengthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        let bad = || StrengthParseError(s.to_string());
        match label.strip_suffix("+1") {
            Some(head) => {
                let n: i32 = head.parse().map_err(|_| bad())?;
                let skaters = u8::try_from(n + 1).map_err(|_| bad())?;
                Ok(Strength::new(skaters, false))
            }
            None => {
                let skaters: u8 = label.parse().map_err(|_| bad())?;
                Ok(Strength::new(skaters, true))
            }
        }
    }
}

impl TryFrom<String> for Strength {
    type Error = StrengthParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Strength> for String {
    fn from(value: Strength) -> Self {
        value.label()
    }
}

// ---------------------------------------------------------------------------
// Situation
// ---------------------------------------------------------------------------

/// A team-relative strength filter, e.g. 5v5 or 5v4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Situation {
    pub team: Strength,
    pub opp: Strength,
}

impl Default for Situation {
    fn default() -> Self {
        Self::even()
    }
}

impl Situation {
    /// Both sides at five skaters plus a goalie.
    pub fn even() -> Self {
        Self {
            team: Strength::FULL,
            opp: Strength::FULL,
        }
    }

    pub fn new(team: Strength, opp: Strength) -> Self {
        Self { team, opp }
    }

    /// Whether `row` matches this situation from `side`'s point of view.
    pub fn matches(&self, row: &TimelineRow, side: Side) -> bool {
        row.strength(side) == self.team && row.strength(side.other()) == self.opp
    }

    pub fn is_symmetric(&self) -> bool {
        self.team == self.opp
    }
}

impl fmt::Display for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.team, self.opp)
    }
}
