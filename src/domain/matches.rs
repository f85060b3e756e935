//! Match records produced by the ingestion parser and served by the read API.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Competition stage of a match, ordered by when it is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompLevel {
    Qm,
    Ef,
    Qf,
    Sf,
    F,
}

impl CompLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Qm => "qm",
            Self::Ef => "ef",
            Self::Qf => "qf",
            Self::Sf => "sf",
            Self::F => "f",
        }
    }

    pub fn is_elimination(self) -> bool {
        !matches!(self, Self::Qm)
    }
}

impl Display for CompLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qm" => Ok(Self::Qm),
            "ef" => Ok(Self::Ef),
            "qf" => Ok(Self::Qf),
            "sf" => Ok(Self::Sf),
            "f" => Ok(Self::F),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    Youtube,
    Tba,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchVideo {
    #[serde(rename = "type")]
    pub video_type: VideoType,
    pub key: String,
}

/// One side of a match. A score of `-1` means the match has not been played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alliance {
    pub teams: Vec<String>,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alliances {
    pub red: Alliance,
    pub blue: Alliance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub comp_level: CompLevel,
    pub set_number: u32,
    pub match_number: u32,
    pub alliances: Alliances,
    #[serde(default)]
    pub team_key_names: Vec<String>,
    #[serde(default)]
    pub videos: Vec<MatchVideo>,
}

impl MatchRecord {
    /// Storage key, e.g. `2020ab_qm12` or `2020ab_sf2m1`.
    pub fn key_name(&self, event_key: &str) -> String {
        if self.comp_level.is_elimination() {
            format!(
                "{event_key}_{}{}m{}",
                self.comp_level, self.set_number, self.match_number
            )
        } else {
            format!("{event_key}_{}{}", self.comp_level, self.match_number)
        }
    }

    /// Teams playing in this match; falls back to the alliances when the
    /// parser did not fill `team_key_names`.
    pub fn teams(&self) -> Vec<String> {
        if !self.team_key_names.is_empty() {
            return self.team_key_names.clone();
        }
        self.alliances
            .red
            .teams
            .iter()
            .chain(self.alliances.blue.teams.iter())
            .cloned()
            .collect()
    }

    pub fn involves(&self, team_key: &str) -> bool {
        self.teams().iter().any(|team| team == team_key)
    }

    pub fn sort_key(&self) -> (CompLevel, u32, u32) {
        (self.comp_level, self.set_number, self.match_number)
    }
}
