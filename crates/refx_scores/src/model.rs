//! Score domain types shared by storage and ranking.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Privilege bit held by every account allowed on public leaderboards.
pub const UNRESTRICTED: u32 = 1;

/// Game modes as stored in the `scores.mode` column.
///
/// Relax and autopilot variants share the ruleset of their vanilla mode but
/// are ranked separately and by pp rather than score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GameMode {
    VanillaOsu = 0,
    VanillaTaiko = 1,
    VanillaCatch = 2,
    VanillaMania = 3,
    RelaxOsu = 4,
    RelaxTaiko = 5,
    RelaxCatch = 6,
    AutopilotOsu = 8,
}

/// Column a leaderboard is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMetric {
    Score,
    Pp,
}

impl ScoringMetric {
    pub fn column(self) -> &'static str {
        match self {
            Self::Score => "score",
            Self::Pp => "pp",
        }
    }
}

impl GameMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn scoring_metric(self) -> ScoringMetric {
        if self.as_u8() >= Self::RelaxOsu.as_u8() {
            ScoringMetric::Pp
        } else {
            ScoringMetric::Score
        }
    }

    /// The ruleset underneath a relax/autopilot mode.
    pub fn as_vanilla(self) -> GameMode {
        match self.as_u8() % 4 {
            0 => Self::VanillaOsu,
            1 => Self::VanillaTaiko,
            2 => Self::VanillaCatch,
            _ => Self::VanillaMania,
        }
    }
}

impl TryFrom<u8> for GameMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::VanillaOsu,
            1 => Self::VanillaTaiko,
            2 => Self::VanillaCatch,
            3 => Self::VanillaMania,
            4 => Self::RelaxOsu,
            5 => Self::RelaxTaiko,
            6 => Self::RelaxCatch,
            8 => Self::AutopilotOsu,
            other => return Err(format!("unknown game mode {other}")),
        })
    }
}

impl From<GameMode> for u8 {
    fn from(mode: GameMode) -> Self {
        mode.as_u8()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SubmissionStatus {
    Failed = 0,
    Submitted = 1,
    /// The player's best score on the map in this mode; the only status ranked
    Best = 2,
}

impl TryFrom<u8> for SubmissionStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Failed),
            1 => Ok(Self::Submitted),
            2 => Ok(Self::Best),
            other => Err(format!("unknown submission status {other}")),
        }
    }
}

impl From<SubmissionStatus> for u8 {
    fn from(status: SubmissionStatus) -> Self {
        status as u8
    }
}

/// Mod bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mods(pub u32);

impl Mods {
    pub const NOMOD: Mods = Mods(0);
    pub const NOFAIL: Mods = Mods(1 << 0);
    pub const EASY: Mods = Mods(1 << 1);
    pub const TOUCHSCREEN: Mods = Mods(1 << 2);
    pub const HIDDEN: Mods = Mods(1 << 3);
    pub const HARDROCK: Mods = Mods(1 << 4);
    pub const SUDDENDEATH: Mods = Mods(1 << 5);
    pub const DOUBLETIME: Mods = Mods(1 << 6);
    pub const RELAX: Mods = Mods(1 << 7);
    pub const HALFTIME: Mods = Mods(1 << 8);
    pub const NIGHTCORE: Mods = Mods(1 << 9);
    pub const FLASHLIGHT: Mods = Mods(1 << 10);
    pub const AUTOPLAY: Mods = Mods(1 << 11);
    pub const SPUNOUT: Mods = Mods(1 << 12);
    pub const AUTOPILOT: Mods = Mods(1 << 13);
    pub const PERFECT: Mods = Mods(1 << 14);

    const ACRONYMS: [(Mods, &'static str); 15] = [
        (Self::NOFAIL, "NF"),
        (Self::EASY, "EZ"),
        (Self::TOUCHSCREEN, "TD"),
        (Self::HIDDEN, "HD"),
        (Self::HARDROCK, "HR"),
        (Self::SUDDENDEATH, "SD"),
        (Self::DOUBLETIME, "DT"),
        (Self::RELAX, "RX"),
        (Self::HALFTIME, "HT"),
        (Self::NIGHTCORE, "NC"),
        (Self::FLASHLIGHT, "FL"),
        (Self::AUTOPLAY, "AU"),
        (Self::SPUNOUT, "SO"),
        (Self::AUTOPILOT, "AP"),
        (Self::PERFECT, "PF"),
    ];

    pub fn contains(self, other: Mods) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Mods {
    /// Concatenated acronyms, e.g. `HDDT`. Nightcore implies doubletime and
    /// perfect implies sudden death, so the implied mod is not repeated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NM");
        }
        for (flag, acronym) in Self::ACRONYMS {
            if !self.contains(flag) {
                continue;
            }
            if flag == Self::DOUBLETIME && self.contains(Self::NIGHTCORE) {
                continue;
            }
            if flag == Self::SUDDENDEATH && self.contains(Self::PERFECT) {
                continue;
            }
            f.write_str(acronym)?;
        }
        Ok(())
    }
}

/// A persisted score, as far as ranking and announcements need it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: i64,
    pub map_md5: String,
    pub user_id: i64,
    pub mode: GameMode,
    pub score: u64,
    pub pp: f64,
    pub acc: f64,
    pub max_combo: u32,
    pub nmiss: u32,
    pub mods: Mods,
    pub status: SubmissionStatus,
}

/// The value a score is compared on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Score(u64),
    Pp(f64),
}

impl MetricValue {
    pub fn metric(&self) -> ScoringMetric {
        match self {
            Self::Score(_) => ScoringMetric::Score,
            Self::Pp(_) => ScoringMetric::Pp,
        }
    }

    /// True when `record`'s value for the same metric is strictly greater.
    pub fn is_beaten_by(&self, record: &ScoreRecord) -> bool {
        match *self {
            Self::Score(value) => record.score > value,
            Self::Pp(value) => record.pp > value,
        }
    }
}

/// Everything the store needs to count the scores ahead of one score.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementQuery {
    pub map_md5: String,
    pub mode: GameMode,
    pub value: MetricValue,
}

impl PlacementQuery {
    pub fn for_score(score: &ScoreRecord) -> Self {
        let value = match score.mode.scoring_metric() {
            ScoringMetric::Score => MetricValue::Score(score.score),
            ScoringMetric::Pp => MetricValue::Pp(score.pp),
        };
        Self {
            map_md5: score.map_md5.clone(),
            mode: score.mode,
            value,
        }
    }
}
