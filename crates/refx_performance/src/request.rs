/// Request and result shapes for the performance service
use serde::{Deserialize, Serialize};

/// One calculation as the service understands it. Absent fields are left to
/// the service's defaults and are not sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceRequest {
    pub beatmap_id: u32,
    pub mode: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mods: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_combo: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miss_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_score: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed_objects: Option<u32>,
}

impl PerformanceRequest {
    pub fn new(beatmap_id: u32, mode: u8) -> Self {
        Self {
            beatmap_id,
            mode,
            mods: None,
            max_combo: None,
            accuracy: None,
            miss_count: None,
            legacy_score: None,
            passed_objects: None,
        }
    }

    /// The same play at full combo without misses.
    pub fn hypothetical(&self) -> Self {
        Self {
            max_combo: None,
            miss_count: Some(0),
            ..self.clone()
        }
    }

    /// Copy with the mode folded onto the four base rulesets, as the service
    /// has no notion of relax or autopilot.
    pub fn for_wire(&self) -> Self {
        Self {
            mode: self.mode % 4,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub stars: f64,
    pub pp: f64,
}

impl PerformanceResult {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.stars == 0.0 && self.pp == 0.0
    }
}

/// Per-score input to a batch calculation on one beatmap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreParams {
    pub mode: u8,
    pub mods: Option<u32>,
    pub combo: Option<u32>,
    pub acc: Option<f64>,
    pub nmiss: Option<u32>,
    pub legacy_score: Option<u64>,
    pub passed_objects: Option<u32>,
}

impl ScoreParams {
    pub fn new(mode: u8) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Accuracy sent for this score. Missing and `0.0` both mean "not given"
    /// and become 100%.
    pub fn effective_accuracy(&self) -> f64 {
        match self.acc {
            Some(acc) if acc != 0.0 => acc,
            _ => 100.0,
        }
    }

    pub fn to_request(&self, beatmap_id: u32) -> PerformanceRequest {
        PerformanceRequest {
            beatmap_id,
            mode: self.mode,
            mods: self.mods,
            max_combo: self.combo,
            accuracy: Some(self.effective_accuracy()),
            miss_count: self.nmiss,
            legacy_score: self.legacy_score,
            passed_objects: self.passed_objects,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceValues {
    pub pp: f64,
    /// pp of the same play at full combo, when it was requested
    pub hypothetical_pp: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyValues {
    pub stars: f64,
}

/// Output of a batch calculation for one score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub performance: PerformanceValues,
    pub difficulty: DifficultyValues,
}

impl ScoreResult {
    pub fn new(result: PerformanceResult, hypothetical_pp: Option<f64>) -> Self {
        Self {
            performance: PerformanceValues {
                pp: result.pp,
                hypothetical_pp,
            },
            difficulty: DifficultyValues {
                stars: result.stars,
            },
        }
    }
}
