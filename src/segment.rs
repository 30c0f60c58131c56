//! LTV value segments and threshold-based classification.

use serde::{Deserialize, Serialize};

/// Ordinal user-value segment, ordered `Low < Middle < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Low,
    Middle,
    High,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Middle => "middle",
            Self::High => "high",
        }
    }
}

/// Lower bounds for the `High` and `Middle` segments, in the same currency
/// unit as transaction prices. Anything below `middle` is `Low`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentThresholds {
    pub high: f64,
    pub middle: f64,
}

impl Default for SegmentThresholds {
    fn default() -> Self {
        Self {
            high: 10_000.0,
            middle: 1_000.0,
        }
    }
}

/// Maps an LTV value onto its segment. Total over all finite inputs.
pub fn classify(ltv: f64, thresholds: SegmentThresholds) -> Segment {
    if ltv >= thresholds.high {
        Segment::High
    } else if ltv >= thresholds.middle {
        Segment::Middle
    } else {
        Segment::Low
    }
}
