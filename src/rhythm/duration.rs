use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Floating point slack used for every beat comparison.
pub const TOLERANCE: f64 = 1e-9;

/// Note lengths in transport notation, quarter note = 1 beat.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Duration {
    #[serde(rename = "32n")]
    ThirtySecond,
    #[serde(rename = "16n")]
    Sixteenth,
    #[serde(rename = "16n.")]
    DottedSixteenth,
    #[serde(rename = "8n")]
    Eighth,
    #[serde(rename = "8n.")]
    DottedEighth,
    #[serde(rename = "4n")]
    Quarter,
    #[serde(rename = "4n.")]
    DottedQuarter,
    #[serde(rename = "2n")]
    Half,
    #[serde(rename = "2n.")]
    DottedHalf,
    #[serde(rename = "1n")]
    Whole,
}

impl Duration {
    /// Every duration, shortest first.
    pub const ALL: [Duration; 10] = [
        Duration::ThirtySecond,
        Duration::Sixteenth,
        Duration::DottedSixteenth,
        Duration::Eighth,
        Duration::DottedEighth,
        Duration::Quarter,
        Duration::DottedQuarter,
        Duration::Half,
        Duration::DottedHalf,
        Duration::Whole,
    ];

    pub fn beats(self) -> f64 {
        match self {
            Duration::ThirtySecond => 1.0 / 8.0,
            Duration::Sixteenth => 1.0 / 4.0,
            Duration::DottedSixteenth => 3.0 / 8.0,
            Duration::Eighth => 1.0 / 2.0,
            Duration::DottedEighth => 3.0 / 4.0,
            Duration::Quarter => 1.0,
            Duration::DottedQuarter => 1.5,
            Duration::Half => 2.0,
            Duration::DottedHalf => 3.0,
            Duration::Whole => 4.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Duration::ThirtySecond => "32n",
            Duration::Sixteenth => "16n",
            Duration::DottedSixteenth => "16n.",
            Duration::Eighth => "8n",
            Duration::DottedEighth => "8n.",
            Duration::Quarter => "4n",
            Duration::DottedQuarter => "4n.",
            Duration::Half => "2n",
            Duration::DottedHalf => "2n.",
            Duration::Whole => "1n",
        }
    }

    /// Shortest entry in the table.
    pub fn shortest() -> Duration {
        Duration::ALL[0]
    }

    /// Reverse lookup of a beat value, within `TOLERANCE`.
    pub fn from_beats(beats: f64) -> Option<Duration> {
        Duration::ALL
            .iter()
            .copied()
            .find(|d| (d.beats() - beats).abs() < TOLERANCE)
    }

    /// Durations whose value lies in `[min, max]`, shortest first.
    pub fn within(min: f64, max: f64) -> Vec<Duration> {
        Duration::ALL
            .iter()
            .copied()
            .filter(|d| d.beats() >= min - TOLERANCE && d.beats() <= max + TOLERANCE)
            .collect()
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Duration {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Duration::ALL
            .iter()
            .copied()
            .find(|d| d.symbol() == s)
            .ok_or_else(|| GenerationError::InvalidInput(format!("Unknown duration: {}", s)))
    }
}
