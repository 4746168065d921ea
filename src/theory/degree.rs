use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::theory::notes::{NoteName, PitchClass};

/// Returned by the string adapters when a key, note or degree is unrecognized.
pub const UNKNOWN_DEGREE: &str = "?";

/// Semitone offset of each diatonic degree 1-7 in a major key.
const DIATONIC_OFFSETS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Sharp-suffix spelling, indexed by semitone offset.
const SHARP_LABELS: [&str; 12] = [
    "1", "1#", "2", "2#", "3", "4", "4#", "5", "5#", "6", "6#", "7",
];

/// Flat-prefix spelling, indexed by semitone offset.
const FLAT_LABELS: [&str; 12] = [
    "1", "b2", "2", "b3", "3", "4", "b5", "5", "b6", "6", "b7", "7",
];

/// A scale degree stored as its semitone offset (0-11) above the tonic.
///
/// Both legacy spellings parse to the same value: `"2#"` and `"b3"` are
/// offset 3. `Display` uses the sharp-suffix form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScaleDegree {
    offset: u8,
}

impl ScaleDegree {
    pub fn from_offset(offset: i32) -> Self {
        ScaleDegree {
            offset: offset.rem_euclid(12) as u8,
        }
    }

    /// Degree `number` (1-7) of the major scale.
    pub fn diatonic(number: u8) -> Option<Self> {
        let index = number.checked_sub(1)? as usize;
        DIATONIC_OFFSETS
            .get(index)
            .map(|&offset| ScaleDegree { offset })
    }

    pub fn offset(self) -> u8 {
        self.offset
    }

    pub fn is_diatonic(self) -> bool {
        DIATONIC_OFFSETS.contains(&self.offset)
    }

    pub fn sharp_label(self) -> &'static str {
        SHARP_LABELS[self.offset as usize]
    }

    pub fn flat_label(self) -> &'static str {
        FLAT_LABELS[self.offset as usize]
    }
}

impl fmt::Display for ScaleDegree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sharp_label())
    }
}

fn accidental_value(s: &str) -> Option<i32> {
    match s {
        "" => Some(0),
        "#" => Some(1),
        "##" => Some(2),
        "b" => Some(-1),
        "bb" => Some(-2),
        _ => None,
    }
}

impl FromStr for ScaleDegree {
    type Err = GenerationError;

    /// Accepts `{b,#,bb,##}?[1-7]` and the older `[1-7]{#,##}` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GenerationError::InvalidDegree(s.to_string());
        let token = s.trim().to_ascii_lowercase();
        let digit_at = token.find(|c: char| c.is_ascii_digit()).ok_or_else(invalid)?;
        let (prefix, rest) = token.split_at(digit_at);
        let mut rest_chars = rest.chars();
        let number = rest_chars
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(invalid)? as u8;
        let suffix = rest_chars.as_str();
        let base = ScaleDegree::diatonic(number).ok_or_else(invalid)?;

        let alter = match (prefix, suffix) {
            (p, "") => accidental_value(p),
            ("", "#") => Some(1),
            ("", "##") => Some(2),
            _ => None,
        }
        .ok_or_else(invalid)?;

        Ok(ScaleDegree::from_offset(base.offset as i32 + alter))
    }
}

impl TryFrom<String> for ScaleDegree {
    type Error = GenerationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScaleDegree> for String {
    fn from(value: ScaleDegree) -> Self {
        value.to_string()
    }
}

pub fn degree_from_note(note: PitchClass, key: PitchClass) -> ScaleDegree {
    ScaleDegree::from_offset(key.offset_to(note) as i32)
}

pub fn note_from_degree(degree: ScaleDegree, key: PitchClass) -> PitchClass {
    key.transpose(degree.offset as i32)
}

/// Read a note token with or without an octave ("E4" or "E").
fn parse_pitch_class(token: &str) -> Option<PitchClass> {
    token
        .parse::<NoteName>()
        .map(NoteName::pitch_class)
        .or_else(|_| token.parse::<PitchClass>())
        .ok()
}

/// String form of `degree_from_note`; `"?"` for an unknown key or note.
pub fn degree_label(note: &str, key: &str) -> String {
    match (parse_pitch_class(note), key.parse::<PitchClass>()) {
        (Some(note), Ok(key)) => degree_from_note(note, key).to_string(),
        _ => UNKNOWN_DEGREE.to_string(),
    }
}

/// String form of `note_from_degree`; `"?"` for an unknown key or degree.
pub fn note_label(degree: &str, key: &str) -> String {
    match (degree.parse::<ScaleDegree>(), key.parse::<PitchClass>()) {
        (Ok(degree), Ok(key)) => note_from_degree(degree, key).to_string(),
        _ => UNKNOWN_DEGREE.to_string(),
    }
}

/// Split a degree list such as `"(1,3,5)"` or `"1, 3,5"` into tokens.
///
/// Blank input gives `None`; `"()"` gives an empty list.
pub fn parse_degree_list(input: &str) -> Option<Vec<String>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let content = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);

    Some(
        content
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pc(s: &str) -> PitchClass {
        s.parse().unwrap()
    }

    #[test]
    fn test_both_spellings_parse() {
        assert_eq!("2#".parse::<ScaleDegree>().unwrap().offset(), 3);
        assert_eq!("b3".parse::<ScaleDegree>().unwrap().offset(), 3);
        assert_eq!("#4".parse::<ScaleDegree>().unwrap().offset(), 6);
        assert_eq!("bb7".parse::<ScaleDegree>().unwrap().offset(), 9);
        assert_eq!("##1".parse::<ScaleDegree>().unwrap().offset(), 2);
        assert_eq!("B2".parse::<ScaleDegree>().unwrap().offset(), 1);
        assert_eq!("b1".parse::<ScaleDegree>().unwrap().offset(), 11);
        for bad in ["", "8", "0", "x3", "3b", "b#3", "12", "#"] {
            assert!(bad.parse::<ScaleDegree>().is_err(), "{} should fail", bad);
        }
    }

    #[test]
    fn test_labels() {
        let d: ScaleDegree = "b6".parse().unwrap();
        assert_eq!(d.to_string(), "5#");
        assert_eq!(d.flat_label(), "b6");
        assert!(!d.is_diatonic());
        assert!(ScaleDegree::diatonic(4).unwrap().is_diatonic());
        assert_eq!(ScaleDegree::diatonic(0), None);
        assert_eq!(ScaleDegree::diatonic(8), None);
    }

    #[test]
    fn test_degree_from_note() {
        assert_eq!(degree_from_note(pc("E"), pc("C")).to_string(), "3");
        assert_eq!(degree_from_note(pc("F#"), pc("D")).to_string(), "3");
        assert_eq!(degree_from_note(pc("C#"), pc("D")).to_string(), "7");
        assert_eq!(degree_from_note(pc("C"), pc("D")).to_string(), "6#");
        assert_eq!(degree_from_note(pc("C#"), pc("C")).to_string(), "1#");
    }

    #[test]
    fn test_diatonic_roundtrip_all_keys() {
        for key in 0..12 {
            let key = PitchClass::new(key);
            for number in 1..=7 {
                let degree = ScaleDegree::diatonic(number).unwrap();
                let note = note_from_degree(degree, key);
                assert_eq!(degree_from_note(note, key), degree);
                assert_eq!(degree_from_note(note, key).to_string(), number.to_string());
            }
        }
    }

    #[test]
    fn test_string_adapters() {
        assert_eq!(degree_label("E4", "C"), "3");
        assert_eq!(degree_label("G", "C"), "5");
        assert_eq!(degree_label("E4", "H"), UNKNOWN_DEGREE);
        assert_eq!(degree_label("nope", "C"), UNKNOWN_DEGREE);
        assert_eq!(note_label("b2", "C"), "C#");
        assert_eq!(note_label("1#", "C"), "C#");
        assert_eq!(note_label("5", "A#"), "F");
        assert_eq!(note_label("9", "C"), UNKNOWN_DEGREE);
    }

    #[test]
    fn test_parse_degree_list() {
        assert_eq!(
            parse_degree_list("(1,3,5)"),
            Some(vec!["1".to_string(), "3".to_string(), "5".to_string()])
        );
        assert_eq!(
            parse_degree_list(" 1, b3 ,,5 "),
            Some(vec!["1".to_string(), "b3".to_string(), "5".to_string()])
        );
        assert_eq!(parse_degree_list("()"), Some(vec![]));
        assert_eq!(parse_degree_list("   "), None);
    }
}
