use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::quiz::ParseEnumError;

//
// ─── PITCH CLASS ───────────────────────────────────────────────────────────────
//

/// One of the twelve pitch classes, spelled with sharps.
///
/// Deserializes through `FromStr`, so flat spellings are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PitchClass {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C#")]
    CSharp,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D#")]
    DSharp,
    #[serde(rename = "E")]
    E,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "F#")]
    FSharp,
    #[serde(rename = "G")]
    G,
    #[serde(rename = "G#")]
    GSharp,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A#")]
    ASharp,
    #[serde(rename = "B")]
    B,
}

impl PitchClass {
    /// All pitch classes in chromatic order starting from C.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    /// Semitones above C.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PitchClass {
    type Err = ParseEnumError;

    /// Accepts sharp spellings and their enharmonic flats (`Db`, `Eb`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseEnumError {
            kind: "pitch class",
            raw: s.to_owned(),
        };
        let mut chars = s.trim().chars();
        let letter = chars.next().ok_or_else(err)?.to_ascii_uppercase();
        let natural = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(err()),
        };
        let accidental: i32 = match chars.as_str() {
            "" => 0,
            "#" | "♯" => 1,
            "b" | "♭" => -1,
            _ => return Err(err()),
        };
        let index = (natural + accidental).rem_euclid(12);
        Ok(Self::from_index(usize::try_from(index).map_err(|_| err())?))
    }
}

impl<'de> Deserialize<'de> for PitchClass {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

//
// ─── FRET POSITION ─────────────────────────────────────────────────────────────
//

pub const MAX_FRET: u8 = 24;
pub const STRING_COUNT: u8 = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PositionError {
    #[error("fret must be between 0 and {MAX_FRET}, got {0}")]
    InvalidFret(u8),

    #[error("string must be between 1 and {STRING_COUNT}, got {0}")]
    InvalidString(u8),
}

/// A single spot on the fretboard. Strings are numbered 1 (high E) to 6 (low E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPosition")]
pub struct FretPosition {
    fret: u8,
    string: u8,
}

#[derive(Deserialize)]
struct RawPosition {
    fret: u8,
    string: u8,
}

impl TryFrom<RawPosition> for FretPosition {
    type Error = PositionError;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        FretPosition::new(raw.fret, raw.string)
    }
}

impl FretPosition {
    /// # Errors
    ///
    /// Returns `PositionError` if the fret or string is off the board.
    pub fn new(fret: u8, string: u8) -> Result<Self, PositionError> {
        if fret > MAX_FRET {
            return Err(PositionError::InvalidFret(fret));
        }
        if string == 0 || string > STRING_COUNT {
            return Err(PositionError::InvalidString(string));
        }
        Ok(Self { fret, string })
    }

    #[must_use]
    pub fn fret(&self) -> u8 {
        self.fret
    }

    #[must_use]
    pub fn string(&self) -> u8 {
        self.string
    }
}

//
// ─── INTERVAL ──────────────────────────────────────────────────────────────────
//

/// Named intervals from unison to octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Unison,
    MinorSecond,
    MajorSecond,
    MinorThird,
    MajorThird,
    PerfectFourth,
    Tritone,
    PerfectFifth,
    MinorSixth,
    MajorSixth,
    MinorSeventh,
    MajorSeventh,
    Octave,
}

impl Interval {
    pub const ALL: [Interval; 13] = [
        Interval::Unison,
        Interval::MinorSecond,
        Interval::MajorSecond,
        Interval::MinorThird,
        Interval::MajorThird,
        Interval::PerfectFourth,
        Interval::Tritone,
        Interval::PerfectFifth,
        Interval::MinorSixth,
        Interval::MajorSixth,
        Interval::MinorSeventh,
        Interval::MajorSeventh,
        Interval::Octave,
    ];

    #[must_use]
    pub fn semitones(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::Unison => "unison",
            Interval::MinorSecond => "minor_second",
            Interval::MajorSecond => "major_second",
            Interval::MinorThird => "minor_third",
            Interval::MajorThird => "major_third",
            Interval::PerfectFourth => "perfect_fourth",
            Interval::Tritone => "tritone",
            Interval::PerfectFifth => "perfect_fifth",
            Interval::MinorSixth => "minor_sixth",
            Interval::MajorSixth => "major_sixth",
            Interval::MinorSeventh => "minor_seventh",
            Interval::MajorSeventh => "major_seventh",
            Interval::Octave => "octave",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "interval",
                raw: s.to_owned(),
            })
    }
}
