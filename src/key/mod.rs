//! Key and mode estimation from a 12-bin chroma summary.
//!
//! Pitch classes are indexed from A (A = 0, A# = 1, ... G# = 11). Every
//! detected key is reduced to a canonical label: minor keys keep their tonic,
//! major keys are filed under their relative minor.

pub mod estimator;
pub mod profiles;

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use estimator::{estimate, estimate_with};

/// Aggregated (or per-frame) energy per pitch class, A-indexed.
pub type ChromaVector = [f64; 12];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyError {
    #[error("chroma vector has no energy")]
    SilentChroma,
    #[error("chroma bin {index} is not a non-negative finite number: {value}")]
    InvalidChroma { index: usize, value: f64 },
    #[error("no relative minor configured for {0} major")]
    MissingRelativeMinor(PitchClass),
    #[error("unknown pitch class label: {0:?}")]
    UnknownPitchClass(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    A,
    ASharp,
    B,
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
}

impl PitchClass {
    /// All pitch classes in index order.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
    ];

    /// Semitones above A.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Pitch class for a semitone offset from A (wraps mod 12).
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }

    /// Label used for display and for destination folder names.
    pub fn label(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::ASharp => "A#",
            Self::B => "B",
            Self::C => "C",
            Self::CSharp => "C#",
            Self::D => "D",
            Self::DSharp => "D#",
            Self::E => "E",
            Self::F => "F",
            Self::FSharp => "F#",
            Self::G => "G",
            Self::GSharp => "G#",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PitchClass {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|pc| pc.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| KeyError::UnknownPitchClass(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Major,
    Minor,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => f.write_str("major"),
            Self::Minor => f.write_str("minor"),
        }
    }
}

/// How tonic and mode are chosen from a chroma vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KeyMethod {
    /// Tonic = strongest pitch class; mode = larger peak of the full
    /// cross-correlation against the unrotated major/minor profiles.
    #[default]
    Reference,
    /// Joint search over all 24 rotated profiles (Pearson correlation).
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedKey {
    pub tonic: PitchClass,
    pub mode: Mode,
}

impl DetectedKey {
    pub fn new(tonic: PitchClass, mode: Mode) -> Self {
        Self { tonic, mode }
    }

    /// Canonical (relative-minor) label for this key.
    pub fn canonical(&self) -> Result<PitchClass, KeyError> {
        canonicalize(self.tonic, self.mode)
    }
}

impl fmt::Display for DetectedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

/// Reduce a key to the tonic of its minor-mode equivalence class.
pub fn canonicalize(tonic: PitchClass, mode: Mode) -> Result<PitchClass, KeyError> {
    match mode {
        Mode::Minor => Ok(tonic),
        Mode::Major => relative_minor(tonic),
    }
}

/// Look up the relative minor of a major tonic.
pub fn relative_minor(tonic: PitchClass) -> Result<PitchClass, KeyError> {
    lookup_relative_minor(&profiles::RELATIVE_MINOR, tonic)
}

fn lookup_relative_minor(
    table: &[(PitchClass, PitchClass)],
    tonic: PitchClass,
) -> Result<PitchClass, KeyError> {
    table
        .iter()
        .find(|(major, _)| *major == tonic)
        .map(|(_, minor)| *minor)
        .ok_or(KeyError::MissingRelativeMinor(tonic))
}
