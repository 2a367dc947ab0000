//! File formats for the fretwork rhythm engine.
//!
//! Parses `.chart` files into the IR and reads/writes the WAV container
//! used for offline renders.

mod chart_format;
mod chart_raw;
mod wav_format;

use thiserror::Error;

pub use chart_format::{load_chart, open_chart, parse_chart};
pub use chart_raw::{parse_raw, Entry, RawChart, Section, Value};
pub use wav_format::{parse_wav, pcm_to_wav, write_wav, WavPcm};

/// Why a line broke the section structure of a chart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("section header inside an open section")]
    UnexpectedHeader,
    #[error("'{{' without a preceding section header")]
    UnexpectedOpenBrace,
    #[error("'}}' without an open section")]
    UnexpectedCloseBrace,
    #[error("section [{0}] has no entries")]
    EmptySection(String),
    #[error("duplicate section [{0}]")]
    DuplicateSection(String),
    #[error("value line outside any section")]
    ValueOutsideSection,
    #[error("missing '=' in value line")]
    MissingEquals,
    #[error("unterminated quoted string")]
    UnterminatedString,
    #[error("end of input while section [{0}] is still open")]
    UnterminatedSection(String),
}

/// Error type for chart loading.
#[derive(Debug, Error)]
pub enum ChartError {
    /// The file could not be read
    #[error("failed to read chart: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed section nesting or line syntax
    #[error("line {line}: {kind}")]
    Structure { line: usize, kind: StructureError },
    /// A required section is absent
    #[error("missing required section [{0}]")]
    MissingSection(&'static str),
    /// A value has the wrong type or arity
    #[error("line {line}: [{section}] {key}: expected {expected}")]
    InvalidField {
        section: String,
        key: String,
        line: usize,
        expected: &'static str,
    },
    /// A row key is not an integer tick
    #[error("line {line}: [{section}] '{key}' is not a tick")]
    InvalidTick {
        section: String,
        key: String,
        line: usize,
    },
}

/// Error type for WAV reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WavError {
    /// Missing RIFF/WAVE magic or required chunks
    #[error("invalid WAV header")]
    InvalidHeader,
    /// File ends before the header does
    #[error("unexpected end of WAV data")]
    UnexpectedEof,
    /// Anything other than 16-bit integer PCM
    #[error("unsupported WAV encoding: {0}")]
    Unsupported(&'static str),
}
