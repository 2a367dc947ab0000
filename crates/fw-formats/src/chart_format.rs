//! Semantic pass: raw sections into a typed [`Chart`].

use std::fs;
use std::path::Path;

use fw_ir::{Chart, Note, SongMetadata, TempoChange, Tick, TimeSignatureChange, Track};
use log::debug;

use crate::chart_raw::{parse_raw, Entry, RawChart, Section, Value};
use crate::ChartError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Sections that never become instrument tracks.
const RESERVED_SECTIONS: &[&str] = &["Song", "SyncTrack", "Events"];

/// Read and parse a chart file.
pub fn open_chart(path: impl AsRef<Path>) -> Result<Chart, ChartError> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    debug!("loading chart {}", path.display());
    load_chart(&data)
}

/// Parse chart bytes. A UTF-8 byte-order mark is skipped and invalid UTF-8
/// is replaced rather than rejected.
pub fn load_chart(data: &[u8]) -> Result<Chart, ChartError> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    parse_chart(&String::from_utf8_lossy(data))
}

/// Parse chart text.
pub fn parse_chart(text: &str) -> Result<Chart, ChartError> {
    let raw = parse_raw(text)?;
    build_chart(&raw)
}

fn build_chart(raw: &RawChart) -> Result<Chart, ChartError> {
    let song = raw.section("Song").ok_or(ChartError::MissingSection("Song"))?;
    let sync = raw
        .section("SyncTrack")
        .ok_or(ChartError::MissingSection("SyncTrack"))?;

    let mut chart = Chart::new(parse_metadata(song)?);
    parse_sync_track(sync, &mut chart)?;

    for section in &raw.sections {
        if RESERVED_SECTIONS.contains(&section.name.as_str()) {
            continue;
        }
        let track = parse_track(section)?;
        debug!("track [{}]: {} notes", track.name, track.notes.len());
        chart.tracks.push(track);
    }

    chart.sort_sync_track();
    Ok(chart)
}

// --- Field access ---

fn invalid(section: &Section, entry: &Entry, expected: &'static str) -> ChartError {
    ChartError::InvalidField {
        section: section.name.clone(),
        key: entry.key.clone(),
        line: entry.line,
        expected,
    }
}

fn string_field(section: &Section, entry: &Entry) -> Result<String, ChartError> {
    entry
        .values
        .first()
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(section, entry, "string"))
}

fn float_field(section: &Section, entry: &Entry) -> Result<f64, ChartError> {
    entry
        .values
        .first()
        .and_then(Value::as_f64)
        .ok_or_else(|| invalid(section, entry, "number"))
}

fn int_value(
    section: &Section,
    entry: &Entry,
    index: usize,
    expected: &'static str,
) -> Result<i64, ChartError> {
    entry
        .values
        .get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| invalid(section, entry, expected))
}

fn tick_key(section: &Section, entry: &Entry) -> Result<Tick, ChartError> {
    entry.key.parse().map_err(|_| ChartError::InvalidTick {
        section: section.name.clone(),
        key: entry.key.clone(),
        line: entry.line,
    })
}

fn row_kind<'a>(section: &Section, entry: &'a Entry) -> Result<&'a str, ChartError> {
    entry
        .values
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(section, entry, "row kind"))
}

// --- Sections ---

fn parse_metadata(section: &Section) -> Result<SongMetadata, ChartError> {
    let mut meta = SongMetadata::default();
    for entry in &section.entries {
        match entry.key.as_str() {
            "Name" => meta.title = string_field(section, entry)?,
            "Artist" => meta.artist = string_field(section, entry)?,
            "Album" => meta.album = string_field(section, entry)?,
            "Genre" => meta.genre = string_field(section, entry)?,
            "Year" => meta.year = string_field(section, entry)?,
            "Charter" => meta.charter = string_field(section, entry)?,
            "MusicStream" => meta.music_stream = string_field(section, entry)?,
            "Resolution" => {
                let resolution = int_value(section, entry, 0, "positive integer")?;
                meta.resolution = u32::try_from(resolution)
                    .ok()
                    .filter(|&r| r > 0)
                    .ok_or_else(|| invalid(section, entry, "positive integer"))?;
            }
            "Difficulty" => meta.difficulty = int_value(section, entry, 0, "integer")?,
            "Offset" => meta.offset = float_field(section, entry)?,
            "PreviewStart" => meta.preview_start = float_field(section, entry)?,
            "PreviewEnd" => meta.preview_end = float_field(section, entry)?,
            "Length" => meta.length = float_field(section, entry)?,
            _ => {}
        }
    }
    Ok(meta)
}

fn parse_sync_track(section: &Section, chart: &mut Chart) -> Result<(), ChartError> {
    for entry in &section.entries {
        let tick = tick_key(section, entry)?;
        match row_kind(section, entry)? {
            "B" => {
                let raw_bpm = int_value(section, entry, 1, "positive tempo")?;
                if raw_bpm <= 0 {
                    return Err(invalid(section, entry, "positive tempo"));
                }
                chart
                    .tempo_changes
                    .push(TempoChange::new(tick, raw_bpm as f64 / 1000.0));
            }
            "TS" => {
                let numerator = int_value(section, entry, 1, "time-signature numerator")?;
                let numerator = u32::try_from(numerator)
                    .map_err(|_| invalid(section, entry, "time-signature numerator"))?;
                let change = match entry.values.get(2) {
                    None => TimeSignatureChange::new(tick, numerator, fw_ir::DEFAULT_DENOMINATOR),
                    Some(_) => {
                        let exponent = int_value(section, entry, 2, "denominator exponent")?;
                        u32::try_from(exponent)
                            .ok()
                            .and_then(|e| TimeSignatureChange::from_exponent(tick, numerator, e))
                            .ok_or_else(|| invalid(section, entry, "denominator exponent"))?
                    }
                };
                chart.time_signatures.push(change);
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_track(section: &Section) -> Result<Track, ChartError> {
    let mut notes = Vec::new();
    for entry in &section.entries {
        let tick = tick_key(section, entry)?;
        if row_kind(section, entry)? != "N" {
            continue;
        }
        let lane = int_value(section, entry, 1, "note lane")?;
        let lane = u8::try_from(lane).map_err(|_| invalid(section, entry, "note lane"))?;
        let length = int_value(section, entry, 2, "note length")?;
        let length = Tick::try_from(length).map_err(|_| invalid(section, entry, "note length"))?;
        notes.push(Note::new(tick, lane, length));
    }
    Ok(Track::new(section.name.clone(), notes))
}
