//! Chart: metadata, sync track and instrument tracks.

use alloc::string::String;
use alloc::vec::Vec;

use crate::note::Note;
use crate::timing::{
    ticks_per_second, ticks_to_seconds, TempoChange, Tick, TimeSignatureChange, DEFAULT_BPM,
    DEFAULT_DENOMINATOR, DEFAULT_RESOLUTION,
};

/// Song-level metadata from the `[Song]` section.
#[derive(Clone, Debug, PartialEq)]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub year: String,
    pub charter: String,
    /// Audio file the chart was authored against
    pub music_stream: String,
    /// Ticks per quarter note
    pub resolution: u32,
    pub difficulty: i64,
    /// Audio offset in seconds
    pub offset: f64,
    pub preview_start: f64,
    pub preview_end: f64,
    /// Song length in seconds, 0 if unknown
    pub length: f64,
}

impl Default for SongMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            genre: String::new(),
            year: String::new(),
            charter: String::new(),
            music_stream: String::new(),
            resolution: DEFAULT_RESOLUTION,
            difficulty: 0,
            offset: 0.0,
            preview_start: 0.0,
            preview_end: 0.0,
            length: 0.0,
        }
    }
}

/// One instrument/difficulty track, e.g. `ExpertSingle`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Track {
    /// Section name the track was read from
    pub name: String,
    /// Notes sorted by tick
    pub notes: Vec<Note>,
}

impl Track {
    /// Create a track, sorting notes by tick. Notes sharing a tick keep
    /// their file order.
    pub fn new(name: impl Into<String>, mut notes: Vec<Note>) -> Self {
        notes.sort_by_key(|n| n.tick);
        Self {
            name: name.into(),
            notes,
        }
    }

    /// Notes in one lane.
    pub fn notes_in_lane(&self, lane: u8) -> impl Iterator<Item = &Note> + '_ {
        self.notes.iter().filter(move |n| n.lane == lane)
    }

    /// Notes the judge can score.
    pub fn playable_notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.notes.iter().filter(|n| n.is_playable())
    }

    /// Last tick touched by any note, including sustain tails.
    pub fn last_tick(&self) -> Tick {
        self.notes.iter().map(Note::end_tick).max().unwrap_or(0)
    }
}

/// A parsed chart. Treated as immutable once built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chart {
    pub metadata: SongMetadata,
    /// Sorted by tick
    pub tempo_changes: Vec<TempoChange>,
    /// Sorted by tick
    pub time_signatures: Vec<TimeSignatureChange>,
    /// Instrument tracks in file order
    pub tracks: Vec<Track>,
}

impl Chart {
    /// Create an empty chart with the given metadata.
    pub fn new(metadata: SongMetadata) -> Self {
        Self {
            metadata,
            ..Default::default()
        }
    }

    /// Sort the sync track by tick. Entries sharing a tick keep file order.
    pub fn sort_sync_track(&mut self) {
        self.tempo_changes.sort_by_key(|t| t.tick);
        self.time_signatures.sort_by_key(|t| t.tick);
    }

    pub fn resolution(&self) -> u32 {
        self.metadata.resolution
    }

    /// Look up a track by section name.
    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name == name)
    }

    /// Index of a track by section name.
    pub fn track_index(&self, name: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.name == name)
    }

    pub fn track_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tracks.iter().map(|t| t.name.as_str())
    }

    /// Ticks per second before any sync event has been applied.
    pub fn initial_ticks_per_second(&self) -> f64 {
        let bpm = self.tempo_changes.first().map_or(DEFAULT_BPM, |t| t.bpm);
        let denominator = self
            .time_signatures
            .first()
            .map_or(DEFAULT_DENOMINATOR, |t| t.denominator);
        ticks_per_second(self.resolution(), bpm, denominator)
    }

    /// Real time at `tick`, following every tempo and time signature
    /// change before it.
    pub fn tick_to_seconds(&self, tick: Tick) -> f64 {
        let mut tempos = self.tempo_changes.iter().peekable();
        let mut signatures = self.time_signatures.iter().peekable();
        let mut bpm = DEFAULT_BPM;
        let mut denominator = DEFAULT_DENOMINATOR;
        let mut at = 0;
        let mut seconds = 0.0;

        loop {
            while let Some(change) = tempos.next_if(|t| t.tick <= at) {
                bpm = change.bpm;
            }
            while let Some(change) = signatures.next_if(|s| s.tick <= at) {
                denominator = change.denominator;
            }
            let next = [tempos.peek().map(|t| t.tick), signatures.peek().map(|s| s.tick)]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(Tick::MAX)
                .min(tick);
            let rate = ticks_per_second(self.resolution(), bpm, denominator);
            seconds += ticks_to_seconds(next - at, rate);
            at = next;
            if at >= tick {
                return seconds;
            }
        }
    }
}
