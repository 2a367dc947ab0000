//! Note type.

use crate::timing::Tick;

/// Number of playable lanes (fret buttons).
pub const LANE_COUNT: usize = 5;

/// A single note in an instrument track.
///
/// Lanes above `LANE_COUNT - 1` carry modifier flags in the file format
/// (forced, tap, open). They are kept so the track mirrors the file, but
/// the judge ignores them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Note {
    /// Tick of the note head
    pub tick: Tick,
    /// Lane index
    pub lane: u8,
    /// Sustain length in ticks (0 for a tap note)
    pub length: Tick,
}

impl Note {
    pub const fn new(tick: Tick, lane: u8, length: Tick) -> Self {
        Self { tick, lane, length }
    }

    /// True if the note has a sustain tail.
    pub fn is_sustain(&self) -> bool {
        self.length > 0
    }

    /// True if the lane maps to a fret button.
    pub fn is_playable(&self) -> bool {
        (self.lane as usize) < LANE_COUNT
    }

    /// Tick at which the sustain tail ends. Saturates at `Tick::MAX`.
    pub fn end_tick(&self) -> Tick {
        self.tick.saturating_add(self.length)
    }
}
