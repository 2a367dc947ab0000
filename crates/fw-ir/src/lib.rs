//! Chart data model for the fretwork rhythm engine.
//!
//! This crate defines the typed chart every other crate works with: the
//! parser in `fw-formats` emits it, and the cursor and judge in
//! `fw-engine` consume it.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod chart;
mod event;
mod note;
mod timing;

pub use chart::{Chart, SongMetadata, Track};
pub use event::ChartEvent;
pub use note::{Note, LANE_COUNT};
pub use timing::{
    seconds_to_ticks, ticks_per_second, ticks_to_seconds, TempoChange, Tick,
    TimeSignatureChange, DEFAULT_BPM, DEFAULT_DENOMINATOR, DEFAULT_RESOLUTION,
};
