//! Headless front end for the fretwork rhythm engine.
//!
//! Owns configuration, per-client sessions with their output threads, song
//! playback against the mixer clock and offline rendering. The CLI and any
//! server front end share this API.

pub mod config;
mod render;
mod session;
mod song;

pub use config::{
    load_config, save_config, AudioConfig, ConfigError, FretworkConfig, GameplayConfig,
};
pub use render::{render_song, render_song_wav, RenderOutcome};
pub use session::{Session, SessionRegistry};
pub use song::{chart_music_path, open_music, SongError, SongPlayer};

// Re-export common types so callers don't need fw-ir/fw-engine directly.
pub use fw_engine::{
    ClipHandle, Judgment, LaneInput, Mixer, PcmFormat, PcmSource, StrumFeedback, TickReport,
};
pub use fw_formats::{open_chart, ChartError};
pub use fw_ir::{Chart, SongMetadata, Track};
