//! Real-time core of the fretwork rhythm engine.
//!
//! The [`Mixer`] sums concurrently playing PCM clips into fixed-size output
//! periods. The [`ChartCursor`] walks a chart's tick timeline, and the
//! [`Judge`] turns the cursor's events plus player input into a score.

mod clip;
mod cursor;
mod judge;
mod mixer;
mod pcm;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use clip::{ClipHandle, ClipId, PcmSource};
pub use cursor::{ChartCursor, CursorError, PendingEvents};
pub use judge::{Judge, JudgeConfig, Judgment, LaneInput, NotePosition, StrumFeedback, TickReport};
pub use mixer::{Mixer, MixerError, DEFAULT_MIX_AMP};
pub use pcm::{
    decode_sample, encode_sample, mix_pcm, samples_to_bytes, PcmFormat, BYTES_PER_SAMPLE,
};

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Mixer and clip state is only mutated in short sections that leave it
/// consistent, so a poisoned lock carries no torn state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
