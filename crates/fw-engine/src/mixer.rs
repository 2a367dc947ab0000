//! Multi-clip PCM mixer.
//!
//! Each output period the owner calls [`Mixer::fill_buffers`], which does
//! all source I/O, then [`Mixer::mix_into`], a pure numeric pass over the
//! already-read bytes. [`Mixer::render_period`] does both plus the clock.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, warn};
use slotmap::SlotMap;
use thiserror::Error;

use crate::clip::{ClipControl, ClipHandle, ClipId, PcmSource, SharedControl};
use crate::lock;
use crate::pcm::{mix_pcm, PcmFormat};

/// Global gain applied on top of every clip's volume.
pub const DEFAULT_MIX_AMP: f64 = 1.0;

/// Error type for starting playback.
#[derive(Debug, Error)]
pub enum MixerError {
    /// The source could not be opened or its length determined
    #[error("cannot open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One active playback inside the mixer.
struct Clip {
    source: PcmSource,
    /// Always `format.buffer_size()` bytes
    buffer: Box<[u8]>,
    /// Bytes of `buffer` holding data from the last fill
    valid: usize,
    control: SharedControl,
    serial: u64,
}

/// Why a clip left the active set.
enum Retire {
    EndOfStream,
    Stopped,
    ReadError(io::Error),
}

impl Clip {
    /// Refill the buffer from the source. `Err` means the clip must retire.
    fn fill(&mut self) -> Result<(), Retire> {
        if lock(&self.control).stop_requested {
            return Err(Retire::Stopped);
        }
        self.valid = 0;
        while self.valid < self.buffer.len() {
            match self.source.read(&mut self.buffer[self.valid..]) {
                Ok(0) => return Err(Retire::EndOfStream),
                Ok(n) => {
                    self.valid += n;
                    lock(&self.control).bytes_read += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Retire::ReadError(e)),
            }
        }
        Ok(())
    }

    /// Release the source, then tell the handle the clip is gone.
    fn finish(self, reason: Retire) {
        let Clip {
            source,
            control,
            serial,
            ..
        } = self;
        match reason {
            Retire::EndOfStream => debug!("clip #{} ({}) finished", serial, source.label()),
            Retire::Stopped => debug!("clip #{} ({}) stopped", serial, source.label()),
            Retire::ReadError(e) => {
                error!("clip #{} ({}) read failed, dropping it: {}", serial, source.label(), e)
            }
        }
        drop(source);
        lock(&control).retire();
    }
}

struct MixerState {
    clips: SlotMap<ClipId, Clip>,
    paused: bool,
    next_serial: u64,
    /// Frames rendered while not paused
    elapsed_frames: u64,
    /// Clips found finished during a fill. Capacity is reserved when clips
    /// are added, so the output thread never grows it.
    retiring: Vec<(ClipId, Retire)>,
}

pub(crate) struct MixerShared {
    format: PcmFormat,
    /// Geometry failed validation; every period renders silence
    silent: bool,
    mix_amp: f64,
    state: Mutex<MixerState>,
}

impl MixerShared {
    fn state(&self) -> MutexGuard<'_, MixerState> {
        lock(&self.state)
    }

    pub(crate) fn contains(&self, id: ClipId) -> bool {
        self.state().clips.contains_key(id)
    }
}

impl Drop for MixerShared {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for (_, clip) in state.clips.drain() {
            clip.finish(Retire::Stopped);
        }
    }
}

/// A set of concurrently playing clips summed into one PCM stream.
///
/// Cheap to clone; clones share the same clips, pause flag and clock.
#[derive(Clone)]
pub struct Mixer {
    shared: Arc<MixerShared>,
}

impl Mixer {
    /// Create a mixer for the given output geometry.
    ///
    /// The format should already have passed [`PcmFormat::validate`]. A
    /// mixer built from an invalid one accepts clips but renders silence
    /// and never advances its clock.
    pub fn new(format: PcmFormat, mix_amp: f64) -> Self {
        let silent = match format.validate() {
            Ok(()) => false,
            Err(reason) => {
                warn!("invalid mixer geometry {:?}: {}", format, reason);
                true
            }
        };
        Self {
            shared: Arc::new(MixerShared {
                format,
                silent,
                mix_amp,
                state: Mutex::new(MixerState {
                    clips: SlotMap::with_key(),
                    paused: false,
                    next_serial: 0,
                    elapsed_frames: 0,
                    retiring: Vec::new(),
                }),
            }),
        }
    }

    pub fn format(&self) -> PcmFormat {
        self.shared.format
    }

    pub fn mix_amp(&self) -> f64 {
        self.shared.mix_amp
    }

    /// Size of the frame passed to `mix_into`.
    pub fn buffer_size(&self) -> usize {
        self.shared.format.buffer_size()
    }

    // --- Clips ---

    /// Open a raw PCM file and start playing it.
    pub fn play(&self, path: impl AsRef<Path>, volume: f64) -> Result<ClipHandle, MixerError> {
        let path = path.as_ref();
        let source = PcmSource::open(path).map_err(|source| MixerError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.play_source(source, volume))
    }

    /// Start playing an already opened source.
    pub fn play_source(&self, source: PcmSource, volume: f64) -> ClipHandle {
        let control = Arc::new(Mutex::new(ClipControl::new(volume, source.total_bytes())));
        let mut state = self.shared.state();
        let serial = state.next_serial;
        state.next_serial += 1;
        debug!(
            "clip #{} ({}) started, {} bytes at volume {}",
            serial,
            source.label(),
            source.total_bytes(),
            volume
        );
        let id = state.clips.insert(Clip {
            source,
            buffer: vec![0u8; self.shared.format.buffer_size()].into_boxed_slice(),
            valid: 0,
            control: Arc::clone(&control),
            serial,
        });
        let clips = state.clips.len();
        state.retiring.reserve(clips);
        ClipHandle::new(id, serial, control, Arc::downgrade(&self.shared))
    }

    /// Number of clips in the active set.
    pub fn active_clips(&self) -> usize {
        self.shared.state().clips.len()
    }

    pub fn contains(&self, id: ClipId) -> bool {
        self.shared.contains(id)
    }

    // --- Per-period work ---

    /// Refill every clip's buffer. Clips that hit end of stream, fail to
    /// read or have a pending stop are retired. No-op while paused.
    pub fn fill_buffers(&self) {
        let mut guard = self.shared.state();
        if guard.paused || self.shared.silent {
            return;
        }
        let MixerState {
            clips, retiring, ..
        } = &mut *guard;
        for (id, clip) in clips.iter_mut() {
            if let Err(reason) = clip.fill() {
                retiring.push((id, reason));
            }
        }
        for (id, reason) in retiring.drain(..) {
            if let Some(clip) = clips.remove(id) {
                clip.finish(reason);
            }
        }
    }

    /// Add every clip's buffered frames onto `out`, scaled by
    /// `mix_amp × volume` and hard-clipped. No-op while paused.
    pub fn mix_into(&self, out: &mut [u8]) {
        let state = self.shared.state();
        if state.paused || state.clips.is_empty() || self.shared.silent {
            return;
        }
        let stride = self.shared.format.frame_stride();
        let max_frames = self.shared.format.frames_per_write.min(out.len() / stride);
        for clip in state.clips.values() {
            let frames = (clip.valid / stride).min(max_frames);
            if frames == 0 {
                continue;
            }
            let gain = self.shared.mix_amp * lock(&clip.control).volume;
            let len = frames * stride;
            mix_pcm(&mut out[..len], &clip.buffer[..len], gain);
        }
    }

    /// One output period: clear `out`, fill, mix and advance the clock.
    pub fn render_period(&self, out: &mut [u8]) {
        out.fill(0);
        self.fill_buffers();
        self.mix_into(out);
        let mut state = self.shared.state();
        if !state.paused && !self.shared.silent {
            state.elapsed_frames += self.shared.format.frames_per_write as u64;
        }
    }

    // --- Transport ---

    pub fn pause(&self) {
        self.shared.state().paused = true;
    }

    pub fn resume(&self) {
        self.shared.state().paused = false;
    }

    /// Flip the pause flag and return the new value.
    pub fn toggle_pause(&self) -> bool {
        let mut state = self.shared.state();
        state.paused = !state.paused;
        state.paused
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state().paused
    }

    /// Playback clock: time rendered while not paused.
    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed_secs())
    }

    pub fn elapsed_secs(&self) -> f64 {
        let frames = self.shared.state().elapsed_frames;
        frames as f64 / self.shared.format.sample_rate as f64
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(PcmFormat::default(), DEFAULT_MIX_AMP)
    }
}
