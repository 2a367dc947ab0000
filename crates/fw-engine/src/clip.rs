//! Clip sources, per-clip shared state and control handles.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::oneshot;

use crate::lock;
use crate::mixer::MixerShared;

slotmap::new_key_type! {
    /// Stable id of a clip in the mixer's arena.
    pub struct ClipId;
}

/// Raw PCM input for one clip: a byte stream plus its total length.
pub struct PcmSource {
    reader: Box<dyn Read + Send>,
    total_bytes: u64,
    label: String,
}

impl PcmSource {
    /// Open a headerless PCM file. Its byte length is the progress denominator.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let total_bytes = file.metadata()?.len();
        Ok(Self {
            reader: Box::new(BufReader::new(file)),
            total_bytes,
            label: path.display().to_string(),
        })
    }

    /// In-memory PCM.
    pub fn from_bytes(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        let total_bytes = bytes.len() as u64;
        Self {
            reader: Box::new(Cursor::new(bytes)),
            total_bytes,
            label: label.into(),
        }
    }

    /// Any reader whose length is known up front.
    pub fn from_reader(
        label: impl Into<String>,
        reader: impl Read + Send + 'static,
        total_bytes: u64,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            total_bytes,
            label: label.into(),
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for PcmSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcmSource")
            .field("label", &self.label)
            .field("total_bytes", &self.total_bytes)
            .finish_non_exhaustive()
    }
}

/// State shared between the mixer and a clip's handle.
#[derive(Debug)]
pub(crate) struct ClipControl {
    pub volume: f64,
    pub stop_requested: bool,
    /// Set once the mixer has dropped the clip
    pub retired: bool,
    pub bytes_read: u64,
    pub total_bytes: u64,
    /// Completion signal for a blocked `stop()`
    pub stop_ack: Option<oneshot::Sender<()>>,
}

impl ClipControl {
    pub fn new(volume: f64, total_bytes: u64) -> Self {
        Self {
            volume,
            stop_requested: false,
            retired: false,
            bytes_read: 0,
            total_bytes,
            stop_ack: None,
        }
    }

    /// Mark retired and release anyone waiting in `stop()`.
    pub fn retire(&mut self) {
        self.retired = true;
        if let Some(ack) = self.stop_ack.take() {
            let _ = ack.send(());
        }
    }
}

pub(crate) type SharedControl = Arc<Mutex<ClipControl>>;

/// Caller-side control of one playing clip.
///
/// Holds the clip's id and a weak reference to the mixer, so it never keeps
/// a retired clip or a dropped mixer alive. Every call stays valid after the
/// clip is gone.
#[derive(Debug)]
pub struct ClipHandle {
    id: ClipId,
    serial: u64,
    control: SharedControl,
    mixer: Weak<MixerShared>,
}

impl ClipHandle {
    pub(crate) fn new(
        id: ClipId,
        serial: u64,
        control: SharedControl,
        mixer: Weak<MixerShared>,
    ) -> Self {
        Self {
            id,
            serial,
            control,
            mixer,
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    /// Order in which the clip was started on its mixer.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Request a stop and block until the mixer has released the clip.
    ///
    /// The mixer acts on the request in its next `fill_buffers`, so this
    /// waits up to one output period, or until the mixer is resumed if it
    /// is paused. Returns immediately if the clip has already been retired.
    pub fn stop(&self) {
        if self.mixer.strong_count() == 0 {
            return;
        }
        let done = {
            let mut control = lock(&self.control);
            if control.retired {
                return;
            }
            control.stop_requested = true;
            let (ack, done) = oneshot::channel();
            control.stop_ack = Some(ack);
            done
        };
        // Err means the sender was dropped with the clip, which is also done.
        let _ = done.blocking_recv();
    }

    /// Fraction of the source read so far, in [0, 1]. Keeps its last value
    /// after retirement; 0 for an empty source.
    pub fn progress(&self) -> f64 {
        let control = lock(&self.control);
        if control.total_bytes == 0 {
            return 0.0;
        }
        (control.bytes_read as f64 / control.total_bytes as f64).min(1.0)
    }

    /// Bytes consumed from the source so far.
    pub fn bytes_read(&self) -> u64 {
        lock(&self.control).bytes_read
    }

    /// True while the clip is in the mixer's active set.
    pub fn is_playing(&self) -> bool {
        self.mixer
            .upgrade()
            .is_some_and(|mixer| mixer.contains(self.id))
    }

    pub fn set_volume(&self, volume: f64) {
        lock(&self.control).volume = volume;
    }

    pub fn volume(&self) -> f64 {
        lock(&self.control).volume
    }
}
