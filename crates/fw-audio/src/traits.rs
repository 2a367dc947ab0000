//! Output sink trait and error types.

use thiserror::Error;

/// Error type for audio output.
#[derive(Debug, Error)]
pub enum AudioError {
    /// No output device available
    #[error("no audio output device available")]
    NoDevice,
    /// The device rejected the stream configuration
    #[error("failed to build output stream: {0}")]
    StreamBuild(String),
    /// The stream could not be started or paused
    #[error("playback error: {0}")]
    StreamPlay(String),
    /// Writing to a byte stream failed
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for the mixer's output periods.
///
/// The output loop hands over exactly one period of interleaved 16-bit
/// little-endian PCM per call. An error ends the loop.
pub trait PcmSink {
    /// Write one period.
    fn write_period(&mut self, pcm: &[u8]) -> Result<(), AudioError>;

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    /// Stop playback.
    fn stop(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}

impl<S: PcmSink + ?Sized> PcmSink for Box<S> {
    fn write_period(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        (**self).write_period(pcm)
    }

    fn start(&mut self) -> Result<(), AudioError> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        (**self).stop()
    }
}
