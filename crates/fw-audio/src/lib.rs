//! PCM output sinks for the fretwork rhythm engine.

mod cpal_backend;
mod stream_sink;
mod traits;

pub use cpal_backend::CpalOutput;
pub use stream_sink::StreamSink;
pub use traits::{AudioError, PcmSink};
