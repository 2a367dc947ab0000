//! Raw PCM byte-stream sink.

use std::io::Write;

use crate::traits::{AudioError, PcmSink};

/// Writes every period straight to a byte stream (stdout, a socket, a
/// file), producing continuous headerless PCM.
#[derive(Debug)]
pub struct StreamSink<W: Write> {
    writer: W,
    bytes_written: u64,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PcmSink for StreamSink<W> {
    fn write_period(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        self.writer.write_all(pcm)?;
        self.bytes_written += pcm.len() as u64;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.writer.flush()?;
        Ok(())
    }
}
