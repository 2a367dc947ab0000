//! CPAL-based live output.
//!
//! The output loop pushes samples into a ring buffer that the device
//! callback drains. If the ring is full the newest samples are dropped; if
//! it runs dry the device plays silence.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use fw_engine::PcmFormat;
use log::{debug, error};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::traits::{AudioError, PcmSink};

/// CPAL-based audio output.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<i16>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Create an output on the default device using the mixer's geometry.
    pub fn new(format: PcmFormat) -> Result<(Self, HeapCons<i16>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        // Fixed rate and channel count: the mixer never resamples.
        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // About 100ms of samples
        let capacity = (format.sample_rate as usize / 10) * format.channels as usize;
        let rb = HeapRb::<i16>::new(capacity.max(format.buffer_size()));
        let (producer, consumer) = rb.split();

        let output = Self {
            device,
            config,
            stream: None,
            producer,
            running: Arc::new(AtomicBool::new(false)),
        };

        Ok((output, consumer))
    }

    /// Create, build and start an output in one step.
    pub fn open(format: PcmFormat) -> Result<Self, AudioError> {
        let (mut output, consumer) = Self::new(format)?;
        output.build_stream(consumer)?;
        output.start()?;
        Ok(output)
    }

    /// Build and start the device stream.
    pub fn build_stream(&mut self, mut consumer: HeapCons<i16>) -> Result<(), AudioError> {
        let running = self.running.clone();

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    for sample in data.iter_mut() {
                        *sample = consumer.try_pop().map_or(0.0, |s| s as f32 / 32768.0);
                    }
                },
                |err| error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;
        debug!(
            "cpal stream: {} channels at {} Hz",
            self.config.channels, self.config.sample_rate.0
        );
        self.stream = Some(stream);
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }
}

impl PcmSink for CpalOutput {
    fn write_period(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
        for bytes in pcm.chunks_exact(2) {
            // Non-blocking push; drop samples if the device is behind
            let _ = self.producer.try_push(i16::from_le_bytes([bytes[0], bytes[1]]));
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream
                .play()
                .map_err(|e| AudioError::StreamPlay(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream
                .pause()
                .map_err(|e| AudioError::StreamPlay(e.to_string()))?;
        }
        Ok(())
    }
}
