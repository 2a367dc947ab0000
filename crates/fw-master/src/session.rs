//! Sessions: one mixer per client plus the thread that drives it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use fw_audio::{AudioError, PcmSink};
use fw_engine::{Mixer, PcmFormat};
use log::{debug, info, warn};

use crate::config::{AudioConfig, ConfigError};

/// A mixer and, once started, its real-time output thread.
pub struct Session {
    mixer: Mixer,
    output: Mutex<Option<OutputThread>>,
}

struct OutputThread {
    stop_signal: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(format: PcmFormat, mix_amp: f64) -> Self {
        Self {
            mixer: Mixer::new(format, mix_amp),
            output: Mutex::new(None),
        }
    }

    pub fn from_config(config: &AudioConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.pcm_format()?, config.mix_amp))
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    // --- Output thread ---

    /// Spawn the output thread. `open_sink` runs on that thread, so sinks
    /// that must stay on one thread (device streams) can be used. Replaces
    /// any running output.
    pub fn start_output<S, F>(&self, open_sink: F)
    where
        S: PcmSink,
        F: FnOnce(PcmFormat) -> Result<S, AudioError> + Send + 'static,
    {
        self.stop_output();

        let mixer = self.mixer.clone();
        let stop_signal = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));

        let stop = stop_signal.clone();
        let alive = running.clone();
        let thread = thread::spawn(move || {
            match open_sink(mixer.format()) {
                Ok(sink) => output_loop(&mixer, sink, &stop),
                Err(e) => warn!("output sink could not be opened: {}", e),
            }
            alive.store(false, Ordering::Relaxed);
        });

        info!("output started");
        *self.output.lock().unwrap_or_else(PoisonError::into_inner) = Some(OutputThread {
            stop_signal,
            running,
            thread: Some(thread),
        });
    }

    /// Signal the output thread and wait for it to exit.
    pub fn stop_output(&self) {
        let output = self
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut out) = output {
            out.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = out.thread.take() {
                let _ = handle.join();
            }
            info!("output stopped");
        }
    }

    /// True while the output thread is rendering.
    pub fn is_output_running(&self) -> bool {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|out| out.running.load(Ordering::Relaxed))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_output();
    }
}

/// Render one period per tick of a fixed clock and hand it to the sink.
///
/// Deadlines are absolute so sleep jitter does not accumulate. A sink
/// error ends the loop.
fn output_loop<S: PcmSink>(mixer: &Mixer, mut sink: S, stop_signal: &AtomicBool) {
    let period = mixer.format().period();
    let mut frame = vec![0u8; mixer.buffer_size()];
    let mut deadline = Instant::now();

    if let Err(e) = sink.start() {
        info!("output sink failed to start: {}", e);
        return;
    }

    while !stop_signal.load(Ordering::Relaxed) {
        mixer.render_period(&mut frame);
        if let Err(e) = sink.write_period(&frame) {
            info!("output sink closed: {}", e);
            break;
        }

        deadline += period;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else if now - deadline > period * 8 {
            debug!("output loop fell behind by {:?}, resyncing", now - deadline);
            deadline = now;
        }
    }

    let _ = sink.stop();
}

/// Sessions keyed by client identity. Nothing is shared between them.
pub struct SessionRegistry {
    format: PcmFormat,
    mix_amp: f64,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(format: PcmFormat, mix_amp: f64) -> Self {
        Self {
            format,
            mix_amp,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AudioConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.pcm_format()?, config.mix_amp))
    }

    /// The client's session, created with a fresh mixer on first use.
    pub fn get_or_create(&self, client: &str) -> Arc<Session> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let session = sessions.entry(client.to_string()).or_insert_with(|| {
            info!("session created for {}", client);
            Arc::new(Session::new(self.format, self.mix_amp))
        });
        Arc::clone(session)
    }

    pub fn get(&self, client: &str) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(client)
            .cloned()
    }

    /// Forget a client. Its output stops once the last reference is gone.
    pub fn remove(&self, client: &str) -> bool {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(client);
        if removed.is_some() {
            info!("session removed for {}", client);
        }
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fw_engine::{samples_to_bytes, PcmSource};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Forwards periods to the test thread; fails after `limit` periods.
    struct ChannelSink {
        tx: mpsc::Sender<Vec<u8>>,
        limit: usize,
    }

    impl PcmSink for ChannelSink {
        fn write_period(&mut self, pcm: &[u8]) -> Result<(), AudioError> {
            if self.limit == 0 {
                return Err(AudioError::Io(std::io::ErrorKind::BrokenPipe.into()));
            }
            self.limit -= 1;
            let _ = self.tx.send(pcm.to_vec());
            Ok(())
        }
    }

    fn fast_format() -> PcmFormat {
        PcmFormat::new(2, 8000, 16)
    }

    #[test]
    fn output_thread_emits_fixed_size_periods() {
        let session = Session::new(fast_format(), 1.0);
        session.mixer().play_source(
            PcmSource::from_bytes("tone", samples_to_bytes(&vec![1000i16; 2 * 16 * 4])),
            1.0,
        );
        let (tx, rx) = mpsc::channel();
        session.start_output(move |_| Ok(ChannelSink { tx, limit: 6 }));

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first.len(), fast_format().buffer_size());
        assert_eq!(&first[..2], &1000i16.to_le_bytes());
        session.stop_output();
        assert!(!session.is_output_running());
    }

    #[test]
    fn sink_error_ends_the_loop() {
        let session = Session::new(fast_format(), 1.0);
        let (tx, rx) = mpsc::channel();
        session.start_output(move |_| Ok(ChannelSink { tx, limit: 2 }));

        let received: Vec<_> = rx.iter().collect();
        assert_eq!(received.len(), 2);
        // channel closes when the thread drops the sink
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.is_output_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!session.is_output_running());
    }

    #[test]
    fn failed_sink_open_leaves_mixer_idle() {
        let session = Session::new(fast_format(), 1.0);
        session.start_output(|_| Err::<ChannelSink, _>(AudioError::NoDevice));
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.is_output_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!session.is_output_running());
        assert_eq!(session.mixer().elapsed_secs(), 0.0);
    }

    #[test]
    fn registry_keys_sessions_by_client() {
        let registry = SessionRegistry::new(fast_format(), 1.0);
        let a = registry.get_or_create("alice");
        let again = registry.get_or_create("alice");
        let b = registry.get_or_create("bob");
        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);

        a.mixer().pause();
        assert!(!b.mixer().is_paused());

        assert!(registry.remove("alice"));
        assert!(!registry.remove("alice"));
        assert!(registry.get("alice").is_none());
        assert!(registry.get("bob").is_some());
    }
}
