//! A chart played against the mixer clock, with its music track.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fw_engine::{
    ChartCursor, ClipHandle, CursorError, Judge, LaneInput, Mixer, MixerError, PcmFormat,
    PcmSource, TickReport,
};
use fw_formats::{open_chart, parse_wav, ChartError, WavError};
use fw_ir::Chart;
use log::info;
use thiserror::Error;

use crate::config::GameplayConfig;

/// Error type for starting a song.
#[derive(Debug, Error)]
pub enum SongError {
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error(transparent)]
    Track(#[from] CursorError),
    #[error(transparent)]
    Audio(#[from] MixerError),
    #[error("{}: {source}", path.display())]
    Wav {
        path: PathBuf,
        #[source]
        source: WavError,
    },
    #[error(
        "{}: music is {channels} ch at {sample_rate} Hz but the mixer runs {expected_channels} ch at {expected_rate} Hz",
        path.display()
    )]
    FormatMismatch {
        path: PathBuf,
        channels: u16,
        sample_rate: u32,
        expected_channels: u16,
        expected_rate: u32,
    },
}

/// Open a music file for `format`. WAV files are unwrapped; anything else
/// is taken as headerless PCM already in the mixer format.
pub fn open_music(path: &Path, format: PcmFormat) -> Result<PcmSource, SongError> {
    let open_failed = |source| MixerError::OpenFailed {
        path: path.to_path_buf(),
        source,
    };
    let is_wav = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if !is_wav {
        return Ok(PcmSource::open(path).map_err(open_failed)?);
    }

    let data = fs::read(path).map_err(open_failed)?;
    let wav = parse_wav(&data).map_err(|source| SongError::Wav {
        path: path.to_path_buf(),
        source,
    })?;
    if wav.channels != format.channels || wav.sample_rate != format.sample_rate {
        return Err(SongError::FormatMismatch {
            path: path.to_path_buf(),
            channels: wav.channels,
            sample_rate: wav.sample_rate,
            expected_channels: format.channels,
            expected_rate: format.sample_rate,
        });
    }
    Ok(PcmSource::from_bytes(path.display().to_string(), wav.pcm))
}

/// The music file a chart names, resolved next to the chart.
pub fn chart_music_path(chart_path: &Path, chart: &Chart) -> Option<PathBuf> {
    let stream = chart.metadata.music_stream.as_str();
    if stream.is_empty() {
        return None;
    }
    let dir = chart_path.parent().unwrap_or_else(|| Path::new(""));
    Some(dir.join(stream))
}

/// Plays one track of a chart.
///
/// Song time is the mixer's elapsed clock minus its reading when the player
/// was created, so pausing the mixer pauses the song. Music starts once the
/// first notes have scrolled to the judgment point.
pub struct SongPlayer {
    judge: Judge,
    mixer: Mixer,
    pending_music: Option<PcmSource>,
    music_volume: f64,
    music: Option<ClipHandle>,
    clock_origin: f64,
}

impl SongPlayer {
    /// Load `chart_path` and prepare `track`. Music is opened here so a bad
    /// path fails before anything plays.
    pub fn open(
        mixer: &Mixer,
        chart_path: &Path,
        music_path: Option<&Path>,
        gameplay: &GameplayConfig,
    ) -> Result<Self, SongError> {
        let chart = open_chart(chart_path)?;
        let music = music_path
            .map(|path| open_music(path, mixer.format()))
            .transpose()?;
        info!(
            "loaded '{}' by {} ({} tracks)",
            chart.metadata.title,
            chart.metadata.artist,
            chart.tracks.len()
        );
        Self::new(mixer, Arc::new(chart), music, gameplay)
    }

    pub fn new(
        mixer: &Mixer,
        chart: Arc<Chart>,
        music: Option<PcmSource>,
        gameplay: &GameplayConfig,
    ) -> Result<Self, SongError> {
        let cursor = ChartCursor::new(chart, &gameplay.track)?;
        Ok(Self {
            judge: Judge::new(cursor, gameplay.judge_config()),
            mixer: mixer.clone(),
            pending_music: music,
            music_volume: gameplay.music_volume,
            music: None,
            clock_origin: mixer.elapsed_secs(),
        })
    }

    pub fn judge(&self) -> &Judge {
        &self.judge
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn score(&self) -> f64 {
        self.judge.score()
    }

    /// Seconds since the song started, by the mixer clock.
    pub fn song_time(&self) -> f64 {
        (self.mixer.elapsed_secs() - self.clock_origin).max(0.0)
    }

    /// Seconds before the music starts.
    pub fn lead_in_secs(&self) -> f64 {
        self.judge.config().lead_in_secs()
    }

    /// The playing music clip, once started.
    pub fn music(&self) -> Option<&ClipHandle> {
        self.music.as_ref()
    }

    /// Fraction of the music played, 0.0 before it starts.
    pub fn music_progress(&self) -> f64 {
        self.music.as_ref().map_or(0.0, ClipHandle::progress)
    }

    /// Judge `input` at the current song time.
    pub fn tick(&mut self, input: &LaneInput) -> TickReport {
        let now = self.song_time();
        if now >= self.lead_in_secs() {
            if let Some(source) = self.pending_music.take() {
                info!("music '{}' started at {:.3}s", source.label(), now);
                self.music = Some(self.mixer.play_source(source, self.music_volume));
            }
        }
        self.judge.update(now, input)
    }

    /// Tick with the input a perfect player would give.
    pub fn autoplay_tick(&mut self) -> TickReport {
        let input = self.judge.autoplay_input();
        self.tick(&input)
    }

    /// Chart played out and music, if any, finished.
    pub fn is_finished(&self) -> bool {
        self.judge.is_finished()
            && self.pending_music.is_none()
            && !self.music.as_ref().is_some_and(ClipHandle::is_playing)
    }

    /// Stop the music. Blocks until the mixer acknowledges, so something
    /// must be rendering.
    pub fn stop(&mut self) {
        self.pending_music = None;
        if let Some(music) = self.music.take() {
            music.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fw_formats::{parse_chart, pcm_to_wav};
    use fw_engine::{samples_to_bytes, Judgment};

    const CHART: &str = "\
[Song]
{
  Name = \"Scale\"
  Resolution = 192
  MusicStream = \"scale.raw\"
}
[SyncTrack]
{
  0 = B 120000
}
[ExpertSingle]
{
  0 = N 0 0
  192 = N 1 0
  384 = N 2 0
}
";

    fn chart() -> Arc<Chart> {
        Arc::new(parse_chart(CHART).unwrap())
    }

    fn mixer() -> Mixer {
        Mixer::new(PcmFormat::new(1, 8000, 80), 1.0)
    }

    #[test]
    fn unknown_track_is_rejected() {
        let gameplay = GameplayConfig {
            track: "HardDoubleBass".into(),
            ..Default::default()
        };
        let err = SongPlayer::new(&mixer(), chart(), None, &gameplay).err().unwrap();
        assert!(matches!(err, SongError::Track(CursorError::TrackNotFound(_))));
    }

    #[test]
    fn missing_music_fails_before_playing() {
        let mixer = mixer();
        let err = open_music(Path::new("/nonexistent/song.raw"), mixer.format()).unwrap_err();
        assert!(matches!(err, SongError::Audio(MixerError::OpenFailed { .. })));
        assert_eq!(mixer.active_clips(), 0);
    }

    #[test]
    fn music_waits_for_lead_in() {
        let mixer = mixer();
        let music = PcmSource::from_bytes("scale", samples_to_bytes(&[500; 800]));
        let mut player =
            SongPlayer::new(&mixer, chart(), Some(music), &GameplayConfig::default()).unwrap();
        let mut frame = vec![0u8; mixer.buffer_size()];

        while player.song_time() < 2.0 {
            player.autoplay_tick();
            mixer.render_period(&mut frame);
        }
        assert!(player.music().is_none());

        while player.song_time() < 2.3 {
            player.autoplay_tick();
            mixer.render_period(&mut frame);
        }
        assert!(player.music().is_some());
        assert!(player.music_progress() > 0.0);
    }

    #[test]
    fn autoplay_hits_every_note() {
        let mixer = mixer();
        let mut player =
            SongPlayer::new(&mixer, chart(), None, &GameplayConfig::default()).unwrap();
        let mut frame = vec![0u8; mixer.buffer_size()];
        let mut hits = 0;

        while !player.is_finished() && player.song_time() < 10.0 {
            let report = player.autoplay_tick();
            for judgment in &report.judgments {
                assert!(!matches!(judgment, Judgment::Miss { .. }), "{:?}", judgment);
                if matches!(judgment, Judgment::Hit { .. }) {
                    hits += 1;
                }
            }
            mixer.render_period(&mut frame);
        }
        assert!(player.is_finished());
        assert_eq!(hits, 3);
        assert!(player.score() > 0.0);
    }

    #[test]
    fn wav_music_must_match_the_mixer() {
        let dir = std::env::temp_dir().join(format!("fw-song-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let stereo = dir.join("stereo.wav");
        fs::write(&stereo, pcm_to_wav(&samples_to_bytes(&[1, 2, 3, 4]), 2, 8000)).unwrap();
        let mono = dir.join("mono.wav");
        fs::write(&mono, pcm_to_wav(&samples_to_bytes(&[1, 2, 3, 4]), 1, 8000)).unwrap();

        let format = mixer().format();
        assert!(matches!(
            open_music(&stereo, format),
            Err(SongError::FormatMismatch { channels: 2, .. })
        ));
        assert_eq!(open_music(&mono, format).unwrap().total_bytes(), 8);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn music_path_resolves_next_to_chart() {
        let chart = chart();
        assert_eq!(
            chart_music_path(Path::new("songs/scale/notes.chart"), &chart),
            Some(PathBuf::from("songs/scale/scale.raw"))
        );
    }
}
