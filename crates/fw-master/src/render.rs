//! Offline rendering: autoplay a song against the mixer without a device.

use fw_formats::pcm_to_wav;
use log::{debug, info};

use crate::song::SongPlayer;

/// Result of an offline render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    /// Interleaved LE i16 in the mixer's format
    pub pcm: Vec<u8>,
    pub score: f64,
    /// Output periods rendered
    pub periods: usize,
    /// False when `max_secs` cut the render short
    pub finished: bool,
}

/// Autoplay `player` one output period at a time until it finishes or
/// `max_secs` of audio have been produced.
pub fn render_song(player: &mut SongPlayer, max_secs: f64) -> RenderOutcome {
    let mixer = player.mixer().clone();
    let format = mixer.format();
    let max_periods = (max_secs.max(0.0) / format.period_secs()).ceil() as usize;
    let mut frame = vec![0u8; mixer.buffer_size()];
    let mut pcm = Vec::new();
    let mut periods = 0;

    while !player.is_finished() && periods < max_periods {
        let report = player.autoplay_tick();
        for judgment in &report.judgments {
            debug!("{:.3}s {:?}", player.song_time(), judgment);
        }
        mixer.render_period(&mut frame);
        pcm.extend_from_slice(&frame);
        periods += 1;
    }

    let finished = player.is_finished();
    info!(
        "rendered {} periods ({:.2}s), score {:.1}{}",
        periods,
        periods as f64 * format.period_secs(),
        player.score(),
        if finished { "" } else { " (cut short)" }
    );
    RenderOutcome {
        pcm,
        score: player.score(),
        periods,
        finished,
    }
}

/// [`render_song`] wrapped as a WAV file.
pub fn render_song_wav(player: &mut SongPlayer, max_secs: f64) -> (Vec<u8>, RenderOutcome) {
    let outcome = render_song(player, max_secs);
    let format = player.mixer().format();
    let wav = pcm_to_wav(&outcome.pcm, format.channels, format.sample_rate);
    (wav, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameplayConfig;
    use fw_engine::{samples_to_bytes, Mixer, PcmFormat, PcmSource};
    use fw_formats::{parse_chart, parse_wav};
    use std::sync::Arc;

    const CHART: &str = "[Song]\n{\n  Resolution = 192\n}\n[SyncTrack]\n{\n  0 = B 120000\n}\n[ExpertSingle]\n{\n  0 = N 0 0\n  192 = N 4 96\n}\n";

    fn player(music: Option<PcmSource>) -> SongPlayer {
        let mixer = Mixer::new(PcmFormat::new(1, 8000, 80), 1.0);
        let chart = Arc::new(parse_chart(CHART).unwrap());
        SongPlayer::new(&mixer, chart, music, &GameplayConfig::default()).unwrap()
    }

    #[test]
    fn render_is_silent_until_music_starts() {
        let music = PcmSource::from_bytes("tone", samples_to_bytes(&[1000; 4000]));
        let mut player = player(Some(music));
        let outcome = render_song(&mut player, 30.0);

        assert!(outcome.finished);
        assert_eq!(outcome.pcm.len(), outcome.periods * 160);
        // 2.2s of lead-in at 8 kHz mono
        assert!(outcome.pcm[..2 * 17_000].iter().all(|&b| b == 0));
        let during = &outcome.pcm[2 * 18_400..2 * 20_800];
        assert!(during.chunks(2).all(|s| s == 1000i16.to_le_bytes()));
        assert!(outcome.score > 0.0);
    }

    #[test]
    fn max_secs_cuts_the_render_short() {
        let mut player = player(None);
        let outcome = render_song(&mut player, 1.0);
        assert!(!outcome.finished);
        assert_eq!(outcome.periods, 100);
    }

    #[test]
    fn wav_render_carries_the_mixer_format() {
        let mut player = player(None);
        let (wav, outcome) = render_song_wav(&mut player, 0.5);
        let parsed = parse_wav(&wav).unwrap();
        assert_eq!(parsed.channels, 1);
        assert_eq!(parsed.sample_rate, 8000);
        assert_eq!(parsed.pcm, outcome.pcm);
    }
}
