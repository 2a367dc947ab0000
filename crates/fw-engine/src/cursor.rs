//! Tick-based walk over one track of a chart.
//!
//! The cursor owns a position in ticks and three forward-only indices into
//! the chart's tempo, time-signature and note lists. Tempo and
//! time-signature rows at tick 0 describe the starting state and are
//! applied when the cursor is created; everything later, and notes at any
//! tick, is delivered through [`ChartCursor::next_event`].

use std::sync::Arc;

use fw_ir::{
    ticks_per_second, Chart, ChartEvent, Note, TempoChange, Tick, TimeSignatureChange, Track,
    DEFAULT_BPM, DEFAULT_DENOMINATOR,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("track [{0}] not found")]
    TrackNotFound(String),
}

/// Events due together at the next tick, and how far away that tick is.
///
/// Plain borrowed references, so a batch can be inspected and then dropped
/// before the cursor advances.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingEvents<'a> {
    tempo: Option<&'a TempoChange>,
    signature: Option<&'a TimeSignatureChange>,
    notes: &'a [Note],
    distance: Tick,
}

impl<'a> PendingEvents<'a> {
    fn exhausted() -> Self {
        Self {
            tempo: None,
            signature: None,
            notes: &[],
            distance: 0,
        }
    }

    /// True once every list has been consumed.
    pub fn is_empty(&self) -> bool {
        self.tempo.is_none() && self.signature.is_none() && self.notes.is_empty()
    }

    /// Ticks from the cursor to these events; 0 when exhausted.
    pub fn distance(&self) -> Tick {
        self.distance
    }

    pub fn tempo(&self) -> Option<&'a TempoChange> {
        self.tempo
    }

    pub fn signature(&self) -> Option<&'a TimeSignatureChange> {
        self.signature
    }

    /// The note batch, empty if this tick carries only sync events.
    pub fn notes(&self) -> &'a [Note] {
        self.notes
    }

    /// The batch in dispatch order: tempo, time signature, notes.
    pub fn events(self) -> impl Iterator<Item = ChartEvent<'a>> {
        let notes = (!self.notes.is_empty()).then_some(ChartEvent::Notes(self.notes));
        self.tempo
            .map(ChartEvent::Tempo)
            .into_iter()
            .chain(self.signature.map(ChartEvent::TimeSignature))
            .chain(notes)
    }
}

/// Scheduler state over one track of a shared chart.
#[derive(Clone, Debug)]
pub struct ChartCursor {
    chart: Arc<Chart>,
    track: usize,
    tick: Tick,
    tempo_index: usize,
    signature_index: usize,
    note_index: usize,
}

impl ChartCursor {
    /// Start a walk over the named track.
    pub fn new(chart: Arc<Chart>, track_name: &str) -> Result<Self, CursorError> {
        let track = chart
            .track_index(track_name)
            .ok_or_else(|| CursorError::TrackNotFound(track_name.to_string()))?;
        let tempo_index = chart.tempo_changes.iter().take_while(|t| t.tick == 0).count();
        let signature_index = chart.time_signatures.iter().take_while(|t| t.tick == 0).count();
        Ok(Self {
            chart,
            track,
            tick: 0,
            tempo_index,
            signature_index,
            note_index: 0,
        })
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn track(&self) -> &Track {
        &self.chart.tracks[self.track]
    }

    /// Current position.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Next unconsumed (tempo, time-signature, note) indices.
    pub fn indices(&self) -> (usize, usize, usize) {
        (self.tempo_index, self.signature_index, self.note_index)
    }

    /// Everything due at the nearest upcoming tick.
    ///
    /// Simultaneous notes and sync changes come back in one batch. If two
    /// rows of the same sync kind share a tick, the later one is reported,
    /// since that is the one in effect.
    pub fn next_event(&self) -> PendingEvents<'_> {
        let chart = &*self.chart;
        let notes = &self.track().notes;
        let tempos = &chart.tempo_changes;
        let signatures = &chart.time_signatures;

        let until = |tick: Tick| tick.saturating_sub(self.tick);
        let note_distance = notes.get(self.note_index).map(|n| until(n.tick));
        let tempo_distance = tempos.get(self.tempo_index).map(|t| until(t.tick));
        let signature_distance = signatures.get(self.signature_index).map(|t| until(t.tick));

        let Some(distance) = [note_distance, tempo_distance, signature_distance]
            .into_iter()
            .flatten()
            .min()
        else {
            return PendingEvents::exhausted();
        };
        let due = self.tick + distance;

        let mut pending = PendingEvents {
            distance,
            ..PendingEvents::exhausted()
        };
        if tempo_distance == Some(distance) {
            let last = last_at(&tempos[self.tempo_index..], due, |t| t.tick);
            pending.tempo = Some(&tempos[self.tempo_index + last]);
        }
        if signature_distance == Some(distance) {
            let last = last_at(&signatures[self.signature_index..], due, |t| t.tick);
            pending.signature = Some(&signatures[self.signature_index + last]);
        }
        if note_distance == Some(distance) {
            let batch = &notes[self.note_index..];
            let len = batch.iter().take_while(|n| n.tick == due).count();
            pending.notes = &batch[..len];
        }
        pending
    }

    /// Move forward `ticks` and consume every entry at or before the new
    /// position.
    pub fn advance_tick(&mut self, ticks: Tick) {
        self.tick = self.tick.saturating_add(ticks);
        let tick = self.tick;
        let chart = &*self.chart;

        advance_past(&mut self.tempo_index, &chart.tempo_changes, tick, |t| t.tick);
        advance_past(&mut self.signature_index, &chart.time_signatures, tick, |t| t.tick);
        advance_past(&mut self.note_index, &chart.tracks[self.track].notes, tick, |n| n.tick);
    }

    /// Tempo of the last consumed change, or the first if none consumed.
    pub fn current_bpm(&self) -> f64 {
        let tempos = &self.chart.tempo_changes;
        tempos
            .get(self.tempo_index.saturating_sub(1))
            .map_or(DEFAULT_BPM, |t| t.bpm)
    }

    /// Denominator of the last consumed signature, or the first if none consumed.
    pub fn current_denominator(&self) -> u32 {
        let signatures = &self.chart.time_signatures;
        signatures
            .get(self.signature_index.saturating_sub(1))
            .map_or(DEFAULT_DENOMINATOR, |t| t.denominator)
    }

    /// `resolution × (bpm / 60) × (4 / denominator)` at the cursor.
    pub fn current_ticks_per_second(&self) -> f64 {
        ticks_per_second(
            self.chart.resolution(),
            self.current_bpm(),
            self.current_denominator(),
        )
    }

    /// True once no tempo, signature or note remains.
    pub fn is_exhausted(&self) -> bool {
        self.tempo_index >= self.chart.tempo_changes.len()
            && self.signature_index >= self.chart.time_signatures.len()
            && self.note_index >= self.track().notes.len()
    }
}

/// Index of the last entry at `tick` in a slice that starts at `tick`.
fn last_at<T>(items: &[T], tick: Tick, tick_of: impl Fn(&T) -> Tick) -> usize {
    items
        .iter()
        .take_while(|item| tick_of(item) == tick)
        .count()
        .saturating_sub(1)
}

fn advance_past<T>(index: &mut usize, items: &[T], tick: Tick, tick_of: impl Fn(&T) -> Tick) {
    while *index < items.len() && tick_of(&items[*index]) <= tick {
        *index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fw_ir::{SongMetadata, TempoChange, TimeSignatureChange};

    fn chart(tempos: &[(Tick, f64)], signatures: &[(Tick, u32, u32)], notes: &[Note]) -> Arc<Chart> {
        let mut chart = Chart::new(SongMetadata::default());
        chart.tempo_changes = tempos.iter().map(|&(t, b)| TempoChange::new(t, b)).collect();
        chart.time_signatures = signatures
            .iter()
            .map(|&(t, n, d)| TimeSignatureChange::new(t, n, d))
            .collect();
        chart.tracks.push(Track::new("ExpertSingle", notes.to_vec()));
        Arc::new(chart)
    }

    #[test]
    fn unknown_track() {
        let err = ChartCursor::new(chart(&[], &[], &[]), "EasyBass").unwrap_err();
        assert_eq!(err, CursorError::TrackNotFound("EasyBass".into()));
    }

    #[test]
    fn single_note_walk() {
        let note = Note::new(192, 0, 0);
        let mut cursor =
            ChartCursor::new(chart(&[(0, 120.0)], &[], &[note]), "ExpertSingle").unwrap();

        let pending = cursor.next_event();
        assert_eq!(pending.distance(), 192);
        assert_eq!(pending.events().collect::<Vec<_>>(), vec![ChartEvent::Notes(&[note])]);
        assert_eq!(pending.notes(), &[note]);

        cursor.advance_tick(192);
        let pending = cursor.next_event();
        assert!(pending.is_empty());
        assert_eq!(pending.distance(), 0);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn ticks_per_second_at_120_common_time() {
        let cursor =
            ChartCursor::new(chart(&[(0, 120.0)], &[(0, 4, 4)], &[]), "ExpertSingle").unwrap();
        assert_eq!(cursor.current_ticks_per_second(), 384.0);
    }

    #[test]
    fn rate_follows_consumed_changes() {
        let mut cursor = ChartCursor::new(
            chart(&[(0, 120.0), (384, 60.0)], &[(0, 4, 4), (768, 6, 8)], &[]),
            "ExpertSingle",
        )
        .unwrap();
        assert_eq!(cursor.current_ticks_per_second(), 384.0);
        cursor.advance_tick(383);
        assert_eq!(cursor.current_ticks_per_second(), 384.0);
        cursor.advance_tick(1);
        assert_eq!(cursor.current_ticks_per_second(), 192.0);
        cursor.advance_tick(384);
        assert_eq!(cursor.current_ticks_per_second(), 96.0);
    }

    #[test]
    fn first_entries_apply_before_any_is_consumed() {
        let cursor = ChartCursor::new(chart(&[(96, 90.0)], &[], &[]), "ExpertSingle").unwrap();
        assert_eq!(cursor.current_bpm(), 90.0);
        assert_eq!(cursor.current_denominator(), 4);
    }

    #[test]
    fn defaults_without_sync_rows() {
        let cursor = ChartCursor::new(chart(&[], &[], &[]), "ExpertSingle").unwrap();
        assert_eq!(cursor.current_ticks_per_second(), 384.0);
        assert!(cursor.next_event().is_empty());
    }

    #[test]
    fn simultaneous_events_are_batched() {
        let notes = [Note::new(384, 0, 0), Note::new(384, 2, 0), Note::new(400, 1, 0)];
        let mut cursor = ChartCursor::new(
            chart(&[(0, 120.0), (384, 150.0)], &[(0, 4, 4), (384, 3, 4)], &notes),
            "ExpertSingle",
        )
        .unwrap();

        let pending = cursor.next_event();
        assert_eq!(pending.distance(), 384);
        assert_eq!(
            pending.events().collect::<Vec<_>>(),
            vec![
                ChartEvent::Tempo(&TempoChange::new(384, 150.0)),
                ChartEvent::TimeSignature(&TimeSignatureChange::new(384, 3, 4)),
                ChartEvent::Notes(&notes[..2]),
            ]
        );
        cursor.advance_tick(pending.distance());
        assert_eq!(cursor.current_bpm(), 150.0);

        let pending = cursor.next_event();
        assert_eq!(pending.distance(), 16);
        assert_eq!(pending.notes(), &notes[2..]);
    }

    #[test]
    fn notes_at_tick_zero_are_delivered() {
        let notes = [Note::new(0, 3, 0)];
        let mut cursor =
            ChartCursor::new(chart(&[(0, 120.0)], &[(0, 4, 4)], &notes), "ExpertSingle").unwrap();
        let pending = cursor.next_event();
        assert_eq!(pending.distance(), 0);
        assert_eq!(pending.events().collect::<Vec<_>>(), vec![ChartEvent::Notes(&notes)]);
        cursor.advance_tick(0);
        assert!(cursor.next_event().is_empty());
    }

    #[test]
    fn walk_visits_everything_once_in_order() {
        let notes: Vec<Note> = (0..40u64)
            .map(|i| Note::new(i * 48 + (i % 3), (i % 5) as u8, 0))
            .collect();
        let tempos = [(0, 120.0), (200, 140.0), (961, 100.0)];
        let signatures = [(0, 4, 4), (500, 7, 8), (1500, 4, 4)];
        let chart = chart(&tempos, &signatures, &notes);
        let mut cursor = ChartCursor::new(Arc::clone(&chart), "ExpertSingle").unwrap();

        let mut seen_notes = Vec::new();
        let mut seen_tempos = Vec::new();
        let mut seen_signatures = Vec::new();
        let mut last_tick = 0;
        let mut last_indices = cursor.indices();
        loop {
            let pending = cursor.next_event();
            if pending.is_empty() {
                break;
            }
            let due = cursor.tick() + pending.distance();
            assert!(due >= last_tick);
            last_tick = due;
            for event in pending.events() {
                match event {
                    ChartEvent::Notes(batch) => {
                        assert!(batch.iter().all(|n| n.tick == due));
                        seen_notes.extend_from_slice(batch);
                    }
                    ChartEvent::Tempo(t) => seen_tempos.push(*t),
                    ChartEvent::TimeSignature(t) => seen_signatures.push(*t),
                }
            }
            let distance = pending.distance();
            cursor.advance_tick(distance);

            let indices = cursor.indices();
            assert!(indices.0 >= last_indices.0 && indices.0 <= chart.tempo_changes.len());
            assert!(indices.1 >= last_indices.1 && indices.1 <= chart.time_signatures.len());
            assert!(indices.2 >= last_indices.2 && indices.2 <= notes.len());
            last_indices = indices;
        }

        assert_eq!(seen_notes, notes);
        // tick-0 rows are the starting state
        assert_eq!(seen_tempos, chart.tempo_changes[1..]);
        assert_eq!(seen_signatures, chart.time_signatures[1..]);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn large_advance_skips_without_overrun() {
        let notes = [Note::new(10, 0, 0), Note::new(20, 1, 0)];
        let mut cursor = ChartCursor::new(chart(&[(0, 120.0)], &[], &notes), "ExpertSingle").unwrap();
        cursor.advance_tick(1_000_000);
        assert_eq!(cursor.indices(), (1, 0, 2));
        assert!(cursor.next_event().is_empty());
        cursor.advance_tick(Tick::MAX);
        assert_eq!(cursor.tick(), Tick::MAX);
    }
}
