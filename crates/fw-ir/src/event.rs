//! Events yielded by walking a chart.

use crate::note::Note;
use crate::timing::{TempoChange, TimeSignatureChange};

/// One kind of event due at a tick.
///
/// Borrowed from the chart so that walking it never allocates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChartEvent<'a> {
    /// Every note of the walked track that starts on this tick
    Notes(&'a [Note]),
    /// A tempo change
    Tempo(&'a TempoChange),
    /// A time-signature change
    TimeSignature(&'a TimeSignatureChange),
}

impl ChartEvent<'_> {
    /// Notes carried by this event, empty for sync events.
    pub fn notes(&self) -> &[Note] {
        match self {
            ChartEvent::Notes(notes) => notes,
            _ => &[],
        }
    }
}
