//! Tempo map entries and tick/second conversion.
//!
//! Chart time is counted in ticks. How long a tick lasts depends on the
//! resolution (ticks per quarter note), the active tempo and the active
//! time-signature denominator.

/// Chart time unit.
pub type Tick = u64;

/// Tempo assumed when a chart has no tempo rows.
pub const DEFAULT_BPM: f64 = 120.0;

/// Ticks per quarter note when a chart does not declare `Resolution`.
pub const DEFAULT_RESOLUTION: u32 = 192;

/// Denominator used when a `TS` row omits its exponent.
pub const DEFAULT_DENOMINATOR: u32 = 4;

/// A tempo change in the sync track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoChange {
    /// Tick at which the tempo takes effect
    pub tick: Tick,
    /// Beats per minute (the file stores this times 1000)
    pub bpm: f64,
}

impl TempoChange {
    pub fn new(tick: Tick, bpm: f64) -> Self {
        Self { tick, bpm }
    }
}

/// A time-signature change in the sync track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignatureChange {
    /// Tick at which the signature takes effect
    pub tick: Tick,
    /// Beats per bar
    pub numerator: u32,
    /// Note value of one beat (always a power of two)
    pub denominator: u32,
}

impl TimeSignatureChange {
    pub fn new(tick: Tick, numerator: u32, denominator: u32) -> Self {
        Self {
            tick,
            numerator,
            denominator,
        }
    }

    /// Build from the on-disk form, where the denominator is stored as a
    /// base-2 exponent. Returns `None` if the exponent overflows.
    pub fn from_exponent(tick: Tick, numerator: u32, exponent: u32) -> Option<Self> {
        let denominator = 1u32.checked_shl(exponent)?;
        Some(Self::new(tick, numerator, denominator))
    }
}

/// Ticks elapsing per second of real time.
///
/// `resolution × (bpm / 60) × (4 / denominator)`: the resolution counts
/// quarter notes, so a beat of any other length scales it.
pub fn ticks_per_second(resolution: u32, bpm: f64, denominator: u32) -> f64 {
    resolution as f64 * (bpm / 60.0) * (4.0 / denominator as f64)
}

/// Seconds covered by `ticks` at a constant rate.
pub fn ticks_to_seconds(ticks: Tick, ticks_per_second: f64) -> f64 {
    if ticks_per_second <= 0.0 {
        return 0.0;
    }
    ticks as f64 / ticks_per_second
}

/// Ticks covered by `seconds` at a constant rate, rounded down.
pub fn seconds_to_ticks(seconds: f64, ticks_per_second: f64) -> Tick {
    if seconds <= 0.0 || ticks_per_second <= 0.0 {
        return 0;
    }
    (seconds * ticks_per_second) as Tick
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_time_at_120_bpm() {
        assert_eq!(ticks_per_second(192, 120.0, 4), 384.0);
    }

    #[test]
    fn eighth_note_beat_halves_the_rate() {
        assert_eq!(ticks_per_second(192, 120.0, 8), 192.0);
    }

    #[test]
    fn exponent_decodes_to_power_of_two() {
        let ts = TimeSignatureChange::from_exponent(0, 6, 3).unwrap();
        assert_eq!(ts.denominator, 8);
        assert_eq!(TimeSignatureChange::from_exponent(0, 4, 2).unwrap().denominator, 4);
        assert!(TimeSignatureChange::from_exponent(0, 4, 40).is_none());
    }

    #[test]
    fn tick_second_conversion() {
        assert_eq!(ticks_to_seconds(192, 384.0), 0.5);
        assert_eq!(seconds_to_ticks(0.5, 384.0), 192);
        assert_eq!(ticks_to_seconds(10, 0.0), 0.0);
        assert_eq!(seconds_to_ticks(-1.0, 384.0), 0);
    }
}
