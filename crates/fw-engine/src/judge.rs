//! Timing and judgment loop.
//!
//! Notes spawn at `spawn_position` when the cursor reaches their tick and
//! scroll toward `target_position` at `scroll_speed` units per second. The
//! judge scores player input against each note's distance from the target.

use fw_ir::{ticks_to_seconds, ChartEvent, Tick, LANE_COUNT};
use log::debug;

use crate::cursor::ChartCursor;

/// Playfield geometry and scoring constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JudgeConfig {
    /// Where new notes appear
    pub spawn_position: f64,
    /// The judgment point
    pub target_position: f64,
    /// Position units per second
    pub scroll_speed: f64,
    /// Tolerance either side of the target
    pub hit_radius: f64,
    /// Hit points per unit of distance inside the radius
    pub hit_points_per_unit: f64,
    /// Sustain points per second held
    pub hold_points_per_second: f64,
    /// Subtracted for each note that passes unplayed
    pub miss_penalty: f64,
}

impl JudgeConfig {
    /// Seconds a note takes from spawn to the judgment point.
    pub fn lead_in_secs(&self) -> f64 {
        if self.scroll_speed <= 0.0 {
            return 0.0;
        }
        (self.spawn_position - self.target_position) / self.scroll_speed
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            spawn_position: 450.0,
            target_position: 10.0,
            scroll_speed: 200.0,
            hit_radius: 32.0,
            hit_points_per_unit: 40.0,
            hold_points_per_second: 100.0,
            miss_penalty: 50.0,
        }
    }
}

/// Player input sampled for one update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LaneInput {
    /// Fret buttons currently held
    pub held: [bool; LANE_COUNT],
    /// Strum pressed since the last update
    pub strum: bool,
}

impl LaneInput {
    /// Hold the given lanes without strumming.
    pub fn holding(lanes: &[usize]) -> Self {
        let mut input = Self::default();
        for &lane in lanes.iter().filter(|&&l| l < LANE_COUNT) {
            input.held[lane] = true;
        }
        input
    }

    /// Hold the given lanes and strum.
    pub fn strumming(lanes: &[usize]) -> Self {
        Self {
            strum: true,
            ..Self::holding(lanes)
        }
    }
}

/// A note on the playfield.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NotePosition {
    /// Position of the note head
    pub position: f64,
    /// Sustain length in ticks
    pub length: Tick,
    /// Held at least once during its sustain
    credited: bool,
}

impl NotePosition {
    fn new(position: f64, length: Tick) -> Self {
        Self {
            position,
            length,
            credited: false,
        }
    }

    pub fn is_sustain(&self) -> bool {
        self.length > 0
    }

    /// Length of the sustain tail in position units.
    fn tail(&self, ticks_per_unit: f64) -> f64 {
        if ticks_per_unit <= 0.0 {
            return 0.0;
        }
        self.length as f64 / ticks_per_unit
    }
}

/// Scoring outcome for one note.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Judgment {
    /// Tap note strummed inside the radius
    Hit { lane: usize, distance: f64, points: f64 },
    /// Sustain held for one update
    Hold { lane: usize, points: f64 },
    /// Note left the window unplayed
    Miss { lane: usize, penalty: f64 },
}

impl Judgment {
    /// Signed score change.
    pub fn points(&self) -> f64 {
        match *self {
            Judgment::Hit { points, .. } | Judgment::Hold { points, .. } => points,
            Judgment::Miss { penalty, .. } => -penalty,
        }
    }

    pub fn lane(&self) -> usize {
        match *self {
            Judgment::Hit { lane, .. }
            | Judgment::Hold { lane, .. }
            | Judgment::Miss { lane, .. } => lane,
        }
    }
}

/// Per-lane feedback for a strum.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum StrumFeedback {
    /// Lane not held and nothing to play
    #[default]
    Idle,
    /// Lane held with a note this far from the target
    Distance(f64),
    /// Lane held with nothing in range
    FalsePositive,
    /// Note in range but lane not held
    FalseNegative,
}

/// What one update did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub judgments: Vec<Judgment>,
    /// Present when the input strummed
    pub feedback: Option<[StrumFeedback; LANE_COUNT]>,
    /// Notes placed on the playfield
    pub spawned: usize,
}

impl TickReport {
    pub fn score_delta(&self) -> f64 {
        self.judgments.iter().map(Judgment::points).sum()
    }
}

/// Drives a cursor from elapsed time and scores input.
#[derive(Clone, Debug)]
pub struct Judge {
    cursor: ChartCursor,
    config: JudgeConfig,
    lanes: [Vec<NotePosition>; LANE_COUNT],
    /// Clock reading at the previous update
    last_time: f64,
    /// Time accumulated toward the next cursor event
    pending_time: f64,
    score: f64,
}

impl Judge {
    pub fn new(cursor: ChartCursor, config: JudgeConfig) -> Self {
        Self {
            cursor,
            config,
            lanes: Default::default(),
            last_time: 0.0,
            pending_time: 0.0,
            score: 0.0,
        }
    }

    pub fn cursor(&self) -> &ChartCursor {
        &self.cursor
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn lanes(&self) -> &[Vec<NotePosition>; LANE_COUNT] {
        &self.lanes
    }

    /// Notes still on the playfield.
    pub fn outstanding(&self) -> usize {
        self.lanes.iter().map(Vec::len).sum()
    }

    /// No cursor events left and no notes on the playfield.
    pub fn is_finished(&self) -> bool {
        self.outstanding() == 0 && self.cursor.next_event().is_empty()
    }

    /// Advance to clock reading `elapsed` (seconds) and judge `input`.
    pub fn update(&mut self, elapsed: f64, input: &LaneInput) -> TickReport {
        let delta = (elapsed - self.last_time).max(0.0);
        self.last_time = self.last_time.max(elapsed);
        self.pending_time += delta;

        let mut report = TickReport::default();
        self.dispatch_events(delta, &mut report);
        self.judge_lanes(delta, input, &mut report);
        self.score += report.score_delta();
        report
    }

    /// Consume every cursor event whose time has come.
    fn dispatch_events(&mut self, delta: f64, report: &mut TickReport) {
        let speed = self.config.scroll_speed;
        loop {
            let ticks_per_second = self.cursor.current_ticks_per_second();
            let pending = self.cursor.next_event();
            if pending.is_empty() {
                break;
            }
            let due_in = ticks_to_seconds(pending.distance(), ticks_per_second);
            if self.pending_time < due_in {
                break;
            }
            self.pending_time -= due_in;

            // After this update's scroll the note sits where it would be had
            // it spawned exactly on its tick.
            let late = self.pending_time;
            let spawn_at = self.config.spawn_position + (delta - late) * speed;

            for event in pending.events() {
                match event {
                    ChartEvent::Notes(notes) => {
                        for note in notes.iter().filter(|n| n.is_playable()) {
                            let position = NotePosition::new(spawn_at, note.length);
                            self.lanes[note.lane as usize].push(position);
                            report.spawned += 1;
                        }
                    }
                    ChartEvent::Tempo(tempo) => {
                        debug!("tempo {} bpm at tick {}", tempo.bpm, tempo.tick)
                    }
                    ChartEvent::TimeSignature(ts) => debug!(
                        "time signature {}/{} at tick {}",
                        ts.numerator,
                        ts.denominator,
                        ts.tick
                    ),
                }
            }
            let distance = pending.distance();
            self.cursor.advance_tick(distance);
        }
    }

    fn judge_lanes(&mut self, delta: f64, input: &LaneInput, report: &mut TickReport) {
        let config = self.config;
        let target = config.target_position;
        let ticks_per_unit = self.cursor.current_ticks_per_second() / config.scroll_speed;
        let mut feedback = [StrumFeedback::Idle; LANE_COUNT];

        for (lane, notes) in self.lanes.iter_mut().enumerate() {
            let held = input.held[lane];
            let mut nearest: Option<f64> = None;

            notes.retain_mut(|note| {
                let distance = (note.position - target).abs();
                let tail = note.tail(ticks_per_unit);

                if !note.is_sustain() && distance <= config.hit_radius {
                    nearest = Some(nearest.map_or(distance, |d| d.min(distance)));
                    if input.strum && held {
                        let points = config.hit_points_per_unit * (config.hit_radius - distance);
                        debug!("lane {} hit at {:.1}", lane, distance);
                        report.judgments.push(Judgment::Hit { lane, distance, points });
                        return false;
                    }
                }

                let into_tail = target - note.position;
                if note.is_sustain() && into_tail > 0.0 && into_tail < tail {
                    nearest = Some(0.0);
                    if held {
                        note.credited = true;
                        let points = delta * config.hold_points_per_second;
                        report.judgments.push(Judgment::Hold { lane, points });
                    }
                }

                if note.position + tail >= target - config.hit_radius {
                    note.position -= delta * config.scroll_speed;
                    return true;
                }
                if !note.credited {
                    debug!("lane {} miss", lane);
                    report.judgments.push(Judgment::Miss {
                        lane,
                        penalty: config.miss_penalty,
                    });
                }
                false
            });

            feedback[lane] = match (nearest, held) {
                (Some(distance), true) => StrumFeedback::Distance(distance),
                (Some(_), false) => StrumFeedback::FalseNegative,
                (None, true) => StrumFeedback::FalsePositive,
                (None, false) => StrumFeedback::Idle,
            };
        }

        if input.strum {
            report.feedback = Some(feedback);
        }
    }

    /// Input a perfect player would give right now.
    ///
    /// Strums a lane once its next tap note is at or just past the target,
    /// and holds lanes whose sustain is at the target.
    pub fn autoplay_input(&self) -> LaneInput {
        let target = self.config.target_position;
        let ticks_per_unit = self.cursor.current_ticks_per_second() / self.config.scroll_speed;
        let mut input = LaneInput::default();

        for (lane, notes) in self.lanes.iter().enumerate() {
            for note in notes {
                let into_tail = target - note.position;
                let tap_due = !note.is_sustain()
                    && note.position <= target
                    && into_tail <= self.config.hit_radius;
                let sustain_due = note.is_sustain()
                    && into_tail >= 0.0
                    && into_tail < note.tail(ticks_per_unit);
                if tap_due {
                    input.held[lane] = true;
                    input.strum = true;
                }
                if sustain_due {
                    input.held[lane] = true;
                }
            }
        }
        input
    }
}
