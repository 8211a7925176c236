use std::f64::consts::TAU;
use std::num::NonZeroUsize;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::heroes::{hero_emoji, segment_color, SUPERHEROES};

// Spin randomization bounds (upper bounds exclusive)
pub const MIN_FULL_ROTATIONS: f64 = 5.0;
pub const MAX_FULL_ROTATIONS: f64 = 10.0;
pub const MIN_SPIN_DURATION_MS: f64 = 4000.0;
pub const MAX_SPIN_DURATION_MS: f64 = 6000.0;

/// Frame interval used when a spin is driven headlessly
pub const FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WheelError {
    #[error("outcome set must contain at least one label")]
    EmptyOutcomeSet,
    #[error("invalid spin plan: {0}")]
    InvalidPlan(&'static str),
}

/// Reasons a spin request is turned away. Disabled wins over busy.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpinRejected {
    #[error("the wheel is disabled")]
    Disabled,
    #[error("a spin is already in progress")]
    Busy,
}

/// Ordered, non-empty list of equiprobable wheel labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeSet {
    labels: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub index: usize,
    pub label: String,
}

impl OutcomeSet {
    pub fn new<I, S>(labels: I) -> Result<Self, WheelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(WheelError::EmptyOutcomeSet);
        }
        Ok(Self { labels })
    }

    /// The default hero wheel.
    pub fn heroes() -> Self {
        Self {
            labels: SUPERHEROES.iter().map(|hero| hero.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    // Always false, construction rejects empty sets
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn segment_angle(&self) -> f64 {
        TAU / self.labels.len() as f64
    }

    fn segments(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.labels.len()).unwrap_or(NonZeroUsize::MIN)
    }

    /// Maps a resting wheel angle to the outcome under the pointer.
    pub fn decode(&self, angle: f64) -> Outcome {
        let index = segment_index(angle, self.segments());
        Outcome {
            index,
            label: self.labels[index].clone(),
        }
    }
}

/// Cubic ease-out: fast start, smooth stop. `f(0) = 0`, `f(1) = 1`, `f'(1) = 0`.
pub fn ease_out_cubic(progress: f64) -> f64 {
    let t = progress.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

/// Reduces an unbounded angle to `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(TAU);
    // rem_euclid rounds tiny negative inputs up to exactly TAU
    if normalized >= TAU {
        0.0
    } else {
        normalized
    }
}

/// Angle of the fixed pointer inside the unrotated wheel frame.
///
/// The pointer sits at canvas angle 0 and segments are laid out clockwise
/// from there, so a wheel rotated by `a` shows the segment at `2π - a` under
/// the pointer. Moving the pointer on screen means changing this formula.
pub fn pointer_angle(angle: f64) -> f64 {
    normalize_angle(TAU - normalize_angle(angle))
}

/// Index of the segment under the pointer. Always in `[0, segments)`.
pub fn segment_index(angle: f64, segments: NonZeroUsize) -> usize {
    let count = segments.get();
    let segment_angle = TAU / count as f64;
    // Non-finite angles normalize to NaN, which casts to 0
    let raw = (pointer_angle(angle) / segment_angle).floor() as usize;
    raw % count
}

/// The random commitment behind one spin. Only obtainable through
/// [`SpinPlan::new`] or [`SpinPlan::random`], so every plan has a finite,
/// positive duration.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct SpinPlan {
    full_rotations: f64,
    random_offset: f64,
    duration_ms: f64,
}

impl SpinPlan {
    pub fn new(full_rotations: f64, random_offset: f64, duration_ms: f64) -> Result<Self, WheelError> {
        if !full_rotations.is_finite() || full_rotations < 0.0 {
            return Err(WheelError::InvalidPlan("full rotations must be finite and non-negative"));
        }
        if !random_offset.is_finite() || random_offset < 0.0 {
            return Err(WheelError::InvalidPlan("offset must be finite and non-negative"));
        }
        if !duration_ms.is_finite() || duration_ms <= 0.0 {
            return Err(WheelError::InvalidPlan("duration must be finite and positive"));
        }
        Ok(Self {
            full_rotations,
            random_offset,
            duration_ms,
        })
    }

    /// Draws rotations from [5, 10), offset from [0, 2π) and duration from [4000, 6000) ms.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            full_rotations: rng.gen_range(MIN_FULL_ROTATIONS..MAX_FULL_ROTATIONS),
            random_offset: rng.gen_range(0.0..TAU),
            duration_ms: rng.gen_range(MIN_SPIN_DURATION_MS..MAX_SPIN_DURATION_MS),
        }
    }

    pub fn full_rotations(&self) -> f64 {
        self.full_rotations
    }

    pub fn random_offset(&self) -> f64 {
        self.random_offset
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn angle_delta(&self) -> f64 {
        self.full_rotations * TAU + self.random_offset
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ActiveSpin {
    pub start_angle: f64,
    pub target_angle: f64,
    pub start_time_ms: f64,
    pub end_time_ms: f64,
    pub duration_ms: f64,
}

impl ActiveSpin {
    /// True from the deadline on. The ratio in `progress_at` can round to
    /// just below 1 at the deadline itself.
    pub fn is_finished_at(&self, now_ms: f64) -> bool {
        now_ms >= self.end_time_ms
    }

    pub fn progress_at(&self, now_ms: f64) -> f64 {
        if self.is_finished_at(now_ms) {
            return 1.0;
        }
        let progress = (now_ms - self.start_time_ms) / self.duration_ms;
        if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        }
    }

    pub fn angle_at_progress(&self, progress: f64) -> f64 {
        self.start_angle + (self.target_angle - self.start_angle) * ease_out_cubic(progress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpinPhase {
    Idle,
    Spinning(ActiveSpin),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameUpdate {
    /// No spin in flight.
    Idle,
    Spinning { angle: f64, progress: f64 },
    /// Emitted once, on the frame that reaches progress 1.
    Completed { angle: f64, outcome: Outcome },
}

/// Idle -> Spinning -> Idle state machine behind the wheel animation.
///
/// The host owns the clock: it calls [`WheelSpinner::on_frame`] with a
/// timestamp on every tick and [`WheelSpinner::cancel`] when it tears the
/// animation down.
#[derive(Debug, Clone)]
pub struct WheelSpinner {
    outcomes: OutcomeSet,
    current_angle: f64,
    phase: SpinPhase,
    disabled: bool,
}

impl WheelSpinner {
    pub fn new(outcomes: OutcomeSet) -> Self {
        Self::with_angle(outcomes, 0.0)
    }

    /// Resumes from the angle a previous spin came to rest at.
    pub fn with_angle(outcomes: OutcomeSet, angle: f64) -> Self {
        Self {
            outcomes,
            current_angle: if angle.is_finite() { angle } else { 0.0 },
            phase: SpinPhase::Idle,
            disabled: false,
        }
    }

    pub fn outcomes(&self) -> &OutcomeSet {
        &self.outcomes
    }

    pub fn current_angle(&self) -> f64 {
        self.current_angle
    }

    pub fn phase(&self) -> SpinPhase {
        self.phase
    }

    pub fn is_spinning(&self) -> bool {
        matches!(self.phase, SpinPhase::Spinning(_))
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn start_spin<R: Rng + ?Sized>(&mut self, now_ms: f64, rng: &mut R) -> Result<ActiveSpin, SpinRejected> {
        self.admit()?;
        Ok(self.begin(now_ms, SpinPlan::random(rng)))
    }

    pub fn start_spin_with(&mut self, now_ms: f64, plan: SpinPlan) -> Result<ActiveSpin, SpinRejected> {
        self.admit()?;
        Ok(self.begin(now_ms, plan))
    }

    fn admit(&self) -> Result<(), SpinRejected> {
        if self.disabled {
            Err(SpinRejected::Disabled)
        } else if self.is_spinning() {
            Err(SpinRejected::Busy)
        } else {
            Ok(())
        }
    }

    fn begin(&mut self, now_ms: f64, plan: SpinPlan) -> ActiveSpin {
        let spin = ActiveSpin {
            start_angle: self.current_angle,
            target_angle: self.current_angle + plan.angle_delta(),
            start_time_ms: now_ms,
            end_time_ms: now_ms + plan.duration_ms,
            duration_ms: plan.duration_ms,
        };
        debug!(
            "wheel spin started: {:.2} rotations over {:.0}ms",
            plan.full_rotations, plan.duration_ms
        );
        self.phase = SpinPhase::Spinning(spin);
        spin
    }

    pub fn on_frame(&mut self, now_ms: f64) -> FrameUpdate {
        let spin = match self.phase {
            SpinPhase::Idle => return FrameUpdate::Idle,
            SpinPhase::Spinning(spin) => spin,
        };

        if !spin.is_finished_at(now_ms) {
            let progress = spin.progress_at(now_ms).min(1.0 - f64::EPSILON);
            // Out-of-order timestamps must not rewind the wheel
            self.current_angle = self.current_angle.max(spin.angle_at_progress(progress));
            return FrameUpdate::Spinning {
                angle: self.current_angle,
                progress,
            };
        }

        self.current_angle = spin.target_angle;
        self.phase = SpinPhase::Idle;
        let outcome = self.outcomes.decode(self.current_angle);
        debug!("wheel stopped on segment {} ({})", outcome.index, outcome.label);
        FrameUpdate::Completed {
            angle: self.current_angle,
            outcome,
        }
    }

    /// Abandons an in-flight spin without emitting an outcome.
    /// Returns whether a spin was actually cancelled.
    pub fn cancel(&mut self) -> bool {
        let was_spinning = self.is_spinning();
        self.phase = SpinPhase::Idle;
        was_spinning
    }
}

/// Source of animation frame timestamps, in milliseconds.
/// `None` means the host has torn the animation down.
pub trait Ticker {
    fn next_frame(&mut self) -> Option<f64>;
}

impl<F: FnMut() -> Option<f64>> Ticker for F {
    fn next_frame(&mut self) -> Option<f64> {
        self()
    }
}

/// Deterministic ticker producing evenly spaced frames.
#[derive(Debug, Clone)]
pub struct FixedStepTicker {
    now_ms: f64,
    step_ms: f64,
    frames_left: Option<usize>,
}

impl FixedStepTicker {
    pub fn new(start_ms: f64, step_ms: f64) -> Self {
        Self {
            now_ms: start_ms,
            step_ms,
            frames_left: None,
        }
    }

    pub fn with_frame_limit(mut self, frames: usize) -> Self {
        self.frames_left = Some(frames);
        self
    }
}

impl Ticker for FixedStepTicker {
    fn next_frame(&mut self) -> Option<f64> {
        if let Some(left) = self.frames_left.as_mut() {
            if *left == 0 {
                return None;
            }
            *left -= 1;
        }
        self.now_ms += self.step_ms;
        Some(self.now_ms)
    }
}

/// Pulls frames until the spin completes. If the ticker stops first the
/// spin is cancelled and nothing is emitted.
pub fn drive_spin<T: Ticker + ?Sized>(spinner: &mut WheelSpinner, ticker: &mut T) -> Option<Outcome> {
    loop {
        let Some(now_ms) = ticker.next_frame() else {
            spinner.cancel();
            return None;
        };
        match spinner.on_frame(now_ms) {
            FrameUpdate::Spinning { .. } => continue,
            FrameUpdate::Completed { outcome, .. } => return Some(outcome),
            FrameUpdate::Idle => return None,
        }
    }
}

// === API Types ===

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WheelSegment {
    pub index: usize,
    pub label: String,
    pub emoji: String,
    pub background: String,
    pub text_color: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WheelInfoResponse {
    pub segments: Vec<WheelSegment>,
    pub segment_angle: f64,
}

impl WheelInfoResponse {
    pub fn from_outcomes(outcomes: &OutcomeSet) -> Self {
        let segments = outcomes
            .labels()
            .iter()
            .enumerate()
            .map(|(index, label)| {
                let color = segment_color(index);
                WheelSegment {
                    index,
                    label: label.clone(),
                    emoji: hero_emoji(label).to_string(),
                    background: color.background.to_string(),
                    text_color: color.text.to_string(),
                }
            })
            .collect();
        Self {
            segments,
            segment_angle: outcomes.segment_angle(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SpinRequest {
    #[serde(default)]
    pub current_angle: Option<f64>,
}

/// Everything a client needs to replay a server-committed spin.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SpinResponse {
    pub hero: String,
    pub index: usize,
    pub start_angle: f64,
    pub target_angle: f64,
    pub duration_ms: f64,
    pub full_rotations: f64,
    pub random_offset: f64,
}
