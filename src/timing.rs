//! Frame clock with nested pausing and frame pacing.

use std::time::{Duration, Instant};

/// Clock state for the frame loop.
///
/// Keeps the game clock, the pause refcount and the bookkeeping for the once-per-second frame rate log.
/// Paused spans are folded out of the clock origin once per loop iteration so game time never advances while paused.
pub(crate) struct TimingState {
    /// Origin of the game clock, shifted forward when a pause span is folded.
    origin: Instant,
    /// Moment of the previous update call.
    last_update: Instant,
    /// Minimum duration of a single loop iteration, zero disables pacing.
    min_frame_duration: Duration,
    /// Amount of unmatched pause calls.
    pause_depth: u32,
    /// Start of the currently open pause span.
    pause_started: Option<Instant>,
    /// Finished pause spans not yet folded into the origin.
    pause_pending: Duration,
    /// Start of the current frame rate measurement interval.
    interval_start: Instant,
    /// Updates since the interval started.
    interval_updates: u32,
}

impl TimingState {
    /// Start the clock now.
    pub(crate) fn new(max_frame_rate: u32) -> Self {
        let now = Instant::now();

        Self {
            origin: now,
            last_update: now,
            min_frame_duration: min_frame_duration(max_frame_rate),
            pause_depth: 0,
            pause_started: None,
            pause_pending: Duration::ZERO,
            interval_start: now,
            interval_updates: 0,
        }
    }

    /// Change the frame rate cap, zero disables pacing.
    pub(crate) fn set_max_frame_rate(&mut self, max_frame_rate: u32) {
        self.min_frame_duration = min_frame_duration(max_frame_rate);
    }

    /// Seconds of game time, paused spans excluded once folded.
    pub(crate) fn elapsed(&self) -> f32 {
        self.elapsed_at(Instant::now())
    }

    /// Whether at least one pause is active.
    pub(crate) const fn is_paused(&self) -> bool {
        self.pause_depth > 0
    }

    /// Increment the pause refcount, recording the span start on the first.
    pub(crate) fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    /// Decrement the pause refcount, closing the span when it reaches zero.
    ///
    /// # Panics
    ///
    /// - When called without a matching [`Self::pause`].
    pub(crate) fn resume(&mut self) {
        self.resume_at(Instant::now());
    }

    /// Mark the start of an update call and return the seconds since the previous one.
    pub(crate) fn begin_update(&mut self) -> f32 {
        self.begin_update_at(Instant::now())
    }

    /// Shift the clock origin past any finished pause spans.
    ///
    /// Called once per loop iteration so a pause never advances game time.
    pub(crate) fn fold_finished_pauses(&mut self) {
        if self.pause_pending > Duration::ZERO {
            self.origin += self.pause_pending;
            self.last_update += self.pause_pending;
            self.pause_pending = Duration::ZERO;
        }
    }

    /// Remaining sleep to keep the frame rate at the cap, `None` when the iteration already overran.
    pub(crate) fn pacing_sleep(&self, iteration_cost: Duration) -> Option<Duration> {
        let remaining = self.min_frame_duration.checked_sub(iteration_cost)?;

        (remaining > Duration::ZERO).then_some(remaining)
    }

    /// Log the measured frame rate once per second.
    pub(crate) fn log_frame_rate(&mut self) {
        let now = Instant::now();
        let interval = now.duration_since(self.interval_start);
        if interval < Duration::from_secs(1) {
            return;
        }

        let fps = f64::from(self.interval_updates) / interval.as_secs_f64();
        log::debug!("fps={fps:5.1}");

        self.interval_start = now;
        self.interval_updates = 0;
    }

    /// Clock value at an explicit moment.
    fn elapsed_at(&self, now: Instant) -> f32 {
        now.duration_since(self.origin)
            .saturating_sub(self.pause_pending)
            .as_secs_f32()
    }

    /// Pause at an explicit moment.
    fn pause_at(&mut self, now: Instant) {
        if self.pause_depth == 0 {
            self.pause_started = Some(now);
        }
        self.pause_depth += 1;
    }

    /// Resume at an explicit moment.
    fn resume_at(&mut self, now: Instant) {
        assert!(
            self.pause_depth > 0,
            "Resume called without a matching pause"
        );

        self.pause_depth -= 1;
        if self.pause_depth == 0 {
            if let Some(started) = self.pause_started.take() {
                self.pause_pending += now.duration_since(started);
            }
        }
    }

    /// Update tick at an explicit moment.
    fn begin_update_at(&mut self, now: Instant) -> f32 {
        let delta = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        self.interval_updates += 1;

        delta
    }
}

/// Minimum duration of a loop iteration for a frame rate cap.
fn min_frame_duration(max_frame_rate: u32) -> Duration {
    if max_frame_rate == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs(1) / max_frame_rate
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::TimingState;

    /// Nested pauses only close the span on the outermost resume.
    #[test]
    fn nested_pause_folds_full_span() {
        let mut timing = TimingState::new(0);
        let start = Instant::now();
        timing.origin = start;
        timing.last_update = start;

        timing.pause_at(start + Duration::from_millis(100));
        timing.pause_at(start + Duration::from_millis(200));
        assert!(timing.is_paused());

        timing.resume_at(start + Duration::from_millis(300));
        // Still paused, inner resume must not close the span
        assert!(timing.is_paused());
        assert_eq!(timing.pause_pending, Duration::ZERO);

        timing.resume_at(start + Duration::from_millis(600));
        assert!(!timing.is_paused());
        assert_eq!(timing.pause_pending, Duration::from_millis(500));

        // Folding removes the paused span from the clock
        timing.fold_finished_pauses();
        assert_eq!(timing.pause_pending, Duration::ZERO);
        let elapsed = timing.elapsed_at(start + Duration::from_millis(700));
        assert!((elapsed - 0.2).abs() < 1e-3, "elapsed was {elapsed}");
    }

    /// Game time keeps still across a fold even before the fold runs.
    #[test]
    fn pending_pause_excluded_from_elapsed() {
        let mut timing = TimingState::new(0);
        let start = Instant::now();
        timing.origin = start;

        timing.pause_at(start + Duration::from_millis(100));
        timing.resume_at(start + Duration::from_millis(400));

        let elapsed = timing.elapsed_at(start + Duration::from_millis(500));
        assert!((elapsed - 0.2).abs() < 1e-3, "elapsed was {elapsed}");
    }

    #[test]
    #[should_panic(expected = "Resume called without a matching pause")]
    fn unmatched_resume_panics() {
        let mut timing = TimingState::new(0);
        timing.resume();
    }

    /// A fast iteration sleeps the remainder, a slow one does not sleep at all.
    #[test]
    fn pacing_sleeps_only_the_remainder() {
        let timing = TimingState::new(50);

        assert_eq!(
            timing.pacing_sleep(Duration::from_millis(5)),
            Some(Duration::from_millis(15))
        );
        assert_eq!(timing.pacing_sleep(Duration::from_millis(20)), None);
        assert_eq!(timing.pacing_sleep(Duration::from_millis(30)), None);
    }

    /// Pacing is disabled entirely with a zero cap.
    #[test]
    fn zero_cap_disables_pacing() {
        let timing = TimingState::new(0);

        assert_eq!(timing.pacing_sleep(Duration::ZERO), None);
    }

    /// The update delta spans from the previous update call.
    #[test]
    fn update_delta_spans_previous_update() {
        let mut timing = TimingState::new(0);
        let start = Instant::now();
        timing.last_update = start;

        let first = timing.begin_update_at(start + Duration::from_millis(16));
        let second = timing.begin_update_at(start + Duration::from_millis(48));

        assert!((first - 0.016).abs() < 1e-4);
        assert!((second - 0.032).abs() < 1e-4);
    }
}
