//! Frame pacing for the viewport.
//!
//! [`FrameClock`] implements the "Fix Your Timestep" accumulator: spin and
//! blink advance in fixed 60 Hz steps while orbits are placed from the
//! monotonic elapsed time. [`FrameScheduler`] owns the pending redraw request
//! and a [`CancellationToken`] that is checked before every reschedule, so an
//! unmounted viewport never receives another frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::warn;

/// Fixed simulation timestep: 60 Hz.
pub const FIXED_DT: f64 = 1.0 / 60.0;

/// Maximum frame time clamp to prevent a spiral of death after a stall.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// What one call to [`FrameClock::tick`] produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTick {
    /// Fixed steps to run this frame.
    pub steps: u32,
    /// Monotonic clock time in seconds, including this frame.
    pub elapsed: f64,
    /// Leftover fraction of a step, in `[0, 1)`.
    pub alpha: f64,
}

/// Fixed-timestep frame clock.
#[derive(Debug)]
pub struct FrameClock {
    previous_time: Instant,
    accumulator: f64,
    elapsed: f64,
    frame_count: u64,
    step_count: u64,
}

impl FrameClock {
    /// Starts measuring from now.
    pub fn new() -> Self {
        Self {
            previous_time: Instant::now(),
            accumulator: 0.0,
            elapsed: 0.0,
            frame_count: 0,
            step_count: 0,
        }
    }

    /// Measure the wall time since the last tick and advance by it.
    pub fn tick(&mut self) -> FrameTick {
        let now = Instant::now();
        let frame_time = now.duration_since(self.previous_time).as_secs_f64();
        self.previous_time = now;
        self.advance(frame_time)
    }

    /// Advance by an explicit frame time in seconds.
    pub fn advance(&mut self, frame_time: f64) -> FrameTick {
        let mut frame_time = frame_time.max(0.0);
        if frame_time > MAX_FRAME_TIME {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                frame_time * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            frame_time = MAX_FRAME_TIME;
        }

        self.elapsed += frame_time;
        self.accumulator += frame_time;

        let mut steps = 0;
        while self.accumulator >= FIXED_DT {
            self.accumulator -= FIXED_DT;
            steps += 1;
        }
        self.step_count += u64::from(steps);
        self.frame_count += 1;

        FrameTick {
            steps,
            elapsed: self.elapsed,
            alpha: self.alpha(),
        }
    }

    pub fn alpha(&self) -> f64 {
        if self.accumulator > 0.0 {
            self.accumulator / FIXED_DT
        } else {
            0.0
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Something that can be asked for another frame.
pub trait RedrawTarget {
    fn request_redraw(&self);
}

impl RedrawTarget for winit::window::Window {
    fn request_redraw(&self) {
        winit::window::Window::request_redraw(self);
    }
}

/// Single outstanding redraw request, guarded by a cancellation token.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    token: CancellationToken,
    pending: bool,
    requested: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask `target` for the next frame unless cancelled.
    ///
    /// Requests coalesce: while one is pending, further calls do not reach
    /// the target. Returns whether a frame is now pending.
    pub fn request_frame<T: RedrawTarget + ?Sized>(&mut self, target: &T) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        if !self.pending {
            self.pending = true;
            self.requested += 1;
            target.request_redraw();
        }
        true
    }

    /// Consume the pending request at the start of a frame. Returns `false`
    /// once cancelled, in which case the frame must not run.
    pub fn begin_frame(&mut self) -> bool {
        self.pending = false;
        !self.token.is_cancelled()
    }

    /// Cancel the in-flight frame and refuse all later requests.
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Requests that reached the target so far.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingTarget(Cell<u32>);

    impl RedrawTarget for CountingTarget {
        fn request_redraw(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_fixed_dt_value() {
        assert!((FIXED_DT - 1.0 / 60.0).abs() < f64::EPSILON * 10.0);
    }

    #[test]
    fn test_single_step() {
        let mut clock = FrameClock::new();
        let tick = clock.advance(FIXED_DT);
        assert_eq!(tick.steps, 1);
        assert!(tick.alpha.abs() < 1e-9);
    }

    #[test]
    fn test_partial_frame_runs_no_step() {
        let mut clock = FrameClock::new();
        let tick = clock.advance(0.25 * FIXED_DT);
        assert_eq!(tick.steps, 0);
        assert!((tick.alpha - 0.25).abs() < 1e-10, "alpha was {}", tick.alpha);
        assert_eq!(clock.frame_count(), 1);
    }

    #[test]
    fn test_long_frame_is_clamped() {
        let mut clock = FrameClock::new();
        let tick = clock.advance(1.0);
        let max_steps = (MAX_FRAME_TIME / FIXED_DT).ceil() as u32;
        assert!(tick.steps > 0 && tick.steps <= max_steps);
        assert!((tick.elapsed - MAX_FRAME_TIME).abs() < 1e-12);
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let mut clock = FrameClock::new();
        let mut last = 0.0;
        for frame_time in [0.004, 0.016, 0.0, 0.033, -1.0, 0.2] {
            let tick = clock.advance(frame_time);
            assert!(tick.elapsed >= last);
            last = tick.elapsed;
        }
        assert!((clock.elapsed() - 0.253).abs() < 1e-9);
    }

    #[test]
    fn test_steps_accumulate_across_frames() {
        let mut clock = FrameClock::new();
        let total: u32 = (0..10).map(|_| clock.advance(FIXED_DT * 0.5).steps).sum();
        assert_eq!(total, 5);
        assert_eq!(clock.step_count(), 5);
    }

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_requests_coalesce_until_frame_begins() {
        let target = CountingTarget::default();
        let mut scheduler = FrameScheduler::new();
        assert!(scheduler.request_frame(&target));
        assert!(scheduler.request_frame(&target));
        assert_eq!(target.0.get(), 1);

        assert!(scheduler.begin_frame());
        assert!(!scheduler.is_pending());
        scheduler.request_frame(&target);
        assert_eq!(target.0.get(), 2);
        assert_eq!(scheduler.requested(), 2);
    }

    #[test]
    fn test_cancel_blocks_further_frames() {
        let target = CountingTarget::default();
        let mut scheduler = FrameScheduler::new();
        scheduler.request_frame(&target);
        scheduler.cancel();

        assert!(!scheduler.is_pending());
        assert!(!scheduler.begin_frame());
        assert!(!scheduler.request_frame(&target));
        assert_eq!(target.0.get(), 1);
    }

    #[test]
    fn test_external_token_cancels_scheduler() {
        let target = CountingTarget::default();
        let mut scheduler = FrameScheduler::new();
        scheduler.token().cancel();
        assert!(!scheduler.request_frame(&target));
        assert_eq!(target.0.get(), 0);
    }
}
