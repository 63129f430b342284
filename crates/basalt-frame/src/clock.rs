//! Frame timing: delta measurement with stall clamping, and the frame-rate
//! limiter.

use std::time::{Duration, Instant};

use tracing::warn;

/// Immutable timing snapshot passed to systems' surroundings and user
/// callbacks each frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameData {
    /// Wall-clock seconds since the previous frame, clamped.
    pub delta_time: f32,
    /// Accumulated clamped frame time in seconds since startup.
    pub total_time: f64,
    /// Zero-based frame counter.
    pub frame_number: u64,
}

/// Measures wall-clock delta between frames, clamped to a maximum so
/// simulations stay stable after long stalls (debugger pauses, window
/// drags, asset loads).
pub struct FrameClock {
    previous: Instant,
    total_time: f64,
    frame_number: u64,
    max_delta: f64,
}

impl FrameClock {
    /// A clock that clamps reported deltas to `max_delta_seconds`.
    pub fn new(max_delta_seconds: f32) -> Self {
        Self {
            previous: Instant::now(),
            total_time: 0.0,
            frame_number: 0,
            max_delta: f64::from(max_delta_seconds),
        }
    }

    /// Starts the next frame: measures the elapsed wall-clock time and
    /// returns this frame's timing snapshot.
    pub fn tick(&mut self) -> FrameData {
        let now = Instant::now();
        let raw = now.duration_since(self.previous).as_secs_f64();
        self.previous = now;
        self.advance(raw)
    }

    fn advance(&mut self, raw_delta: f64) -> FrameData {
        let delta = if raw_delta > self.max_delta {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                raw_delta * 1000.0,
                self.max_delta * 1000.0
            );
            self.max_delta
        } else {
            raw_delta
        };

        let frame_number = self.frame_number;
        self.frame_number += 1;
        self.total_time += delta;
        FrameData {
            delta_time: delta as f32,
            total_time: self.total_time,
            frame_number,
        }
    }
}

/// Sleeps out the remainder of each frame period when a frame-rate cap is
/// configured.
pub struct FrameLimiter {
    period: Option<Duration>,
    next_deadline: Option<Instant>,
}

impl FrameLimiter {
    /// A limiter for `frame_limit_hz` frames per second; 0 disables it.
    pub fn new(frame_limit_hz: u32) -> Self {
        let period = (frame_limit_hz > 0)
            .then(|| Duration::from_secs_f64(1.0 / f64::from(frame_limit_hz)));
        Self {
            period,
            next_deadline: None,
        }
    }

    /// The configured frame period, if a cap is set.
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Blocks until the next frame boundary. No-op when uncapped.
    pub fn wait(&mut self) {
        let Some(period) = self.period else {
            return;
        };
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now + period);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        // Re-anchor when we have fallen behind instead of accumulating debt.
        let after = Instant::now();
        self.next_deadline = Some(if deadline + period > after {
            deadline + period
        } else {
            after + period
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_clamped_to_maximum() {
        let mut clock = FrameClock::new(0.25);
        let frame = clock.advance(3.0);
        assert!((frame.delta_time - 0.25).abs() < 1e-6);
        assert!((clock.total_time - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_small_delta_passes_through() {
        let mut clock = FrameClock::new(0.25);
        let frame = clock.advance(0.016);
        assert!((frame.delta_time - 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_frame_numbers_increase() {
        let mut clock = FrameClock::new(0.25);
        assert_eq!(clock.advance(0.01).frame_number, 0);
        assert_eq!(clock.advance(0.01).frame_number, 1);
        assert_eq!(clock.advance(0.01).frame_number, 2);
    }

    #[test]
    fn test_total_time_accumulates_clamped_deltas() {
        let mut clock = FrameClock::new(0.25);
        clock.advance(0.1);
        clock.advance(9.0); // clamped to 0.25
        let frame = clock.advance(0.1);
        assert!((frame.total_time - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_tick_measures_wall_clock() {
        let mut clock = FrameClock::new(0.25);
        std::thread::sleep(Duration::from_millis(20));
        let frame = clock.tick();
        assert!(frame.delta_time >= 0.019, "delta {}", frame.delta_time);
        assert!(frame.delta_time <= 0.25);
    }

    #[test]
    fn test_uncapped_limiter_returns_immediately() {
        let mut limiter = FrameLimiter::new(0);
        let started = Instant::now();
        limiter.wait();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert!(limiter.period().is_none());
    }

    #[test]
    fn test_capped_limiter_paces_frames() {
        let mut limiter = FrameLimiter::new(100); // 10ms period
        let started = Instant::now();
        limiter.wait();
        limiter.wait();
        // Two boundaries at 100 Hz span at least one full period.
        assert!(started.elapsed() >= Duration::from_millis(10));
    }
}
