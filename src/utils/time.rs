/// Fixed-rate gate driven by frame delta time.
///
/// Accumulates `dt` and opens at most once per call when a full interval has
/// been collected. A late frame does not open the gate several times, the
/// surplus stays in the accumulator and is consumed by later calls. This makes
/// it a fixed-rate sampler, not a fixed-rate integrator.
#[derive(Debug, Clone)]
pub struct FixedRateGate {
    interval: f32,
    accumulator: f32,
}

impl FixedRateGate {
    /// Creates a gate that opens `rate_hz` times per second of accumulated time.
    ///
    /// # Panics
    ///
    /// Panics if `rate_hz` is not a positive finite number.
    #[must_use]
    pub fn new(rate_hz: f32) -> Self {
        assert!(
            rate_hz.is_finite() && rate_hz > 0.0,
            "FixedRateGate requires a positive rate, got {rate_hz}"
        );
        Self {
            interval: 1.0 / rate_hz,
            accumulator: 0.0,
        }
    }

    /// Advances the gate by `dt` seconds. Returns `true` if the gate opened.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.accumulator += dt.max(0.0);
        if self.accumulator < self.interval {
            return false;
        }
        self.accumulator -= self.interval;
        true
    }

    /// Time collected towards the next opening.
    #[must_use]
    pub fn accumulated(&self) -> f32 {
        self.accumulator
    }

    /// Forgets the collected time.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_opens_once_per_interval() {
        let mut gate = FixedRateGate::new(10.0);
        let opened = (0..60).filter(|_| gate.tick(1.0 / 60.0)).count();
        // one second of 60 Hz frames through a 10 Hz gate
        assert!((9..=10).contains(&opened), "opened {opened} times");
    }

    #[test]
    fn test_late_frame_opens_once() {
        let mut gate = FixedRateGate::new(8.0);
        assert!(gate.tick(1.0));
        // the surplus carries over
        assert!(gate.accumulated() > 0.8);
        assert!(gate.tick(0.0));
    }

    #[test]
    #[should_panic(expected = "positive rate")]
    fn test_zero_rate_rejected() {
        let _ = FixedRateGate::new(0.0);
    }
}
