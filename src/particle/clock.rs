//! Poisson activation clock

use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::core::error::{Result, SimError};
use crate::core::types::ClockValue;

/// Whether a tick fired the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Eligible,
    NotYet,
}

/// Countdown redrawn from Poisson(mu) every time it fires
#[derive(Debug, Clone)]
pub struct ActivationClock {
    value: ClockValue,
    rate: f64,
    dist: Poisson<f64>,
}

impl ActivationClock {
    pub fn new<R: Rng + ?Sized>(rate: f64, rng: &mut R) -> Result<Self> {
        let dist = Poisson::new(rate)
            .map_err(|e| SimError::InvalidParameter(format!("clock rate {}: {}", rate, e)))?;
        let mut clock = Self { value: 0, rate, dist };
        clock.redraw(rng);
        Ok(clock)
    }

    pub fn value(&self) -> ClockValue {
        self.value
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Count down one step; firing redraws the countdown
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Activation {
        self.value = self.value.saturating_sub(1);
        if self.value == 0 {
            self.redraw(rng);
            Activation::Eligible
        } else {
            Activation::NotYet
        }
    }

    fn redraw<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let draw: f64 = self.dist.sample(rng);
        self.value = draw.min(ClockValue::MAX as f64) as ClockValue;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_rejects_bad_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(ActivationClock::new(0.0, &mut rng).is_err());
        assert!(ActivationClock::new(-1.0, &mut rng).is_err());
        assert!(ActivationClock::new(f64::NAN, &mut rng).is_err());
    }

    #[test]
    fn test_fires_when_reaching_zero() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut clock = ActivationClock::new(3.0, &mut rng).unwrap();
        clock.value = 2;
        assert_eq!(clock.tick(&mut rng), Activation::NotYet);
        assert_eq!(clock.value(), 1);
        assert_eq!(clock.tick(&mut rng), Activation::Eligible);
    }

    #[test]
    fn test_zero_clock_fires_immediately() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut clock = ActivationClock::new(1.0, &mut rng).unwrap();
        clock.value = 0;
        assert_eq!(clock.tick(&mut rng), Activation::Eligible);
    }

    #[test]
    fn test_fires_regularly() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut clock = ActivationClock::new(2.0, &mut rng).unwrap();
        let fired = (0..1000)
            .filter(|_| clock.tick(&mut rng) == Activation::Eligible)
            .count();
        // Mean countdown is about the rate, so roughly every other tick
        assert!(fired > 200, "fired only {} times", fired);
        assert!(fired < 1000);
    }
}
