//! # Regimens
//!
//! A regimen watches the discriminator loss and tells the trainer what to do
//! after every iteration.
//!
//! ## BasicRegimen
//!
//! The loss and its square are smoothed with an exponential moving average.
//! Every `max_iterations / 100` iterations, once past a warm-up of
//! `max_iterations / 10`, the smoothed variance is checked:
//!
//! | Loss in band | Variance small | Action |
//! |--------------|----------------|--------|
//! | yes | yes | stop (converged) |
//! | no | yes | reset, or escape once resets run out |
//! | any | no | continue |
//!
//! The band defaults to `ln 2 ± 0.001`, the loss of a discriminator that can
//! no longer tell real from generated rows.

use serde::{Deserialize, Serialize};
use tracing::info;

/// What the trainer should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Continue,
    /// Re-initialize the discriminator and keep going.
    Reset,
    Stop,
    /// Give up; training failed to converge.
    Escape,
}

/// Batch sizes for one training iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    /// Real rows per discriminator step.
    pub batch: usize,
    /// Discriminator steps per generator step.
    pub k: usize,
    /// Generated rows per real row in a discriminator step.
    pub d_factor: f64,
    /// Generated rows per real row in a generator step.
    pub g_factor: f64,
}

impl Schedule {
    pub fn d_batch(&self) -> usize {
        (self.batch as f64 * self.d_factor) as usize
    }

    pub fn g_batch(&self) -> usize {
        (self.batch as f64 * self.g_factor) as usize
    }
}

/// Convergence policy driving [`Trainer::train`](crate::Trainer::train).
pub trait Regimen {
    /// Decide on the action after `iteration` given `(d_loss, g_loss)`.
    fn command(&mut self, iteration: usize, losses: (f32, f32)) -> (Action, &'static str);

    /// Forget smoothed statistics and the reset count.
    fn reset(&mut self);

    fn schedule(&self) -> Schedule;

    /// Log progress. By default only non-continue actions are logged.
    fn report(&self, iteration: usize, action: Action, message: &str, d_loss: f32, g_loss: f32) {
        if action != Action::Continue {
            info!(iteration, ?action, d_loss, g_loss, "{message}");
        }
    }
}

/// Settings of a [`BasicRegimen`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimenConfig {
    pub batch: usize,
    pub k: usize,
    pub d_factor: f64,
    pub g_factor: f64,
    pub max_iterations: usize,
    pub min_loss: f64,
    pub max_loss: f64,
    pub min_variance: f64,
    /// Weight of the previous average in the moving averages.
    pub decay: f64,
    pub max_resets: usize,
}

impl Default for RegimenConfig {
    fn default() -> Self {
        let ln2 = std::f64::consts::LN_2;
        Self {
            batch: 64,
            k: 1,
            d_factor: 1.0,
            g_factor: 1.0,
            max_iterations: 1000,
            min_loss: ln2 - 0.001,
            max_loss: ln2 + 0.001,
            min_variance: 1e-5,
            decay: 0.9,
            max_resets: 10,
        }
    }
}

/// Stops on a steady discriminator loss near `ln 2`.
#[derive(Debug, Clone)]
pub struct BasicRegimen {
    config: RegimenConfig,
    check: usize,
    ramp: usize,
    /// Smoothed loss and squared loss; `None` until the first observation.
    moments: Option<(f64, f64)>,
    resets: usize,
}

impl BasicRegimen {
    pub fn new(config: RegimenConfig) -> Self {
        Self {
            check: (config.max_iterations / 100).max(1),
            ramp: config.max_iterations / 10,
            config,
            moments: None,
            resets: 0,
        }
    }

    pub fn config(&self) -> &RegimenConfig {
        &self.config
    }

    /// Resets signalled since construction or the last `reset()`.
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Smoothed `E[x²] - E[x]²`, zero before any observation.
    pub fn variance(&self) -> f64 {
        self.moments.map_or(0.0, |(mean, sq)| sq - mean * mean)
    }

    fn observe(&mut self, loss: f64) {
        let decay = self.config.decay;
        self.moments = Some(match self.moments {
            None => (loss, loss * loss),
            Some((mean, sq)) => (
                decay * mean + (1.0 - decay) * loss,
                decay * sq + (1.0 - decay) * loss * loss,
            ),
        });
    }
}

impl Default for BasicRegimen {
    fn default() -> Self {
        Self::new(RegimenConfig::default())
    }
}

impl Regimen for BasicRegimen {
    fn command(&mut self, iteration: usize, (d_loss, _): (f32, f32)) -> (Action, &'static str) {
        let loss = f64::from(d_loss);
        self.observe(loss);
        if iteration >= self.config.max_iterations {
            return (Action::Stop, "max iterations reached");
        }
        if iteration % self.check == 0 && iteration >= self.ramp {
            let variance = self.variance();
            let in_band = loss > self.config.min_loss && loss < self.config.max_loss;
            if variance < self.config.min_variance {
                if in_band {
                    return (Action::Stop, "target loss and variance reached");
                }
                self.resets += 1;
                if self.resets >= self.config.max_resets {
                    return (Action::Escape, "max resets reached");
                }
                return (Action::Reset, "bad convergence detected");
            }
        }
        (Action::Continue, "continue training")
    }

    fn reset(&mut self) {
        self.moments = None;
        self.resets = 0;
    }

    fn schedule(&self) -> Schedule {
        Schedule {
            batch: self.config.batch,
            k: self.config.k,
            d_factor: self.config.d_factor,
            g_factor: self.config.g_factor,
        }
    }

    fn report(&self, iteration: usize, action: Action, message: &str, d_loss: f32, g_loss: f32) {
        if action == Action::Continue && iteration % self.check != 0 {
            return;
        }
        info!(iteration, ?action, d_loss, g_loss, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_interval_never_zero() {
        let regimen = BasicRegimen::new(RegimenConfig {
            max_iterations: 50,
            ..RegimenConfig::default()
        });
        assert_eq!(regimen.check, 1);
        assert_eq!(regimen.ramp, 5);
    }

    #[test]
    fn test_first_observation_seeds_average() {
        let mut regimen = BasicRegimen::default();
        regimen.command(0, (2.0, 0.0));
        assert_eq!(regimen.variance(), 0.0);
        regimen.command(1, (4.0, 0.0));
        // mean 2.2, mean square 5.2
        assert!((regimen.variance() - (5.2 - 2.2 * 2.2)).abs() < 1e-9);
    }

    #[test]
    fn test_schedule_sizes() {
        let regimen = BasicRegimen::new(RegimenConfig {
            batch: 10,
            d_factor: 1.5,
            g_factor: 0.5,
            ..RegimenConfig::default()
        });
        let schedule = regimen.schedule();
        assert_eq!(schedule.d_batch(), 15);
        assert_eq!(schedule.g_batch(), 5);
    }
}
