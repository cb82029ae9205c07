//! # Trainer
//!
//! The adversarial loop. Each iteration runs `k` discriminator steps on
//! real rows (label `1`) stacked over detached generated rows (label `0`),
//! then one generator step against all-ones labels plus the connector's
//! penalty. Learnable stages get the gradients of every backward pass and
//! are updated once per iteration.
//!
//! ```text
//! idle ──train──▶ training ──stop──▶ stopped
//!                  │    ▲
//!                  └────┘ reset (discriminator re-initialized)
//!                  │
//!                  └──escape──▶ Err(NotConverged)
//! ```

use tabgan_core::{Axis, Device, Matrix};
use tabgan_stages::Connector;
use tracing::{debug, info, warn};

use crate::error::TrainError;
use crate::model::{Discriminator, Generator};
use crate::regimen::{Action, Regimen, Schedule};

/// How a completed [`Trainer::train`] call ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOutcome {
    /// Iterations run, including the stopping one.
    pub iterations: usize,
    /// Discriminator resets along the way.
    pub resets: usize,
    pub d_loss: f32,
    pub g_loss: f32,
}

/// Label matrices for one schedule, built once per loop.
struct Labels {
    schedule: Schedule,
    /// `batch` ones over `d_batch` zeros.
    mixed: Matrix,
    /// `g_batch` ones.
    trues: Matrix,
}

impl Labels {
    fn new(schedule: Schedule, device: &Device) -> Result<Self, TrainError> {
        if schedule.batch == 0 || schedule.k == 0 {
            return Err(TrainError::config("batch and k must be positive"));
        }
        if schedule.g_batch() == 0 {
            return Err(TrainError::config("generator step needs at least one row"));
        }
        let real = Matrix::ones((schedule.batch, 1), device)?;
        let fake = Matrix::zeros((schedule.d_batch(), 1), device)?;
        let mixed = Matrix::cat(
            &[&real, &fake],
            Axis::Rows,
            (schedule.batch + schedule.d_batch(), 1),
        )?;
        Ok(Self {
            schedule,
            mixed,
            trues: Matrix::ones((schedule.g_batch(), 1), device)?,
        })
    }
}

/// Drives a generator and discriminator over a connector.
pub struct Trainer<G: Generator, D: Discriminator> {
    generator: G,
    discriminator: D,
    connector: Connector,
    device: Device,
}

impl<G: Generator, D: Discriminator> Trainer<G, D> {
    /// Check that all widths line up and move everything to `device`.
    pub fn new(
        mut generator: G,
        mut discriminator: D,
        mut connector: Connector,
        device: Device,
    ) -> Result<Self, TrainError> {
        let checks = [
            ("generator conditions", connector.conditions(), generator.conditions()),
            ("generator intermediates", connector.intermediates(), generator.intermediates()),
            ("discriminator conditions", connector.conditions(), discriminator.conditions()),
            ("discriminator outputs", connector.outputs(), discriminator.outputs()),
        ];
        for (what, expected, got) in checks {
            if expected != got {
                return Err(TrainError::config(format!(
                    "{what}: connector has {expected}, model has {got}"
                )));
            }
        }
        generator.move_to(&device)?;
        discriminator.move_to(&device)?;
        connector.move_to(&device)?;
        debug!(?device, "trainer ready");
        Ok(Self {
            generator,
            discriminator,
            connector,
            device,
        })
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn discriminator(&self) -> &D {
        &self.discriminator
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Rewind the sampler and re-initialize both models and their optimizers.
    pub fn restart(&mut self) -> Result<(), TrainError> {
        self.connector.restart();
        self.discriminator.reset()?;
        self.discriminator.restart()?;
        self.generator.reset()?;
        self.generator.restart()?;
        info!("trainer restarted");
        Ok(())
    }

    /// An endless iterator of `(iteration, (d_loss, g_loss))`.
    pub fn step(&mut self, schedule: Schedule) -> Result<Steps<'_, G, D>, TrainError> {
        let labels = Labels::new(schedule, &self.device)?;
        Ok(Steps {
            trainer: self,
            labels,
            iteration: 0,
        })
    }

    /// Run until `regimen` says stop or escape.
    pub fn train<R: Regimen + ?Sized>(&mut self, regimen: &mut R) -> Result<TrainOutcome, TrainError> {
        let labels = Labels::new(regimen.schedule(), &self.device)?;
        let mut resets = 0;
        let mut iteration = 0;
        loop {
            let (d_loss, g_loss) = self.iterate(&labels)?;
            let (action, message) = regimen.command(iteration, (d_loss, g_loss));
            regimen.report(iteration, action, message, d_loss, g_loss);
            match action {
                Action::Continue => {}
                Action::Reset => {
                    self.discriminator.reset()?;
                    self.discriminator.restart()?;
                    resets += 1;
                }
                Action::Stop => {
                    info!(iteration, resets, "training stopped");
                    return Ok(TrainOutcome {
                        iterations: iteration + 1,
                        resets,
                        d_loss,
                        g_loss,
                    });
                }
                Action::Escape => {
                    warn!(iteration, resets, "training escaped");
                    return Err(TrainError::NotConverged);
                }
            }
            iteration += 1;
        }
    }

    /// One discriminator-then-generator iteration.
    fn iterate(&mut self, labels: &Labels) -> Result<(f32, f32), TrainError> {
        let schedule = labels.schedule;
        let d_size = schedule.batch + schedule.d_batch();
        let conditions = self.connector.conditions().get();
        let outputs = self.connector.outputs().get();

        let mut d_loss = 0.0;
        for _ in 0..schedule.k {
            let real = self.connector.sample(schedule.batch)?;
            let r_condition = self.connector.condition(&real)?;
            let fake = self.connector.sample(schedule.d_batch())?;
            let f_condition = self.connector.condition(&fake)?;
            let generated = self.generator.sample(&f_condition)?.detach();
            let f_data = self.connector.prepare(&f_condition, &generated)?;

            let condition = Matrix::cat(&[&r_condition, &f_condition], Axis::Rows, (d_size, conditions))?;
            let data = Matrix::cat(&[&real, &f_data], Axis::Rows, (d_size, outputs))?;
            let (loss, grads) = self.discriminator.step(&condition, &data, &labels.mixed)?;
            self.connector.accumulate(&grads)?;
            d_loss = loss.scalar()?;
        }

        let fake = self.connector.sample(schedule.g_batch())?;
        let condition = self.connector.condition(&fake)?;
        let generated = self.generator.sample(&condition)?;
        let f_data = self.connector.prepare(&condition, &generated)?;
        let adversarial = self.discriminator.loss(&condition, &f_data, &labels.trues)?;
        let penalty = self.connector.loss(&condition, &generated)?;
        let grads = self.generator.update(&adversarial.add(&penalty)?)?;
        self.connector.accumulate(&grads)?;
        self.connector.update()?;

        Ok((d_loss, adversarial.scalar()?))
    }

    /// Run `f` with both models in evaluation mode, restoring training mode
    /// afterwards whether or not `f` succeeds.
    fn evaluating<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, TrainError>,
    ) -> Result<T, TrainError> {
        self.generator.train(false);
        self.discriminator.train(false);
        let result = f(self);
        self.generator.train(true);
        self.discriminator.train(true);
        result
    }

    /// `n` generated rows in discriminable space.
    pub fn sample(&mut self, n: usize) -> Result<Matrix, TrainError> {
        self.evaluating(|trainer| {
            let batch = trainer.connector.sample(n)?;
            let condition = trainer.connector.condition(&batch)?;
            let generated = trainer.generator.sample(&condition)?.detach();
            Ok(trainer.connector.prepare(&condition, &generated)?)
        })
    }

    /// `n` generated rows decoded back to raw columns.
    pub fn generate(&mut self, n: usize) -> Result<Matrix, TrainError> {
        let data = self.sample(n)?;
        Ok(self.connector.unload(&data)?)
    }

    /// Mean discriminator loss on the holdout, labelled real.
    pub fn evaluate(&mut self) -> Result<f32, TrainError> {
        self.evaluating(|trainer| {
            let holdout = trainer.connector.holdout()?.detach();
            let condition = trainer.connector.condition(&holdout)?;
            let trues = Matrix::ones((holdout.rows().get(), 1), &trainer.device)?;
            Ok(trainer
                .discriminator
                .loss(&condition, &holdout, &trues)?
                .scalar()?)
        })
    }
}

/// Lazy training iterations borrowed from a [`Trainer`].
///
/// Never ends on its own; stop consuming it to stop training.
pub struct Steps<'a, G: Generator, D: Discriminator> {
    trainer: &'a mut Trainer<G, D>,
    labels: Labels,
    iteration: usize,
}

impl<G: Generator, D: Discriminator> Iterator for Steps<'_, G, D> {
    type Item = Result<(usize, (f32, f32)), TrainError>;

    fn next(&mut self) -> Option<Self::Item> {
        let losses = match self.trainer.iterate(&self.labels) {
            Ok(losses) => losses,
            Err(err) => return Some(Err(err)),
        };
        let iteration = self.iteration;
        self.iteration += 1;
        Some(Ok((iteration, losses)))
    }
}
