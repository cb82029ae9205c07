//! # Trainer Tests
//!
//! End-to-end runs on a small two-column table:
//! - Width validation when wiring models to a connector
//! - Lazy stepping and regimen-driven training
//! - Sampling, decoding and holdout evaluation after training

use approx::assert_relative_eq;
use tabgan_core::{Device, Matrix, Shape};
use tabgan_stages::{Connector, Pipeline, RandomSampler, SamplerConfig, SimpleEffectLoader};
use tabgan_train::{
    Action, DiscriminatorConfig, GeneratorConfig, Regimen, Schedule, SequentialGenerator,
    StandardDiscriminator, TrainError, Trainer,
};

/// Continuous column 0, category column 1 with three levels.
fn table() -> Matrix {
    let rows: Vec<Vec<f32>> = (0..60)
        .map(|i| vec![(i as f32 * 0.5).cos() * 3.0 + 1.0, (i % 3) as f32])
        .collect();
    Matrix::from_rows(&rows, 2, &Device::Cpu).unwrap()
}

fn connector(data: &Matrix) -> Connector {
    let parts = vec![
        Pipeline::standardize(2, &[0], data).unwrap(),
        Pipeline::category(2, (1, 3)).unwrap(),
    ];
    let config = SamplerConfig {
        seed: Some(7),
        ..SamplerConfig::default()
    };
    let sampler = RandomSampler::new(data, &config).unwrap();
    Connector::joint(Box::new(sampler), 3, 4, 4, parts).unwrap()
}

fn generator(intermediates: usize) -> SequentialGenerator {
    let config = GeneratorConfig {
        conditions: 3,
        latents: 4,
        intermediates,
        steps: vec![16],
        learning: 0.01,
        ..GeneratorConfig::default()
    };
    SequentialGenerator::new(config, &Device::Cpu).unwrap()
}

fn discriminator() -> StandardDiscriminator {
    let config = DiscriminatorConfig {
        conditions: 3,
        outputs: 4,
        steps: vec![16],
        ..DiscriminatorConfig::default()
    };
    StandardDiscriminator::new(config, &Device::Cpu).unwrap()
}

fn trainer() -> Trainer<SequentialGenerator, StandardDiscriminator> {
    let data = table();
    Trainer::new(generator(4), discriminator(), connector(&data), Device::Cpu).unwrap()
}

/// Runs `n` iterations, failing on the first error.
fn run(trainer: &mut Trainer<SequentialGenerator, StandardDiscriminator>, n: usize) {
    for step in trainer.step(schedule()).unwrap().take(n) {
        step.unwrap();
    }
}

fn schedule() -> Schedule {
    Schedule {
        batch: 8,
        k: 2,
        d_factor: 1.0,
        g_factor: 1.5,
    }
}

/// Resets once at `reset`, then ends with `last` at `end`.
struct Scripted {
    reset: usize,
    end: usize,
    last: Action,
}

impl Regimen for Scripted {
    fn command(&mut self, iteration: usize, _: (f32, f32)) -> (Action, &'static str) {
        if iteration == self.end {
            (self.last, "scripted end")
        } else if iteration == self.reset {
            (Action::Reset, "scripted reset")
        } else {
            (Action::Continue, "continue")
        }
    }

    fn reset(&mut self) {}

    fn schedule(&self) -> Schedule {
        schedule()
    }
}

// ============================================================================
// Construction Tests
// ============================================================================

#[test]
fn test_new_rejects_mismatched_generator() {
    let data = table();
    let result = Trainer::new(generator(5), discriminator(), connector(&data), Device::Cpu);
    assert!(matches!(result, Err(TrainError::Configuration { .. })));
}

#[test]
fn test_schedule_needs_rows() {
    let mut trainer = trainer();
    let empty = Schedule {
        batch: 0,
        ..schedule()
    };
    assert!(trainer.step(empty).is_err());
}

// ============================================================================
// Training Tests
// ============================================================================

#[test]
fn test_steps_count_iterations_with_finite_losses() {
    let mut trainer = trainer();
    let steps: Vec<_> = trainer
        .step(schedule())
        .unwrap()
        .take(5)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(steps.len(), 5);
    for (i, (iteration, (d_loss, g_loss))) in steps.into_iter().enumerate() {
        assert_eq!(iteration, i);
        assert!(d_loss.is_finite() && d_loss >= 0.0);
        assert!(g_loss.is_finite() && g_loss >= 0.0);
    }
}

#[test]
fn test_train_follows_regimen() {
    let mut trainer = trainer();
    let mut regimen = Scripted {
        reset: 2,
        end: 6,
        last: Action::Stop,
    };
    let outcome = trainer.train(&mut regimen).unwrap();
    assert_eq!(outcome.iterations, 7);
    assert_eq!(outcome.resets, 1);
    assert!(outcome.d_loss.is_finite());
}

#[test]
fn test_escape_reports_non_convergence() {
    let mut trainer = trainer();
    let mut regimen = Scripted {
        reset: usize::MAX,
        end: 3,
        last: Action::Escape,
    };
    let result = trainer.train(&mut regimen);
    assert!(matches!(result, Err(TrainError::NotConverged)));
}

#[test]
fn test_training_leaves_holdout_alone() {
    let mut trainer = trainer();
    let before = trainer.connector().holdout_raw().to_rows().unwrap();
    run(&mut trainer, 3);
    trainer.restart().unwrap();
    let after = trainer.connector().holdout_raw().to_rows().unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_training_moves_effect_embeddings() {
    // Continuous column 0, effect level (four levels) in column 1.
    let rows: Vec<Vec<f32>> = (0..60)
        .map(|i| vec![(i as f32 * 0.3).sin(), (i % 4) as f32])
        .collect();
    let data = Matrix::from_rows(&rows, 2, &Device::Cpu).unwrap();
    let effect = SimpleEffectLoader::new(2, 2, (1, 4)).unwrap().with_rate(0.05);
    let parts = vec![
        Pipeline::standardize(2, &[0], &data).unwrap(),
        Pipeline::effect(effect).unwrap(),
    ];
    let config = SamplerConfig {
        seed: Some(3),
        ..SamplerConfig::default()
    };
    let sampler = RandomSampler::new(&data, &config).unwrap();
    let connector = Connector::joint(Box::new(sampler), 0, 3, 3, parts).unwrap();

    let generator = SequentialGenerator::new(
        GeneratorConfig {
            latents: 4,
            intermediates: 3,
            steps: vec![8],
            ..GeneratorConfig::default()
        },
        &Device::Cpu,
    )
    .unwrap();
    let discriminator = StandardDiscriminator::new(
        DiscriminatorConfig {
            outputs: 3,
            steps: vec![8],
            ..DiscriminatorConfig::default()
        },
        &Device::Cpu,
    )
    .unwrap();
    let mut trainer = Trainer::new(generator, discriminator, connector, Device::Cpu).unwrap();

    let embeddings = |trainer: &Trainer<_, _>| -> Vec<Vec<f32>> {
        trainer
            .connector()
            .holdout()
            .unwrap()
            .to_rows()
            .unwrap()
            .into_iter()
            .map(|row| row[1..].to_vec())
            .collect()
    };
    let before = embeddings(&trainer);
    run(&mut trainer, 3);
    let after = embeddings(&trainer);

    assert_ne!(before, after);
    for row in after {
        let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-5);
    }
}

// ============================================================================
// Output Tests
// ============================================================================

#[test]
fn test_sample_and_generate_shapes() {
    let mut trainer = trainer();
    run(&mut trainer, 2);

    let sampled = trainer.sample(10).unwrap();
    assert_eq!(sampled.shape(), Shape::new(10, 4));
    // Category block is a probability simplex.
    for row in sampled.to_rows().unwrap() {
        let total: f32 = row[1..].iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    let generated = trainer.generate(10).unwrap();
    assert_eq!(generated.shape(), Shape::new(10, 2));
    for row in generated.to_rows().unwrap() {
        assert!([0.0, 1.0, 2.0].contains(&row[1]));
    }
}

#[test]
fn test_evaluate_on_holdout() {
    let mut trainer = trainer();
    let loss = trainer.evaluate().unwrap();
    assert!(loss.is_finite() && loss > 0.0);
}
