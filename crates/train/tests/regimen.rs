//! # Regimen Tests
//!
//! Convergence decisions of [`BasicRegimen`] on scripted loss sequences:
//! - A steady loss at `ln 2` converges once the warm-up is over
//! - A steady loss elsewhere resets until resets run out
//! - A noisy loss runs to the iteration limit

use std::f32::consts::LN_2;

use tabgan_train::{Action, BasicRegimen, Regimen, RegimenConfig};

/// Feed `loss(i)` until the regimen leaves `Continue`.
fn run(regimen: &mut BasicRegimen, loss: impl Fn(usize) -> f32) -> Vec<(usize, Action)> {
    let mut events = Vec::new();
    for i in 0..10_000 {
        let (action, _) = regimen.command(i, (loss(i), 0.0));
        if action != Action::Continue {
            events.push((i, action));
        }
        if matches!(action, Action::Stop | Action::Escape) {
            break;
        }
    }
    events
}

#[test]
fn test_steady_ln2_stops_after_warm_up() {
    let mut regimen = BasicRegimen::default();
    let events = run(&mut regimen, |_| LN_2);
    assert_eq!(events, vec![(100, Action::Stop)]);
    assert_eq!(regimen.resets(), 0);
}

#[test]
fn test_collapsed_loss_resets_then_escapes() {
    let mut regimen = BasicRegimen::default();
    let events = run(&mut regimen, |_| 2.0);

    let resets: Vec<usize> = events
        .iter()
        .filter(|(_, action)| *action == Action::Reset)
        .map(|(i, _)| *i)
        .collect();
    assert_eq!(resets, (100..190).step_by(10).collect::<Vec<_>>());
    assert_eq!(events.last(), Some(&(190, Action::Escape)));
    assert_eq!(regimen.resets(), 10);
}

#[test]
fn test_noisy_loss_stops_at_iteration_limit() {
    let mut regimen = BasicRegimen::new(RegimenConfig {
        max_iterations: 200,
        ..RegimenConfig::default()
    });
    let events = run(&mut regimen, |i| if i % 2 == 0 { 0.0 } else { 4.0 });
    assert_eq!(events, vec![(200, Action::Stop)]);
}

#[test]
fn test_reset_forgets_history() {
    let mut regimen = BasicRegimen::default();
    run(&mut regimen, |_| 2.0);
    regimen.reset();
    assert_eq!(regimen.resets(), 0);
    assert_eq!(regimen.variance(), 0.0);

    let events = run(&mut regimen, |_| LN_2);
    assert_eq!(events, vec![(100, Action::Stop)]);
}

#[test]
fn test_band_is_configurable() {
    let mut regimen = BasicRegimen::new(RegimenConfig {
        min_loss: 1.5,
        max_loss: 2.5,
        ..RegimenConfig::default()
    });
    let events = run(&mut regimen, |_| 2.0);
    assert_eq!(events, vec![(100, Action::Stop)]);
}

#[test]
fn test_config_reads_partial_json() {
    let config: RegimenConfig =
        serde_json::from_str(r#"{"batch": 32, "max_resets": 3}"#).unwrap();
    assert_eq!(config.batch, 32);
    assert_eq!(config.max_resets, 3);
    assert_eq!(config.max_iterations, 1000);

    let schedule = BasicRegimen::new(config).schedule();
    assert_eq!(schedule.d_batch(), 32);
    assert_eq!(schedule.g_batch(), 32);
}
