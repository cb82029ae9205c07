//! # Loader Tests
//!
//! Deterministic encodings must decode back to what was loaded.

use approx::assert_abs_diff_eq;
use proptest::prelude::*;
use tabgan_core::{Device, Dim, Index, Matrix};
use tabgan_stages::{
    Loader, OneHotLoader, PooledLoader, PositionalLoader, SimpleEffectLoader, StandardizeLoader,
};

fn m(rows: &[Vec<f32>], cols: usize) -> Matrix {
    Matrix::from_rows(rows, cols, &Device::Cpu).unwrap()
}

// ============================================================================
// Round Trips
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_standardize_unload_inverts_load(
        rows in prop::collection::vec(prop::collection::vec(-100.0f32..100.0, 3), 2..20),
    ) {
        let data = m(&rows, 3);
        let loader = StandardizeLoader::new(Index::range(3), &data).unwrap();
        let back = loader.unload(&loader.load(&data).unwrap()).unwrap().to_rows().unwrap();
        for (row, original) in back.iter().zip(&rows) {
            for (v, o) in row.iter().zip(original) {
                prop_assert!((v - o).abs() <= 1e-3 * (1.0 + o.abs()));
            }
        }
    }

    #[test]
    fn prop_one_hot_unload_inverts_load(
        values in prop::collection::vec((0u8..4, 0u8..2), 1..30),
    ) {
        let rows: Vec<Vec<f32>> = values.iter().map(|&(a, b)| vec![b as f32, a as f32]).collect();
        let loader = OneHotLoader::new(2, &[(1, 4), (0, 2)]).unwrap();
        let data = loader.load(&m(&rows, 2)).unwrap();
        prop_assert_eq!(data.cols(), Dim::new(6));

        let back = loader.unload(&data).unwrap().to_rows().unwrap();
        for (row, &(a, b)) in back.iter().zip(&values) {
            prop_assert_eq!(row.clone(), vec![a as f32, b as f32]);
        }
    }
}

#[test]
fn test_positional_recovers_every_ordinal() {
    let max = 40;
    let loader = PositionalLoader::new(1, 0, 16, max).unwrap();
    let rows: Vec<Vec<f32>> = (0..=max).map(|v| vec![v as f32]).collect();
    let back = loader.unload(&loader.load(&m(&rows, 1)).unwrap()).unwrap();
    assert_eq!(back.to_rows().unwrap(), rows);
}

#[test]
fn test_positional_rejects_bad_width() {
    assert!(PositionalLoader::new(1, 0, 2, 10).is_err());
    assert!(PositionalLoader::new(1, 0, 12, 10).is_err());
}

#[test]
fn test_standardized_columns_are_centered() {
    let data = m(&[vec![1.0, 10.0], vec![2.0, 10.0], vec![3.0, 10.0]], 2);
    let loader = StandardizeLoader::new(Index::range(2), &data).unwrap();
    let loaded = loader.load(&data).unwrap().to_rows().unwrap();
    assert_abs_diff_eq!(loaded[0][0], -1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(loaded[2][0], 1.0, epsilon = 1e-6);
    // Constant column keeps a unit divisor.
    assert_abs_diff_eq!(loaded[1][1], 0.0, epsilon = 1e-6);
}

// ============================================================================
// Effects in a Pool
// ============================================================================

#[test]
fn test_effect_in_pool_keeps_widths() {
    let effect = SimpleEffectLoader::new(2, 8, (1, 3)).unwrap();
    let children: Vec<Box<dyn Loader>> = vec![
        Box::new(OneHotLoader::new(2, &[(0, 2)]).unwrap()),
        Box::new(effect),
    ];
    let pooled = PooledLoader::new(2, 10, children).unwrap();
    let rows = vec![vec![1.0, 2.0], vec![0.0, 0.0], vec![1.0, 1.0]];
    let data = pooled.load(&m(&rows, 2)).unwrap();
    assert_eq!(data.shape().dims(), (3, 10));
    assert_eq!(pooled.decoded(), Dim::new(2));
    assert_eq!(pooled.unload(&data).unwrap().cols(), Dim::new(2));
}
