//! # Combinator Tests
//!
//! Joint and pooled combinators must refuse children whose widths do not
//! add up, and route columns to the right child when they do.

use tabgan_core::{Device, Dim, Index, Matrix};
use tabgan_stages::{
    BlockConditioner, Conditioner, DirectInterceptor, DirectLoader, EntropyPenalizer,
    Interceptor, JointConditioner, JointInterceptor, JointLoader, JointPenalizer, Loader,
    NoneConditioner, Penalizer, PooledConditioner, SoftmaxInterceptor, StageError,
    StaticPenalizer, SubsetInterceptor,
};

fn m(rows: &[Vec<f32>]) -> Matrix {
    Matrix::from_rows(rows, rows[0].len(), &Device::Cpu).unwrap()
}

// ============================================================================
// Width Checks
// ============================================================================

#[test]
fn test_joint_conditioner_three_plus_four_is_not_eight() {
    let children: Vec<Box<dyn Conditioner>> = vec![
        Box::new(BlockConditioner::new(3, 3, &[(0, 3)], 1).unwrap()),
        Box::new(BlockConditioner::new(4, 4, &[(0, 4)], 1).unwrap()),
    ];
    let err = JointConditioner::new(8, 7, children).err().unwrap();
    assert_eq!(
        err.to_string(),
        "Dimension mismatch in joint conditioner conditions: expected 8, got 7"
    );
}

#[test]
fn test_joint_interceptor_three_plus_four_is_not_eight() {
    let children: Vec<Box<dyn Interceptor>> = vec![
        Box::new(DirectInterceptor::new(0, 3)),
        Box::new(DirectInterceptor::new(0, 4)),
    ];
    assert!(matches!(
        JointInterceptor::new(0, 8, 7, children),
        Err(StageError::DimensionMismatch { expected, got, .. })
            if expected == Dim::new(8) && got == Dim::new(7)
    ));
}

#[test]
fn test_joint_penalizer_three_plus_four_is_not_eight() {
    let children: Vec<Box<dyn Penalizer>> = vec![
        Box::new(StaticPenalizer::new(3, 3)),
        Box::new(StaticPenalizer::new(4, 4)),
    ];
    assert!(JointPenalizer::new(8, 7, children).is_err());
}

#[test]
fn test_joint_loader_three_plus_four_is_not_eight() {
    let children: Vec<Box<dyn Loader>> = vec![
        Box::new(DirectLoader::identity(3)),
        Box::new(DirectLoader::identity(4)),
    ];
    assert!(JointLoader::new(7, 8, children).is_err());
}

#[test]
fn test_pooled_conditioner_needs_shared_outputs() {
    let children: Vec<Box<dyn Conditioner>> = vec![
        Box::new(NoneConditioner::new(3)),
        Box::new(NoneConditioner::new(4)),
    ];
    assert!(PooledConditioner::new(0, 3, children).is_err());
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn test_joint_conditioner_routes_blocks() {
    let children: Vec<Box<dyn Conditioner>> = vec![
        Box::new(NoneConditioner::new(1)),
        Box::new(BlockConditioner::new(2, 2, &[(0, 2)], 1).unwrap().seeded(3)),
    ];
    let mut joint = JointConditioner::new(2, 3, children).unwrap();
    let cond = joint
        .condition(&m(&[vec![9.0, 0.0, 1.0], vec![9.0, 1.0, 0.0]]))
        .unwrap();
    // With a single block and one pick, every row reveals its block.
    assert_eq!(
        cond.to_rows().unwrap(),
        vec![vec![0.0, 1.0], vec![1.0, 0.0]]
    );
}

#[test]
fn test_joint_of_joint_interceptors() {
    let inner: Vec<Box<dyn Interceptor>> = vec![
        Box::new(SoftmaxInterceptor::new(0, 2, 2, &[(0, 2)]).unwrap()),
        Box::new(DirectInterceptor::new(0, 1)),
    ];
    let outer: Vec<Box<dyn Interceptor>> = vec![
        Box::new(JointInterceptor::new(0, 3, 3, inner).unwrap()),
        Box::new(DirectInterceptor::new(0, 2)),
    ];
    let joint = JointInterceptor::new(0, 5, 5, outer).unwrap();
    let out = joint
        .prepare(
            &Matrix::zeros((1, 0), &Device::Cpu).unwrap(),
            &m(&[vec![1.0, 1.0, 4.0, 5.0, 6.0]]),
        )
        .unwrap();
    assert_eq!(out.to_rows().unwrap(), vec![vec![0.5, 0.5, 4.0, 5.0, 6.0]]);
}

#[test]
fn test_joint_penalizer_routes_condition_blocks() {
    let children: Vec<Box<dyn Penalizer>> = vec![
        Box::new(StaticPenalizer::new(0, 1)),
        Box::new(EntropyPenalizer::new(2, 2, &[(0, 0, 2)]).unwrap()),
    ];
    let joint = JointPenalizer::new(2, 3, children).unwrap();
    // Condition reveals category 0 and the logits agree strongly.
    let loss = joint
        .loss(&m(&[vec![1.0, 0.0]]), &m(&[vec![0.0, 20.0, -20.0]]))
        .unwrap()
        .scalar()
        .unwrap();
    assert!(loss < 1e-6);
}

#[test]
fn test_joint_subset_reads_its_own_range() {
    let children: Vec<Box<dyn Interceptor>> = vec![
        Box::new(DirectInterceptor::new(0, 1)),
        Box::new(SubsetInterceptor::new(0, Index::new(vec![1, 3], 4).unwrap())),
    ];
    let joint = JointInterceptor::new(0, 5, 3, children).unwrap();
    let out = joint
        .prepare(
            &Matrix::zeros((1, 0), &Device::Cpu).unwrap(),
            &m(&[vec![9.0, 0.0, 1.0, 2.0, 3.0]]),
        )
        .unwrap();
    assert_eq!(out.to_rows().unwrap(), vec![vec![9.0, 1.0, 3.0]]);
}
