//! # Stages - Composable Column Transforms
//!
//! Each column group of a table is handled by five small stages:
//!
//! - **Conditioner**: encoded data → conditioning vector for the generator
//! - **Interceptor**: generator intermediate → discriminable data
//! - **Penalizer**: auxiliary generator loss from (condition, intermediate)
//! - **Loader**: raw columns ⇄ encoded data
//! - **Sampler**: raw training batches and a fixed holdout
//!
//! Every stage declares its widths once at construction. Joint combinators
//! give each child its own consecutive column range, pooled combinators give
//! every child the same input; both refuse to build when the children's
//! widths do not add up.
//!
//! ## Example: Two Columns
//!
//! ```rust
//! use tabgan_core::{Device, Matrix};
//! use tabgan_stages::{Connector, Pipeline, RandomSampler, SamplerConfig};
//!
//! // Column 0 is continuous, column 1 a category with 3 levels.
//! let rows: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32, (i % 3) as f32]).collect();
//! let data = Matrix::from_rows(&rows, 2, &Device::Cpu).unwrap();
//!
//! let parts = vec![
//!     Pipeline::standardize(2, &[0], &data).unwrap(),
//!     Pipeline::category(2, (1, 3)).unwrap(),
//! ];
//! let sampler = RandomSampler::new(&data, &SamplerConfig::default()).unwrap();
//! let mut connector = Connector::joint(Box::new(sampler), 3, 4, 4, parts).unwrap();
//!
//! let batch = connector.sample(8).unwrap();
//! assert_eq!(batch.shape().dims(), (8, 4));
//! ```

pub mod backmap;
pub mod conditioner;
pub mod connector;
pub mod error;
pub mod interceptor;
pub mod loader;
pub mod penalizer;
pub mod pipeline;
pub mod sampler;

// Re-export key types at crate root for convenience
pub use backmap::BackMap;
pub use conditioner::{
    BlockConditioner, Conditioner, JointConditioner, NoneConditioner, PooledConditioner,
};
pub use connector::Connector;
pub use error::{check_dim, StageError};
pub use interceptor::{
    DirectInterceptor, Interceptor, JointInterceptor, PooledInterceptor, SoftmaxInterceptor,
    SubsetInterceptor,
};
pub use loader::{
    DirectLoader, EffectLoader, GroupedEffectLoader, JointLoader, Loader, NestedEffectLoader,
    OneHotLoader, PooledLoader, PositionalLoader, SimpleEffectLoader, StandardizeLoader,
};
pub use penalizer::{
    EntropyPenalizer, JointPenalizer, Penalizer, PooledPenalizer, StaticPenalizer,
};
pub use pipeline::Pipeline;
pub use sampler::{IteratingSampler, RandomSampler, Sampler, SamplerConfig};
