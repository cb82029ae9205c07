//! # Core - Shape-Safe Tabular Tensors
//!
//! This crate provides the foundation every pipeline stage relies on:
//!
//! - **Shapes**: `Dim` axis lengths and `rows × cols` shapes
//! - **Indices**: bounds-checked column and row positions
//! - **Matrices**: tensors whose declared shape is verified on every operation
//! - **Parameters**: learnable matrices with explicit gradient buffers
//! - **Errors**: configuration and shape failures
//!
//! ## Design Philosophy
//!
//! Tabular GAN pipelines nest dozens of per-column transforms. A width that
//! is off by one deep inside a composition would otherwise surface as a
//! silent broadcast. Here it fails at construction with the expected and
//! actual shapes.

pub mod error;
pub mod index;
pub mod matrix;
pub mod param;
pub mod shape;

// Re-export key types at crate root for convenience
pub use candle_core::Device;
pub use error::CoreError;
pub use index::Index;
pub use matrix::{Axis, Matrix};
pub use param::{Gradients, Parameter};
pub use shape::{Dim, Shape};
