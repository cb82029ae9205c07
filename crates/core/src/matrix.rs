//! # Matrix - Shape-Checked Tensors
//!
//! A [`Matrix`] is a rank-2 `candle_core::Tensor` paired with its declared
//! [`Shape`]. Every constructor, and every operation that produces a new
//! matrix, compares the declared shape with the buffer's physical shape and
//! fails with [`CoreError::ShapeMismatch`] when they disagree.
//!
//! ## Operations
//!
//! | Group | Operations |
//! |-------|------------|
//! | Construction | `load`, `new`, `zeros`, `ones`, `full`, `cell`, `randn`, `arange`, `from_rows` |
//! | Layout | `cat`, `columns`, `rows`, `transpose` |
//! | Arithmetic | `add`, `sub`, `mul`, `div`, `affine`, `matmul`, `sums` |
//! | Reduction | `sum`, `mean`, `std`, `argmax` (all keep the reduced axis) |
//! | Elementwise | `softmax`, `log_softmax`, `clamp`, `sin`, `cos`, `sqrt`, `exp`, `log`, `abs`, `relu` |
//! | Encoding | `one_hot`, `cross_entropy` |
//!
//! Arithmetic broadcasts along unit axes only: an `N×C` matrix combines with
//! `N×C`, `1×C`, `N×1` or `1×1`.

use candle_core::{DType, Device, Tensor, D};

use crate::error::CoreError;
use crate::param::Gradients;
use crate::shape::{Dim, Shape};
use crate::Index;

/// The axis an operation concatenates along or reduces over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Stack vertically / reduce each column to one row.
    Rows,
    /// Join side by side / reduce each row to one column.
    Cols,
}

impl Axis {
    fn dim(self) -> usize {
        match self {
            Axis::Rows => 0,
            Axis::Cols => 1,
        }
    }

    /// Length of `shape` along this axis.
    fn along(self, shape: Shape) -> Dim {
        match self {
            Axis::Rows => shape.rows,
            Axis::Cols => shape.cols,
        }
    }

    /// Length of `shape` along the other axis.
    fn across(self, shape: Shape) -> Dim {
        match self {
            Axis::Rows => shape.cols,
            Axis::Cols => shape.rows,
        }
    }

    fn shape(self, along: Dim, across: Dim) -> Shape {
        match self {
            Axis::Rows => Shape::new(along, across),
            Axis::Cols => Shape::new(across, along),
        }
    }
}

/// A rank-2 f32 tensor with a verified shape.
#[derive(Debug, Clone)]
pub struct Matrix {
    tensor: Tensor,
    shape: Shape,
}

impl Matrix {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Wrap a tensor, asserting it has the declared shape.
    pub fn new(tensor: Tensor, shape: impl Into<Shape>) -> Result<Self, CoreError> {
        let shape = shape.into();
        let dims = tensor.dims();
        if dims.len() != 2 {
            return Err(CoreError::config(format!(
                "expected a rank-2 tensor of shape {shape}, got dims {dims:?}"
            )));
        }
        let got = Shape::new(dims[0], dims[1]);
        if got != shape {
            return Err(CoreError::ShapeMismatch {
                expected: shape,
                got,
            });
        }
        let tensor = if tensor.dtype() == DType::F32 {
            tensor
        } else {
            tensor.to_dtype(DType::F32)?
        };
        Ok(Self { tensor, shape })
    }

    /// Load row-major values into a matrix of the given shape.
    pub fn load(data: Vec<f32>, shape: impl Into<Shape>, device: &Device) -> Result<Self, CoreError> {
        let shape = shape.into();
        if data.len() != shape.numel() {
            return Err(CoreError::ShapeMismatch {
                expected: shape,
                got: Shape::new(data.len(), 1),
            });
        }
        let tensor = Tensor::from_vec(data, shape.dims(), device)?;
        Self::new(tensor, shape)
    }

    /// Build from rows of equal length; `cols` is needed when there are no rows.
    pub fn from_rows(rows: &[Vec<f32>], cols: usize, device: &Device) -> Result<Self, CoreError> {
        if let Some(bad) = rows.iter().find(|r| r.len() != cols) {
            return Err(CoreError::ShapeMismatch {
                expected: Shape::new(rows.len(), cols),
                got: Shape::new(rows.len(), bad.len()),
            });
        }
        let data = rows.iter().flatten().copied().collect();
        Self::load(data, (rows.len(), cols), device)
    }

    pub fn zeros(shape: impl Into<Shape>, device: &Device) -> Result<Self, CoreError> {
        let shape = shape.into();
        Self::new(Tensor::zeros(shape.dims(), DType::F32, device)?, shape)
    }

    pub fn ones(shape: impl Into<Shape>, device: &Device) -> Result<Self, CoreError> {
        let shape = shape.into();
        Self::new(Tensor::ones(shape.dims(), DType::F32, device)?, shape)
    }

    pub fn full(value: f32, shape: impl Into<Shape>, device: &Device) -> Result<Self, CoreError> {
        let shape = shape.into();
        Self::load(vec![value; shape.numel()], shape, device)
    }

    /// A `1 × 1` matrix.
    pub fn cell(value: f32, device: &Device) -> Result<Self, CoreError> {
        Self::load(vec![value], Shape::scalar(), device)
    }

    /// Standard normal entries.
    pub fn randn(shape: impl Into<Shape>, device: &Device) -> Result<Self, CoreError> {
        let shape = shape.into();
        if shape.numel() == 0 {
            return Self::zeros(shape, device);
        }
        Self::new(Tensor::randn(0f32, 1f32, shape.dims(), device)?, shape)
    }

    /// The column `[0, 1, ..., n - 1]ᵀ`.
    pub fn arange(n: usize, device: &Device) -> Result<Self, CoreError> {
        Self::load((0..n).map(|i| i as f32).collect(), (n, 1), device)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn rows(&self) -> Dim {
        self.shape.rows
    }

    pub fn cols(&self) -> Dim {
        self.shape.cols
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn into_tensor(self) -> Tensor {
        self.tensor
    }

    pub fn device(&self) -> &Device {
        self.tensor.device()
    }

    /// Fail unless this matrix has the given shape.
    pub fn expect_shape(&self, expected: impl Into<Shape>) -> Result<(), CoreError> {
        let expected = expected.into();
        if self.shape != expected {
            return Err(CoreError::ShapeMismatch {
                expected,
                got: self.shape,
            });
        }
        Ok(())
    }

    /// Fail unless this matrix has exactly `cols` columns.
    pub fn expect_cols(&self, cols: Dim) -> Result<(), CoreError> {
        self.expect_shape(Shape {
            rows: self.shape.rows,
            cols,
        })
    }

    /// The value of a `1 × 1` matrix.
    pub fn scalar(&self) -> Result<f32, CoreError> {
        self.expect_shape(Shape::scalar())?;
        let values = self.tensor.flatten_all()?.to_vec1::<f32>()?;
        Ok(values[0])
    }

    /// Copy out as row vectors.
    pub fn to_rows(&self) -> Result<Vec<Vec<f32>>, CoreError> {
        if self.shape.numel() == 0 {
            return Ok(vec![Vec::new(); self.shape.rows.get()]);
        }
        Ok(self.tensor.to_vec2::<f32>()?)
    }

    // ========================================================================
    // Layout
    // ========================================================================

    /// Concatenate along `axis`, asserting the result has `shape`.
    ///
    /// The parts must add up to `shape` along `axis` and match it across.
    /// Parts that are empty along the concatenated axis are skipped.
    pub fn cat(parts: &[&Matrix], axis: Axis, shape: impl Into<Shape>) -> Result<Self, CoreError> {
        let shape = shape.into();
        let across = axis.across(shape);
        let mut along = Dim::ZERO;
        for part in parts {
            if axis.across(part.shape) != across {
                return Err(CoreError::ShapeMismatch {
                    expected: shape,
                    got: axis.shape(axis.along(part.shape), axis.across(part.shape)),
                });
            }
            along = along + axis.along(part.shape);
        }
        let got = axis.shape(along, across);
        if got != shape {
            return Err(CoreError::ShapeMismatch {
                expected: shape,
                got,
            });
        }

        let kept: Vec<&Tensor> = parts
            .iter()
            .filter(|m| !axis.along(m.shape).is_zero())
            .map(|m| &m.tensor)
            .collect();
        match kept.as_slice() {
            [] => {
                let device = parts
                    .first()
                    .map(|m| m.device().clone())
                    .unwrap_or(Device::Cpu);
                Self::zeros(shape, &device)
            }
            [single] => Self::new((*single).clone(), shape),
            _ => Self::new(Tensor::cat(&kept, axis.dim())?, shape),
        }
    }

    /// Gather columns by position. The result has `index.dim()` columns.
    pub fn columns(&self, index: &Index) -> Result<Self, CoreError> {
        self.gather(index, Axis::Cols)
    }

    /// Gather rows by position. The result has `index.dim()` rows.
    pub fn rows_at(&self, index: &Index) -> Result<Self, CoreError> {
        self.gather(index, Axis::Rows)
    }

    fn gather(&self, index: &Index, axis: Axis) -> Result<Self, CoreError> {
        let (space, shape) = match axis {
            Axis::Rows => (self.shape.rows, Shape { rows: index.dim(), cols: self.shape.cols }),
            Axis::Cols => (self.shape.cols, Shape { rows: self.shape.rows, cols: index.dim() }),
        };
        if index.cap() != space {
            return Err(CoreError::config(format!(
                "index over {} positions applied to an axis of {space}",
                index.cap()
            )));
        }
        if index.is_empty() {
            return Self::zeros(shape, self.device());
        }
        let tensor = match index.as_span() {
            Some((offset, size)) => self.tensor.narrow(axis.dim(), offset, size)?.contiguous()?,
            None => {
                let ids: Vec<u32> = index.iter().map(|p| p as u32).collect();
                let ids = Tensor::from_vec(ids, index.len(), self.device())?;
                self.tensor.index_select(&ids, axis.dim())?
            }
        };
        Self::new(tensor, shape)
    }

    pub fn transpose(&self) -> Result<Self, CoreError> {
        Self::new(self.tensor.t()?.contiguous()?, self.shape.transposed())
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    fn broadcast_shape(&self, other: &Matrix) -> Result<Shape, CoreError> {
        fn axis(a: Dim, b: Dim) -> Option<Dim> {
            if a == b || b == Dim::ONE {
                Some(a)
            } else if a == Dim::ONE {
                Some(b)
            } else {
                None
            }
        }
        match (
            axis(self.shape.rows, other.shape.rows),
            axis(self.shape.cols, other.shape.cols),
        ) {
            (Some(rows), Some(cols)) => Ok(Shape { rows, cols }),
            _ => Err(CoreError::ShapeMismatch {
                expected: self.shape,
                got: other.shape,
            }),
        }
    }

    pub fn add(&self, other: &Matrix) -> Result<Self, CoreError> {
        let shape = self.broadcast_shape(other)?;
        Self::new(self.tensor.broadcast_add(&other.tensor)?, shape)
    }

    pub fn sub(&self, other: &Matrix) -> Result<Self, CoreError> {
        let shape = self.broadcast_shape(other)?;
        Self::new(self.tensor.broadcast_sub(&other.tensor)?, shape)
    }

    pub fn mul(&self, other: &Matrix) -> Result<Self, CoreError> {
        let shape = self.broadcast_shape(other)?;
        Self::new(self.tensor.broadcast_mul(&other.tensor)?, shape)
    }

    pub fn div(&self, other: &Matrix) -> Result<Self, CoreError> {
        let shape = self.broadcast_shape(other)?;
        Self::new(self.tensor.broadcast_div(&other.tensor)?, shape)
    }

    /// `self * mul + add`, elementwise.
    pub fn affine(&self, mul: f64, add: f64) -> Result<Self, CoreError> {
        Self::new(self.tensor.affine(mul, add)?, self.shape)
    }

    /// Matrix product `[r, k] @ [k, c] -> [r, c]`.
    pub fn matmul(&self, rhs: &Matrix) -> Result<Self, CoreError> {
        if self.shape.cols != rhs.shape.rows {
            return Err(CoreError::ShapeMismatch {
                expected: Shape {
                    rows: self.shape.cols,
                    cols: rhs.shape.cols,
                },
                got: rhs.shape,
            });
        }
        let shape = Shape {
            rows: self.shape.rows,
            cols: rhs.shape.cols,
        };
        if self.shape.numel() == 0 || rhs.shape.numel() == 0 {
            return Self::zeros(shape, self.device());
        }
        let tensor = self
            .tensor
            .contiguous()?
            .matmul(&rhs.tensor.contiguous()?)?;
        Self::new(tensor, shape)
    }

    /// Elementwise sum of same-shape matrices.
    pub fn sums(parts: &[Matrix]) -> Result<Self, CoreError> {
        let (first, rest) = parts
            .split_first()
            .ok_or_else(|| CoreError::config("cannot sum an empty list of matrices"))?;
        rest.iter().try_fold(first.clone(), |acc, m| {
            m.expect_shape(first.shape)?;
            acc.add(m)
        })
    }

    // ========================================================================
    // Reduction
    // ========================================================================

    fn reduced(&self, axis: Axis) -> Shape {
        match axis {
            Axis::Rows => Shape {
                rows: Dim::ONE,
                cols: self.shape.cols,
            },
            Axis::Cols => Shape {
                rows: self.shape.rows,
                cols: Dim::ONE,
            },
        }
    }

    /// Sum over `axis`, keeping it with length one.
    pub fn sum(&self, axis: Axis) -> Result<Self, CoreError> {
        let shape = self.reduced(axis);
        if self.shape.numel() == 0 {
            return Self::zeros(shape, self.device());
        }
        Self::new(self.tensor.sum_keepdim(axis.dim())?, shape)
    }

    /// Sum of every element as a `1 × 1` matrix.
    pub fn sum_all(&self) -> Result<Self, CoreError> {
        self.sum(Axis::Rows)?.sum(Axis::Cols)
    }

    pub fn mean(&self, axis: Axis) -> Result<Self, CoreError> {
        Self::new(self.tensor.mean_keepdim(axis.dim())?, self.reduced(axis))
    }

    /// Unbiased standard deviation over `axis`.
    pub fn std(&self, axis: Axis) -> Result<Self, CoreError> {
        let var = self.tensor.var_keepdim(axis.dim())?;
        Self::new(var.sqrt()?, self.reduced(axis))
    }

    /// Position of the maximum over `axis`, as f32.
    pub fn argmax(&self, axis: Axis) -> Result<Self, CoreError> {
        let idx = self.tensor.argmax_keepdim(axis.dim())?;
        Self::new(idx.to_dtype(DType::F32)?, self.reduced(axis))
    }

    // ========================================================================
    // Elementwise
    // ========================================================================

    /// Softmax across each row.
    pub fn softmax(&self) -> Result<Self, CoreError> {
        Self::new(candle_nn::ops::softmax(&self.tensor, D::Minus1)?, self.shape)
    }

    /// Log-softmax across each row.
    pub fn log_softmax(&self) -> Result<Self, CoreError> {
        Self::new(candle_nn::ops::log_softmax(&self.tensor, D::Minus1)?, self.shape)
    }

    pub fn clamp(&self, min: f32, max: f32) -> Result<Self, CoreError> {
        Self::new(self.tensor.clamp(min, max)?, self.shape)
    }

    pub fn sin(&self) -> Result<Self, CoreError> {
        Self::new(self.tensor.sin()?, self.shape)
    }

    pub fn cos(&self) -> Result<Self, CoreError> {
        Self::new(self.tensor.cos()?, self.shape)
    }

    pub fn sqrt(&self) -> Result<Self, CoreError> {
        Self::new(self.tensor.sqrt()?, self.shape)
    }

    pub fn exp(&self) -> Result<Self, CoreError> {
        Self::new(self.tensor.exp()?, self.shape)
    }

    pub fn log(&self) -> Result<Self, CoreError> {
        Self::new(self.tensor.log()?, self.shape)
    }

    pub fn abs(&self) -> Result<Self, CoreError> {
        Self::new(self.tensor.abs()?, self.shape)
    }

    pub fn relu(&self) -> Result<Self, CoreError> {
        Self::new(self.tensor.relu()?, self.shape)
    }

    /// A copy cut off from the gradient graph.
    pub fn detach(&self) -> Self {
        Self {
            tensor: self.tensor.detach(),
            shape: self.shape,
        }
    }

    pub fn move_to(&self, device: &Device) -> Result<Self, CoreError> {
        Self::new(self.tensor.to_device(device)?, self.shape)
    }

    /// Backpropagate from this `1 × 1` loss.
    pub fn backward(&self) -> Result<Gradients, CoreError> {
        self.expect_shape(Shape::scalar())?;
        Ok(Gradients::from(self.tensor.backward()?))
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// One-hot encode an `N × 1` column of category numbers into `N × bins`.
    pub fn one_hot(categories: &Matrix, bins: usize) -> Result<Self, CoreError> {
        categories.expect_cols(Dim::ONE)?;
        let n = categories.shape.rows.get();
        let mut data = vec![0f32; n * bins];
        for (row, values) in categories.to_rows()?.into_iter().enumerate() {
            let value = values[0];
            if value < 0.0 || value.fract() != 0.0 || value as usize >= bins {
                return Err(CoreError::CategoryOutOfRange { value, bins });
            }
            data[row * bins + value as usize] = 1.0;
        }
        Self::load(data, (n, bins), categories.device())
    }

    /// Per-row cross entropy of `logits` against `N × 1` class targets.
    pub fn cross_entropy(logits: &Matrix, targets: &Matrix) -> Result<Self, CoreError> {
        targets.expect_shape((logits.shape.rows.get(), 1))?;
        let expected = Self::one_hot(targets, logits.shape.cols.get())?;
        expected
            .mul(&logits.log_softmax()?)?
            .sum(Axis::Cols)?
            .affine(-1.0, 0.0)
    }
}
