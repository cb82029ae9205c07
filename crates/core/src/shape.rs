//! # Shapes - Dimensions as Types
//!
//! Every matrix in a pipeline carries a declared `rows × cols` shape, and
//! every stage declares the widths it consumes and produces. Those widths
//! are [`Dim`] values: fixed at construction and never silently coerced.
//!
//! ## Design Choices
//!
//! Stage widths depend on data (number of categories, embedding sizes), so
//! dimensions are checked at runtime through the [`Dim`] newtype. The empty
//! and unit axes are spelled [`Dim::ZERO`] and [`Dim::ONE`].

use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// The length of one tensor axis.
///
/// Two `Dim`s compare equal only when their values do. Arithmetic is limited
/// to addition, which is what concatenation needs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Dim(usize);

impl Dim {
    /// An empty axis.
    pub const ZERO: Dim = Dim(0);
    /// A unit axis (labels, scalars).
    pub const ONE: Dim = Dim(1);

    pub const fn new(size: usize) -> Self {
        Self(size)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<usize> for Dim {
    fn from(size: usize) -> Self {
        Self(size)
    }
}

impl From<Dim> for usize {
    fn from(dim: Dim) -> Self {
        dim.0
    }
}

impl Add for Dim {
    type Output = Dim;

    fn add(self, rhs: Dim) -> Dim {
        Dim(self.0 + rhs.0)
    }
}

impl Sum for Dim {
    fn sum<I: Iterator<Item = Dim>>(iter: I) -> Dim {
        iter.fold(Dim::ZERO, Add::add)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The declared shape of a matrix: `rows × cols`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub rows: Dim,
    pub cols: Dim,
}

impl Shape {
    pub fn new(rows: impl Into<Dim>, cols: impl Into<Dim>) -> Self {
        Self {
            rows: rows.into(),
            cols: cols.into(),
        }
    }

    /// The `1 × 1` shape of a scalar loss.
    pub const fn scalar() -> Self {
        Self {
            rows: Dim::ONE,
            cols: Dim::ONE,
        }
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.rows.get() * self.cols.get()
    }

    /// The shape with rows and columns swapped.
    pub fn transposed(&self) -> Self {
        Self {
            rows: self.cols,
            cols: self.rows,
        }
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows.get(), self.cols.get())
    }
}

impl From<(usize, usize)> for Shape {
    fn from((rows, cols): (usize, usize)) -> Self {
        Shape::new(rows, cols)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.rows, self.cols)
    }
}
