//! Column routing for combinators.
//!
//! A back-map is the list of `(offset, size)` slices a combinator computes
//! once from its children's declared widths. It is used only to hand each
//! child its own columns of a parent matrix.

use tabgan_core::{Dim, Index, Matrix};

use crate::error::{check_dim, StageError};

#[derive(Debug, Clone)]
pub struct BackMap {
    slices: Vec<Index>,
    total: Dim,
}

impl BackMap {
    /// Lay the widths end to end; they must add up to `total`.
    pub fn new(
        what: &'static str,
        widths: impl IntoIterator<Item = Dim>,
        total: Dim,
    ) -> Result<Self, StageError> {
        let widths: Vec<Dim> = widths.into_iter().collect();
        check_dim(what, total, widths.iter().copied().sum())?;
        let mut offset = 0;
        let mut slices = Vec::with_capacity(widths.len());
        for width in widths {
            slices.push(Index::slice(offset, width.get(), total.get())?);
            offset += width.get();
        }
        Ok(Self { slices, total })
    }

    pub fn total(&self) -> Dim {
        self.total
    }

    pub fn slices(&self) -> &[Index] {
        &self.slices
    }

    /// The columns of `data` belonging to child `i`.
    pub fn route(&self, data: &Matrix, i: usize) -> Result<Matrix, StageError> {
        let slice = self
            .slices
            .get(i)
            .ok_or_else(|| StageError::config(format!("no child {i} in back-map")))?;
        data.expect_cols(self.total)?;
        Ok(data.columns(slice)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabgan_core::Device;

    #[test]
    fn test_route_slices() {
        let map = BackMap::new("test", [Dim::new(1), Dim::new(2)], Dim::new(3)).unwrap();
        let data = Matrix::from_rows(&[vec![1.0, 2.0, 3.0]], 3, &Device::Cpu).unwrap();
        assert_eq!(map.route(&data, 1).unwrap().to_rows().unwrap(), vec![vec![2.0, 3.0]]);
        assert!(map.route(&data, 2).is_err());
    }

    #[test]
    fn test_widths_must_sum() {
        let err = BackMap::new("test", [Dim::new(3), Dim::new(4)], Dim::new(8)).unwrap_err();
        assert!(matches!(err, StageError::DimensionMismatch { .. }));
    }
}
