//! # Index - Bounds-Checked Positions
//!
//! An [`Index`] is an ordered list of positions into a space of `cap`
//! columns (or rows). Every position satisfies `0 <= pos < cap`, checked
//! once at construction. Indices are never mutated afterwards.
//!
//! Contiguous ranges are stored as an `(offset, size)` descriptor, so
//! `slice` and `at` cost O(1) regardless of size. Random constructors
//! (`sample`, `randperm`, `partition`) take the caller's RNG so that runs
//! are reproducible from a seed.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::CoreError;
use crate::shape::Dim;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Positions {
    Span { offset: usize, size: usize },
    List(Vec<usize>),
}

/// An ordered sequence of positions below a capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    positions: Positions,
    cap: usize,
}

impl Index {
    /// Build an index from explicit positions, checking each against `cap`.
    pub fn new(positions: Vec<usize>, cap: usize) -> Result<Self, CoreError> {
        if let Some(&index) = positions.iter().find(|&&p| p >= cap) {
            return Err(CoreError::IndexOutOfBounds { index, cap });
        }
        Ok(Self {
            positions: Positions::List(positions),
            cap,
        })
    }

    /// Alias of [`Index::new`] for positions read from configuration.
    pub fn load(positions: &[usize], cap: usize) -> Result<Self, CoreError> {
        Self::new(positions.to_vec(), cap)
    }

    /// `[0, size)` over a space of exactly `size`.
    pub fn range(size: usize) -> Self {
        Self {
            positions: Positions::Span { offset: 0, size },
            cap: size,
        }
    }

    /// `[offset, offset + size)` over a space of `cap`.
    pub fn slice(offset: usize, size: usize, cap: usize) -> Result<Self, CoreError> {
        if offset + size > cap {
            return Err(CoreError::IndexOutOfBounds {
                index: offset + size - 1,
                cap,
            });
        }
        Ok(Self {
            positions: Positions::Span { offset, size },
            cap,
        })
    }

    /// The single position `pos`.
    pub fn at(pos: usize, cap: usize) -> Result<Self, CoreError> {
        Self::slice(pos, 1, cap)
    }

    /// No positions at all.
    pub fn empty(cap: usize) -> Self {
        Self {
            positions: Positions::Span { offset: 0, size: 0 },
            cap,
        }
    }

    /// Draw `size` positions below `cap`.
    ///
    /// Without replacement `size` may not exceed `cap`.
    pub fn sample<R: Rng + ?Sized>(
        size: usize,
        cap: usize,
        replacement: bool,
        rng: &mut R,
    ) -> Result<Self, CoreError> {
        if size > 0 && cap == 0 {
            return Err(CoreError::config("cannot sample from an empty space"));
        }
        let positions = if replacement {
            (0..size).map(|_| rng.gen_range(0..cap)).collect()
        } else {
            if size > cap {
                return Err(CoreError::config(format!(
                    "cannot draw {size} distinct positions from {cap}"
                )));
            }
            rand::seq::index::sample(rng, cap, size).into_vec()
        };
        Ok(Self {
            positions: Positions::List(positions),
            cap,
        })
    }

    /// A random permutation of `[0, n)`.
    pub fn randperm<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self {
        let mut positions: Vec<usize> = (0..n).collect();
        positions.shuffle(rng);
        Self {
            positions: Positions::List(positions),
            cap: n,
        }
    }

    /// Split `[0, cap)` into `count` non-empty contiguous ranges at random
    /// cut points. The ranges are disjoint and cover the space exactly once.
    pub fn partition<R: Rng + ?Sized>(
        count: usize,
        cap: usize,
        rng: &mut R,
    ) -> Result<Vec<Self>, CoreError> {
        if count == 0 || count > cap {
            return Err(CoreError::InvalidPartition { count, cap });
        }
        let mut cuts: Vec<usize> = rand::seq::index::sample(rng, cap - 1, count - 1)
            .into_iter()
            .map(|c| c + 1)
            .collect();
        cuts.sort_unstable();
        cuts.push(cap);

        let mut start = 0;
        let mut parts = Vec::with_capacity(count);
        for end in cuts {
            parts.push(Self::slice(start, end - start, cap)?);
            start = end;
        }
        Ok(parts)
    }

    /// Fold every position modulo `cap`.
    pub fn wrap(&self, cap: usize) -> Result<Self, CoreError> {
        if cap == 0 {
            return Err(CoreError::config("cannot wrap into an empty space"));
        }
        if let Positions::Span { offset, size } = self.positions {
            if offset + size <= cap {
                return Ok(Self {
                    positions: Positions::Span { offset, size },
                    cap,
                });
            }
        }
        Ok(Self {
            positions: Positions::List(self.iter().map(|p| p % cap).collect()),
            cap,
        })
    }

    /// Number of positions.
    pub fn dim(&self) -> Dim {
        Dim::new(self.len())
    }

    /// Size of the indexed space.
    pub fn cap(&self) -> Dim {
        Dim::new(self.cap)
    }

    pub fn len(&self) -> usize {
        match &self.positions {
            Positions::Span { size, .. } => *size,
            Positions::List(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The contiguous `(offset, size)` form, if this index has one.
    pub fn as_span(&self) -> Option<(usize, usize)> {
        match self.positions {
            Positions::Span { offset, size } => Some((offset, size)),
            Positions::List(_) => None,
        }
    }

    pub fn get(&self, i: usize) -> Option<usize> {
        match &self.positions {
            Positions::Span { offset, size } => (i < *size).then_some(offset + i),
            Positions::List(list) => list.get(i).copied(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Materialize the positions.
    pub fn positions(&self) -> Vec<usize> {
        self.iter().collect()
    }

    /// Keep the first `n` positions.
    pub fn take(&self, n: usize) -> Self {
        let n = n.min(self.len());
        let positions = match &self.positions {
            Positions::Span { offset, .. } => Positions::Span {
                offset: *offset,
                size: n,
            },
            Positions::List(list) => Positions::List(list[..n].to_vec()),
        };
        Self {
            positions,
            cap: self.cap,
        }
    }

    /// Drop the first `n` positions.
    pub fn skip(&self, n: usize) -> Self {
        let n = n.min(self.len());
        let positions = match &self.positions {
            Positions::Span { offset, size } => Positions::Span {
                offset: offset + n,
                size: size - n,
            },
            Positions::List(list) => Positions::List(list[n..].to_vec()),
        };
        Self {
            positions,
            cap: self.cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_slice_is_descriptor() {
        let idx = Index::slice(2, 3, 6).unwrap();
        assert_eq!(idx.as_span(), Some((2, 3)));
        assert_eq!(idx.positions(), vec![2, 3, 4]);
        assert_eq!(idx.dim(), Dim::new(3));
        assert_eq!(idx.cap(), Dim::new(6));
    }

    #[test]
    fn test_slice_out_of_bounds() {
        let err = Index::slice(4, 3, 6).unwrap_err();
        assert!(matches!(err, CoreError::IndexOutOfBounds { index: 6, cap: 6 }));
        assert!(Index::at(6, 6).is_err());
    }

    #[test]
    fn test_new_rejects_position_at_cap() {
        assert!(Index::new(vec![0, 5], 5).is_err());
        assert_eq!(Index::new(vec![4, 0], 5).unwrap().positions(), vec![4, 0]);
    }

    #[test]
    fn test_wrap_folds_positions() {
        let idx = Index::slice(3, 4, 7).unwrap().wrap(5).unwrap();
        assert_eq!(idx.positions(), vec![3, 4, 0, 1]);
        assert_eq!(idx.cap(), Dim::new(5));
    }

    #[test]
    fn test_randperm_is_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut perm = Index::randperm(10, &mut rng).positions();
        perm.sort_unstable();
        assert_eq!(perm, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_sample_without_replacement_distinct() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut drawn = Index::sample(6, 6, false, &mut rng).unwrap().positions();
        drawn.sort_unstable();
        drawn.dedup();
        assert_eq!(drawn.len(), 6);
        assert!(Index::sample(7, 6, false, &mut rng).is_err());
    }

    #[test]
    fn test_take_skip() {
        let idx = Index::new(vec![5, 1, 3, 2], 6).unwrap();
        assert_eq!(idx.take(2).positions(), vec![5, 1]);
        assert_eq!(idx.skip(2).positions(), vec![3, 2]);
    }
}
