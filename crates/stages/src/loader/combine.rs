//! Loader combinators.

use tabgan_core::{Axis, Device, Dim, Gradients, Matrix};

use super::Loader;
use crate::backmap::BackMap;
use crate::error::{check_dim, StageError};

fn concat(parts: Vec<Matrix>, rows: Dim, cols: Dim) -> Result<Matrix, StageError> {
    let refs: Vec<&Matrix> = parts.iter().collect();
    Ok(Matrix::cat(&refs, Axis::Cols, (rows.get(), cols.get()))?)
}

/// Children read consecutive raw slices and write consecutive encoded slices.
pub struct JointLoader {
    children: Vec<Box<dyn Loader>>,
    samples: BackMap,
    outputs: BackMap,
    decoded: Dim,
}

impl JointLoader {
    pub fn new(
        samples: usize,
        outputs: usize,
        children: Vec<Box<dyn Loader>>,
    ) -> Result<Self, StageError> {
        let samples = BackMap::new(
            "joint loader samples",
            children.iter().map(|c| c.samples()),
            Dim::new(samples),
        )?;
        let outputs = BackMap::new(
            "joint loader outputs",
            children.iter().map(|c| c.outputs()),
            Dim::new(outputs),
        )?;
        let decoded = children.iter().map(|c| c.decoded()).sum();
        Ok(Self {
            children,
            samples,
            outputs,
            decoded,
        })
    }
}

impl Loader for JointLoader {
    fn samples(&self) -> Dim {
        self.samples.total()
    }

    fn outputs(&self) -> Dim {
        self.outputs.total()
    }

    fn decoded(&self) -> Dim {
        self.decoded
    }

    fn load(&self, raw: &Matrix) -> Result<Matrix, StageError> {
        let parts = self
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| child.load(&self.samples.route(raw, i)?))
            .collect::<Result<Vec<_>, _>>()?;
        concat(parts, raw.rows(), self.outputs())
    }

    fn unload(&self, data: &Matrix) -> Result<Matrix, StageError> {
        let parts = self
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| child.unload(&self.outputs.route(data, i)?))
            .collect::<Result<Vec<_>, _>>()?;
        concat(parts, data.rows(), self.decoded)
    }

    fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.accumulate(grads))
    }

    fn update(&mut self) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.update())
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.move_to(device))
    }
}

/// Every child reads the full raw row; encodings are laid end to end.
///
/// This is the usual way to combine column loaders, since each one already
/// addresses its raw column by absolute position.
pub struct PooledLoader {
    samples: Dim,
    children: Vec<Box<dyn Loader>>,
    outputs: BackMap,
    decoded: Dim,
}

impl PooledLoader {
    pub fn new(
        samples: usize,
        outputs: usize,
        children: Vec<Box<dyn Loader>>,
    ) -> Result<Self, StageError> {
        for child in &children {
            check_dim("pooled loader samples", Dim::new(samples), child.samples())?;
        }
        let outputs = BackMap::new(
            "pooled loader outputs",
            children.iter().map(|c| c.outputs()),
            Dim::new(outputs),
        )?;
        let decoded = children.iter().map(|c| c.decoded()).sum();
        Ok(Self {
            samples: Dim::new(samples),
            children,
            outputs,
            decoded,
        })
    }
}

impl Loader for PooledLoader {
    fn samples(&self) -> Dim {
        self.samples
    }

    fn outputs(&self) -> Dim {
        self.outputs.total()
    }

    fn decoded(&self) -> Dim {
        self.decoded
    }

    fn load(&self, raw: &Matrix) -> Result<Matrix, StageError> {
        raw.expect_cols(self.samples)?;
        let parts = self
            .children
            .iter()
            .map(|child| child.load(raw))
            .collect::<Result<Vec<_>, _>>()?;
        concat(parts, raw.rows(), self.outputs())
    }

    fn unload(&self, data: &Matrix) -> Result<Matrix, StageError> {
        let parts = self
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| child.unload(&self.outputs.route(data, i)?))
            .collect::<Result<Vec<_>, _>>()?;
        concat(parts, data.rows(), self.decoded)
    }

    fn accumulate(&mut self, grads: &Gradients) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.accumulate(grads))
    }

    fn update(&mut self) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.update())
    }

    fn move_to(&mut self, device: &Device) -> Result<(), StageError> {
        self.children.iter_mut().try_for_each(|c| c.move_to(device))
    }
}
