//! Shape-checked numeric buffers.
//!
//! `PredictionView` borrows raw detector output laid out as
//! `images x candidates x (4 box + 1 objectness + C class scores)`.
//! `GridView` / `GridTensor` address per-cell data by
//! `(batch, anchor, row, col)` with an optional trailing channel axis, which
//! is how the target-assignment stage reads predictions and writes targets.

use crate::util::{DetPostError, DetPostResult};

/// Number of leading attributes per candidate before the class scores.
pub const BOX_ATTRS: usize = 5;

/// Borrowed raw prediction tensor.
#[derive(Copy, Clone, Debug)]
pub struct PredictionView<'a> {
    data: &'a [f32],
    images: usize,
    candidates: usize,
    attrs: usize,
}

impl<'a> PredictionView<'a> {
    /// Wraps a contiguous buffer of `images * candidates * attrs` values.
    pub fn new(
        data: &'a [f32],
        images: usize,
        candidates: usize,
        attrs: usize,
    ) -> DetPostResult<Self> {
        if attrs <= BOX_ATTRS {
            return Err(DetPostError::InvalidDimensions {
                context: "prediction",
                reason: "each candidate needs 4 box values, objectness and at least one class score",
            });
        }
        let expected = images
            .checked_mul(candidates)
            .and_then(|v| v.checked_mul(attrs))
            .ok_or(DetPostError::InvalidDimensions {
                context: "prediction",
                reason: "element count overflows usize",
            })?;
        if data.len() != expected {
            return Err(DetPostError::ShapeMismatch {
                context: "prediction buffer length",
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            images,
            candidates,
            attrs,
        })
    }

    pub fn images(&self) -> usize {
        self.images
    }

    pub fn candidates(&self) -> usize {
        self.candidates
    }

    /// Values per candidate (`5 + num_classes`).
    pub fn attrs(&self) -> usize {
        self.attrs
    }

    pub fn num_classes(&self) -> usize {
        self.attrs - BOX_ATTRS
    }

    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// All candidates of one image, row-major.
    pub fn image(&self, image: usize) -> Option<&'a [f32]> {
        if image >= self.images {
            return None;
        }
        let len = self.candidates * self.attrs;
        let start = image * len;
        self.data.get(start..start + len)
    }

    /// One candidate row `[cx, cy, w, h, objectness, class scores...]`.
    pub fn candidate(&self, image: usize, candidate: usize) -> Option<&'a [f32]> {
        if candidate >= self.candidates {
            return None;
        }
        let start = candidate * self.attrs;
        self.image(image)?.get(start..start + self.attrs)
    }
}

/// Leading dimensions of a per-cell tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    /// Images in the batch (`nB`).
    pub batch: usize,
    /// Anchors at this scale (`nA`).
    pub anchors: usize,
    /// Cells per side of the square grid (`nG`).
    pub grid: usize,
}

impl GridShape {
    pub const fn new(batch: usize, anchors: usize, grid: usize) -> Self {
        Self {
            batch,
            anchors,
            grid,
        }
    }

    /// Number of `(batch, anchor, row, col)` cells.
    pub fn cells(&self) -> Option<usize> {
        self.batch
            .checked_mul(self.anchors)?
            .checked_mul(self.grid)?
            .checked_mul(self.grid)
    }

    #[inline]
    fn offset(&self, b: usize, a: usize, row: usize, col: usize) -> Option<usize> {
        if b >= self.batch || a >= self.anchors || row >= self.grid || col >= self.grid {
            return None;
        }
        Some(((b * self.anchors + a) * self.grid + row) * self.grid + col)
    }
}

/// Borrowed per-cell tensor with `depth` channels per cell.
#[derive(Copy, Clone, Debug)]
pub struct GridView<'a, T> {
    data: &'a [T],
    shape: GridShape,
    depth: usize,
}

impl<'a, T> GridView<'a, T> {
    pub fn new(data: &'a [T], shape: GridShape, depth: usize) -> DetPostResult<Self> {
        let expected = buffer_len(shape, depth)?;
        if data.len() != expected {
            return Err(DetPostError::ShapeMismatch {
                context: "grid buffer length",
                expected,
                got: data.len(),
            });
        }
        Ok(Self { data, shape, depth })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Channels of one cell.
    pub fn cell(&self, b: usize, a: usize, row: usize, col: usize) -> Option<&'a [T]> {
        let start = self.shape.offset(b, a, row, col)? * self.depth;
        self.data.get(start..start + self.depth)
    }
}

/// Owned per-cell tensor with `depth` channels per cell.
#[derive(Clone, Debug, PartialEq)]
pub struct GridTensor<T> {
    data: Vec<T>,
    shape: GridShape,
    depth: usize,
}

impl<T: Clone> GridTensor<T> {
    /// Allocates a tensor with every channel set to `value`.
    pub fn filled(shape: GridShape, depth: usize, value: T) -> DetPostResult<Self> {
        let len = buffer_len(shape, depth)?;
        Ok(Self {
            data: vec![value; len],
            shape,
            depth,
        })
    }

    /// Wraps an existing buffer after checking its length.
    pub fn from_vec(data: Vec<T>, shape: GridShape, depth: usize) -> DetPostResult<Self> {
        GridView::new(&data, shape, depth)?;
        Ok(Self { data, shape, depth })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn view(&self) -> GridView<'_, T> {
        GridView {
            data: &self.data,
            shape: self.shape,
            depth: self.depth,
        }
    }

    /// Channels of one cell.
    pub fn cell(&self, b: usize, a: usize, row: usize, col: usize) -> Option<&[T]> {
        let start = self.shape.offset(b, a, row, col)? * self.depth;
        self.data.get(start..start + self.depth)
    }

    /// First channel of one cell.
    pub fn get(&self, b: usize, a: usize, row: usize, col: usize) -> Option<&T> {
        self.cell(b, a, row, col)?.first()
    }

    pub(crate) fn cell_mut(
        &mut self,
        b: usize,
        a: usize,
        row: usize,
        col: usize,
    ) -> Option<&mut [T]> {
        let start = self.shape.offset(b, a, row, col)? * self.depth;
        self.data.get_mut(start..start + self.depth)
    }

    /// Overwrites the first channel of one cell; returns `false` when the
    /// index is outside the grid.
    pub(crate) fn set(&mut self, b: usize, a: usize, row: usize, col: usize, value: T) -> bool {
        match self.cell_mut(b, a, row, col).and_then(|c| c.first_mut()) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Applies `f` to every channel value, producing a new tensor.
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> GridTensor<U> {
        GridTensor {
            data: self.data.iter().map(f).collect(),
            shape: self.shape,
            depth: self.depth,
        }
    }
}

fn buffer_len(shape: GridShape, depth: usize) -> DetPostResult<usize> {
    if depth == 0 {
        return Err(DetPostError::InvalidDimensions {
            context: "grid",
            reason: "depth must be at least one",
        });
    }
    shape
        .cells()
        .and_then(|c| c.checked_mul(depth))
        .ok_or(DetPostError::InvalidDimensions {
            context: "grid",
            reason: "element count overflows usize",
        })
}

#[cfg(test)]
mod tests {
    use super::{GridShape, GridTensor, GridView, PredictionView};
    use crate::util::DetPostError;

    #[test]
    fn prediction_view_rejects_short_rows() {
        let data = [0.0f32; 10];
        let err = PredictionView::new(&data, 1, 2, 5).unwrap_err();
        assert!(matches!(err, DetPostError::InvalidDimensions { .. }));
    }

    #[test]
    fn prediction_view_rejects_wrong_length() {
        let data = [0.0f32; 11];
        let err = PredictionView::new(&data, 1, 2, 6).unwrap_err();
        assert_eq!(
            err,
            DetPostError::ShapeMismatch {
                context: "prediction buffer length",
                expected: 12,
                got: 11,
            }
        );
    }

    #[test]
    fn prediction_view_indexes_rows() {
        let data: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let view = PredictionView::new(&data, 2, 2, 6).unwrap();
        assert_eq!(view.num_classes(), 1);
        assert_eq!(view.candidate(1, 0).unwrap()[0], 12.0);
        assert_eq!(view.candidate(1, 1).unwrap()[5], 23.0);
        assert!(view.candidate(2, 0).is_none());
        assert!(view.candidate(0, 2).is_none());
    }

    #[test]
    fn grid_tensor_addresses_cells() {
        let shape = GridShape::new(2, 3, 4);
        let mut t = GridTensor::filled(shape, 1, 0u8).unwrap();
        assert!(t.set(1, 2, 3, 0, 7));
        assert_eq!(t.get(1, 2, 3, 0), Some(&7));
        assert_eq!(t.as_slice().iter().filter(|&&v| v == 7).count(), 1);
        assert!(!t.set(2, 0, 0, 0, 1));
        assert!(t.get(0, 0, 4, 0).is_none());
    }

    #[test]
    fn grid_view_checks_depth_and_length() {
        let shape = GridShape::new(1, 1, 2);
        let data = vec![0.0f32; 8];
        assert!(GridView::new(&data, shape, 2).is_ok());
        assert!(GridView::new(&data, shape, 3).is_err());
        assert!(GridView::new(&data, shape, 0).is_err());
    }
}
