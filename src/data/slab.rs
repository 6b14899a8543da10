//! Hyperslab selections.
//!
//! A slab picks a strided sub-grid of a payload with 1-based inclusive
//! bounds per axis. Elements are linearized first-axis-fastest, matching
//! the declared (logical) dimension order.

use crate::error::{Error, Result};
use crate::types::MAX_DIMENSIONS;

/// One axis of a hyperslab: 1-based inclusive bounds plus a stride
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slab {
    pub start: u64,
    pub end: u64,
    pub stride: u64,
}

impl Slab {
    pub fn new(start: u64, end: u64, stride: u64) -> Self {
        Slab { start, end, stride }
    }

    /// The full extent of one axis, unit stride
    pub fn all(extent: u64) -> Self {
        Slab {
            start: 1,
            end: extent,
            stride: 1,
        }
    }
}

/// A validated multi-axis selection
#[derive(Debug, Clone)]
pub struct Selection {
    /// 0-based selected indices per axis
    indices: Vec<Vec<u64>>,
    /// Linearization weight per axis (first axis fastest)
    weights: Vec<u64>,
}

impl Selection {
    /// Validate `slabs` against the axis extents.
    ///
    /// Per axis, checks run in a fixed order: start below 1, end past the
    /// extent, start past end, then stride outside `1..=span`. The number
    /// of selected elements on an axis is `span / stride`, truncating.
    pub fn validate(slabs: &[Slab], extents: &[u64]) -> Result<Selection> {
        if slabs.len() != extents.len() || slabs.is_empty() || slabs.len() > MAX_DIMENSIONS {
            return Err(Error::BadRank(slabs.len()));
        }
        let mut indices = Vec::with_capacity(slabs.len());
        for (slab, &extent) in slabs.iter().zip(extents) {
            if slab.start < 1 {
                return Err(Error::StartOutOfRange);
            }
            if slab.end > extent {
                return Err(Error::EndOutOfRange);
            }
            if slab.start > slab.end {
                return Err(Error::MinimumGreaterThanMaximum);
            }
            let span = slab.end - slab.start + 1;
            if slab.stride < 1 || slab.stride > span {
                return Err(Error::BadStride);
            }
            let count = span / slab.stride;
            let axis: Vec<u64> = (0..count)
                .map(|k| slab.start - 1 + k * slab.stride)
                .collect();
            indices.push(axis);
        }
        let mut weights = Vec::with_capacity(extents.len());
        let mut w = 1u64;
        for &extent in extents {
            weights.push(w);
            w = w.saturating_mul(extent);
        }
        Ok(Selection { indices, weights })
    }

    /// Total number of selected elements
    pub fn npoints(&self) -> u64 {
        self.indices.iter().map(|axis| axis.len() as u64).product()
    }

    /// Linear element offsets of the selection, first axis fastest
    pub fn linear_offsets(&self) -> Vec<u64> {
        let total = self.npoints() as usize;
        let mut out = Vec::with_capacity(total);
        let rank = self.indices.len();
        let mut odo = vec![0usize; rank];
        for _ in 0..total {
            let mut off = 0u64;
            for axis in 0..rank {
                off += self.indices[axis][odo[axis]] * self.weights[axis];
            }
            out.push(off);
            for axis in 0..rank {
                odo[axis] += 1;
                if odo[axis] < self.indices[axis].len() {
                    break;
                }
                odo[axis] = 0;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_selection() {
        // 1-based 1..5 step 2 on a 6-wide axis selects indices 0 and 2.
        let sel = Selection::validate(&[Slab::new(1, 5, 2)], &[6]).unwrap();
        assert_eq!(sel.npoints(), 2);
        assert_eq!(sel.linear_offsets(), vec![0, 2]);
    }

    #[test]
    fn first_axis_varies_fastest() {
        let sel = Selection::validate(
            &[Slab::new(1, 2, 1), Slab::new(2, 3, 1)],
            &[4, 3],
        )
        .unwrap();
        assert_eq!(sel.linear_offsets(), vec![4, 5, 8, 9]);
    }

    #[test]
    fn validation_order() {
        let extents = [10];
        assert!(matches!(
            Selection::validate(&[Slab::new(0, 5, 1)], &extents),
            Err(Error::StartOutOfRange)
        ));
        assert!(matches!(
            Selection::validate(&[Slab::new(1, 11, 1)], &extents),
            Err(Error::EndOutOfRange)
        ));
        assert!(matches!(
            Selection::validate(&[Slab::new(5, 3, 1)], &extents),
            Err(Error::MinimumGreaterThanMaximum)
        ));
        assert!(matches!(
            Selection::validate(&[Slab::new(1, 4, 5)], &extents),
            Err(Error::BadStride)
        ));
        assert!(matches!(
            Selection::validate(&[Slab::new(1, 4, 0)], &extents),
            Err(Error::BadStride)
        ));
    }

    #[test]
    fn rank_mismatch_refused() {
        assert!(matches!(
            Selection::validate(&[Slab::all(3)], &[3, 3]),
            Err(Error::BadRank(1))
        ));
    }
}
