//! Per-pixel score output.

use crate::merge::ThresholdDirection;
use crate::util::{SpectralError, SpectralResult};

/// Row-major score raster covering a cube or a region's bounding box.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreRaster {
    rows: usize,
    columns: usize,
    row_offset: usize,
    column_offset: usize,
    data: Vec<f32>,
    sentinel: f32,
    bad_value: Option<f32>,
}

impl ScoreRaster {
    /// Allocates a raster with every pixel at `sentinel`.
    pub(crate) fn filled(
        rows: usize,
        columns: usize,
        offset: (usize, usize),
        sentinel: f32,
        bad_value: Option<f32>,
    ) -> Self {
        Self {
            rows,
            columns,
            row_offset: offset.0,
            column_offset: offset.1,
            data: vec![sentinel; rows * columns],
            sentinel,
            bad_value,
        }
    }

    /// Wraps existing scores.
    pub fn from_vec(
        rows: usize,
        columns: usize,
        data: Vec<f32>,
        sentinel: f32,
        bad_value: Option<f32>,
    ) -> SpectralResult<Self> {
        let needed = rows * columns;
        if data.len() != needed {
            return Err(SpectralError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            rows,
            columns,
            row_offset: 0,
            column_offset: 0,
            data,
            sentinel,
            bad_value,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Cube coordinates of the raster's top-left pixel.
    pub fn offset(&self) -> (usize, usize) {
        (self.row_offset, self.column_offset)
    }

    /// Value written where no score was computed.
    pub fn sentinel(&self) -> f32 {
        self.sentinel
    }

    /// Declared bad value, excluded from thresholds and display scaling.
    pub fn bad_value(&self) -> Option<f32> {
        self.bad_value
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f32> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.data.get(row * self.columns + column).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.columns;
        self.data.get(start..start + self.columns)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Returns true for NaN and the declared bad value.
    #[inline]
    pub fn is_bad(&self, value: f32) -> bool {
        value.is_nan() || self.bad_value == Some(value)
    }

    /// Largest valid score, used to scale display.
    pub fn valid_max(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|&v| !self.is_bad(v))
            .reduce(f32::max)
    }

    /// Number of valid scores on the matching side of `threshold`.
    pub fn count_matches(&self, threshold: f64, direction: ThresholdDirection) -> usize {
        self.data
            .iter()
            .filter(|&&v| !self.is_bad(v) && direction.passes(f64::from(v), threshold))
            .count()
    }
}
