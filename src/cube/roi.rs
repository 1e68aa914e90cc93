//! Regions of interest.
//!
//! A [`Roi`] is a rectangular bounding box in cube coordinates with an
//! optional per-pixel selection mask over that box. Score rasters cover the
//! bounding box; pixels in the box that the mask does not select still get a
//! value (the algorithm's sentinel).

use crate::util::{SpectralError, SpectralResult};

/// Pixel selection over a cube.
#[derive(Clone, Debug, PartialEq)]
pub struct Roi {
    row: usize,
    column: usize,
    rows: usize,
    columns: usize,
    /// Row-major over the bounding box; `None` selects every pixel in it.
    mask: Option<Vec<bool>>,
}

impl Roi {
    /// Selects every pixel of a rectangle.
    pub fn rect(row: usize, column: usize, rows: usize, columns: usize) -> SpectralResult<Self> {
        if rows == 0 || columns == 0 {
            return Err(SpectralError::EmptyRoi);
        }
        Ok(Self {
            row,
            column,
            rows,
            columns,
            mask: None,
        })
    }

    /// Builds a region from a full-cube row-major selection mask.
    ///
    /// The bounding box is shrunk to the selected pixels.
    pub fn from_mask(cube_rows: usize, cube_columns: usize, mask: &[bool]) -> SpectralResult<Self> {
        let needed = cube_rows.saturating_mul(cube_columns);
        if mask.len() < needed {
            return Err(SpectralError::BufferTooSmall {
                needed,
                got: mask.len(),
            });
        }

        let mut min_row = usize::MAX;
        let mut max_row = 0usize;
        let mut min_col = usize::MAX;
        let mut max_col = 0usize;
        for r in 0..cube_rows {
            for c in 0..cube_columns {
                if mask[r * cube_columns + c] {
                    min_row = min_row.min(r);
                    max_row = max_row.max(r);
                    min_col = min_col.min(c);
                    max_col = max_col.max(c);
                }
            }
        }
        if min_row == usize::MAX {
            return Err(SpectralError::EmptyRoi);
        }

        let rows = max_row - min_row + 1;
        let columns = max_col - min_col + 1;
        let mut boxed = Vec::with_capacity(rows * columns);
        for r in min_row..=max_row {
            let start = r * cube_columns;
            boxed.extend_from_slice(&mask[start + min_col..=start + max_col]);
        }
        let mask = if boxed.iter().all(|&v| v) {
            None
        } else {
            Some(boxed)
        };

        Ok(Self {
            row: min_row,
            column: min_col,
            rows,
            columns,
            mask,
        })
    }

    /// First cube row of the bounding box.
    pub fn row_offset(&self) -> usize {
        self.row
    }

    /// First cube column of the bounding box.
    pub fn column_offset(&self) -> usize {
        self.column
    }

    /// Bounding box height.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Bounding box width.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Returns true when every pixel of the bounding box is selected.
    pub fn is_rectangular(&self) -> bool {
        self.mask.is_none()
    }

    /// Returns whether the pixel at box-relative `(row, column)` is selected.
    #[inline]
    pub fn contains(&self, row: usize, column: usize) -> bool {
        if row >= self.rows || column >= self.columns {
            return false;
        }
        match &self.mask {
            None => true,
            Some(mask) => mask[row * self.columns + column],
        }
    }

    /// Number of selected pixels.
    pub fn selected_count(&self) -> usize {
        match &self.mask {
            None => self.rows * self.columns,
            Some(mask) => mask.iter().filter(|&&v| v).count(),
        }
    }

    /// Checks that the bounding box lies inside a cube of the given size.
    pub fn check_bounds(&self, cube_rows: usize, cube_columns: usize) -> SpectralResult<()> {
        let end_row = self.row.checked_add(self.rows);
        let end_col = self.column.checked_add(self.columns);
        match (end_row, end_col) {
            (Some(er), Some(ec)) if er <= cube_rows && ec <= cube_columns => Ok(()),
            _ => Err(SpectralError::RoiOutOfBounds {
                row: self.row,
                column: self.column,
                rows: self.rows,
                columns: self.columns,
                cube_rows,
                cube_columns,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Roi;
    use crate::util::SpectralError;

    #[test]
    fn mask_shrinks_to_bounding_box() {
        #[rustfmt::skip]
        let mask = [
            false, false, false, false,
            false, true,  false, false,
            false, false, true,  false,
        ];
        let roi = Roi::from_mask(3, 4, &mask).unwrap();
        assert_eq!((roi.row_offset(), roi.column_offset()), (1, 1));
        assert_eq!((roi.rows(), roi.columns()), (2, 2));
        assert!(roi.contains(0, 0));
        assert!(!roi.contains(0, 1));
        assert!(roi.contains(1, 1));
        assert_eq!(roi.selected_count(), 2);
    }

    #[test]
    fn full_mask_becomes_rectangular() {
        let roi = Roi::from_mask(2, 2, &[true; 4]).unwrap();
        assert!(roi.is_rectangular());
    }

    #[test]
    fn empty_mask_is_rejected() {
        assert_eq!(Roi::from_mask(2, 2, &[false; 4]), Err(SpectralError::EmptyRoi));
    }

    #[test]
    fn bounds_check_reports_cube_size() {
        let roi = Roi::rect(1, 1, 2, 2).unwrap();
        assert!(roi.check_bounds(3, 3).is_ok());
        assert_eq!(
            roi.check_bounds(2, 3),
            Err(SpectralError::RoiOutOfBounds {
                row: 1,
                column: 1,
                rows: 2,
                columns: 2,
                cube_rows: 2,
                cube_columns: 3,
            })
        );
    }
}
