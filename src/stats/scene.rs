//! Built-in statistics provider that reads the cube directly.

use nalgebra::DMatrix;

use crate::cube::{CubeAccessor, Roi};
use crate::stats::{DetectionStatistics, StatisticsKind, StatisticsProvider};
use crate::trace::{trace_event, trace_span};
use crate::util::{SpectralError, SpectralResult};

/// Computes means and covariance or second moment from the selected pixels.
///
/// Covariance uses the unbiased `n - 1` normalisation, the second moment `n`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SceneStatistics;

impl StatisticsProvider for SceneStatistics {
    fn statistics(
        &self,
        cube: &dyn CubeAccessor,
        roi: Option<&Roi>,
        kind: StatisticsKind,
    ) -> SpectralResult<DetectionStatistics> {
        let bands = cube.descriptor().bands;
        let _span = trace_span!("scene_statistics", bands = bands, kind = kind.as_str()).entered();

        let mut sum = vec![0.0f64; bands];
        let count = for_each_pixel(cube, roi, |px| {
            for (s, &v) in sum.iter_mut().zip(px) {
                *s += v;
            }
        })?;
        if count == 0 {
            return Err(SpectralError::EmptyRoi);
        }
        let n = count as f64;
        let means: Vec<f64> = sum.iter().map(|s| s / n).collect();

        let mut cross = DMatrix::<f64>::zeros(bands, bands);
        let mut centered = vec![0.0f64; bands];
        match kind {
            StatisticsKind::SecondMoment => {
                for_each_pixel(cube, roi, |px| accumulate_upper(&mut cross, px))?;
                cross /= n;
            }
            StatisticsKind::Covariance => {
                if count < 2 {
                    return Err(SpectralError::InvalidCube {
                        reason: "covariance needs at least two pixels",
                    });
                }
                for_each_pixel(cube, roi, |px| {
                    for ((c, &v), &m) in centered.iter_mut().zip(px).zip(&means) {
                        *c = v - m;
                    }
                    accumulate_upper(&mut cross, &centered);
                })?;
                cross /= n - 1.0;
            }
        }
        for i in 0..bands {
            for j in 0..i {
                cross[(i, j)] = cross[(j, i)];
            }
        }

        trace_event!("scene_statistics_done", pixels = count);
        DetectionStatistics::new(kind, means, cross)
    }
}

fn accumulate_upper(cross: &mut DMatrix<f64>, px: &[f64]) {
    for (i, &a) in px.iter().enumerate() {
        for (j, &b) in px.iter().enumerate().skip(i) {
            cross[(i, j)] += a * b;
        }
    }
}

/// Visits the band vector of every selected pixel; returns the pixel count.
fn for_each_pixel<F>(cube: &dyn CubeAccessor, roi: Option<&Roi>, mut visit: F) -> SpectralResult<usize>
where
    F: FnMut(&[f64]),
{
    let d = cube.descriptor();
    let (row0, col0, rows, cols) = match roi {
        Some(roi) => {
            roi.check_bounds(d.rows, d.columns)?;
            (roi.row_offset(), roi.column_offset(), roi.rows(), roi.columns())
        }
        None => (0, 0, d.rows, d.columns),
    };
    let bands = d.bands;
    let mut buf = vec![0.0f64; cols * bands];
    let mut count = 0usize;
    for r in 0..rows {
        cube.read_row(row0 + r, col0..col0 + cols, &mut buf)?;
        for c in 0..cols {
            if roi.is_some_and(|roi| !roi.contains(r, c)) {
                continue;
            }
            visit(&buf[c * bands..(c + 1) * bands]);
            count += 1;
        }
    }
    Ok(count)
}
