//! Interpolating resampler for library spectra.
//!
//! Each target band center is filled from the nearest source samples:
//! interpolated between two neighbours closer than the drop-out window,
//! extrapolated a short distance past a pair of close samples, or copied from
//! a single sample that lies within a twentieth of the window. Bands that
//! match none of these rules are left out of the result.

use crate::resample::{ResampleOutput, Resampler};
use crate::util::{SpectralError, SpectralResult};

/// How a band value is computed once its source samples are chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResampleMethod {
    /// Straight line through the two chosen samples.
    #[default]
    Linear,
    /// Natural cubic spline through every sample.
    Spline,
    /// Gaussian band response over all samples, sized by the band FWHM.
    Gaussian,
}

/// Tuning for [`InterpolatingResampler`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResamplerOptions {
    pub method: ResampleMethod,
    /// Largest source sample gap, in microns, that is still interpolated.
    pub drop_out_window: f64,
    /// FWHM in microns used when the band grid has none.
    pub default_fwhm: f64,
}

impl Default for ResamplerOptions {
    fn default() -> Self {
        Self {
            method: ResampleMethod::Linear,
            drop_out_window: 0.03,
            default_fwhm: 0.01,
        }
    }
}

/// Built-in [`Resampler`].
#[derive(Clone, Debug, Default)]
pub struct InterpolatingResampler {
    options: ResamplerOptions,
}

impl InterpolatingResampler {
    pub fn new(options: ResamplerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ResamplerOptions {
        &self.options
    }
}

impl Resampler for InterpolatingResampler {
    fn resample(
        &self,
        amplitudes: &[f64],
        wavelengths: &[f64],
        centers: &[f64],
        fwhm: &[f64],
    ) -> SpectralResult<ResampleOutput> {
        let window = self.options.drop_out_window;
        if !(window >= 0.0) {
            return Err(resampling("Drop Out Window must be at least 0.0."));
        }
        if wavelengths.is_empty() {
            return Err(resampling("Signature has no wavelengths."));
        }
        if amplitudes.is_empty() {
            return Err(resampling("Signature has no data."));
        }
        if amplitudes.len() != wavelengths.len() {
            return Err(resampling(
                "Signature wavelength and data counts do not match.",
            ));
        }
        if !fwhm.is_empty() && fwhm.len() != centers.len() {
            return Err(resampling("FWHM count does not match band count."));
        }

        if wavelengths.iter().any(|wl| !wl.is_finite()) {
            return Err(resampling("Signature wavelengths must be finite."));
        }

        let mut source: Vec<(f64, f64)> = wavelengths
            .iter()
            .copied()
            .zip(amplitudes.iter().copied())
            .collect();
        source.sort_by(|a, b| a.0.total_cmp(&b.0));
        if source.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(resampling("Signature wavelengths have duplicate values."));
        }
        let mut spectrum = SortedSpectrum {
            wavelengths: source.iter().map(|p| p.0).collect(),
            values: source.iter().map(|p| p.1).collect(),
            curvature: Vec::new(),
            window,
        };
        if self.options.method == ResampleMethod::Spline {
            spectrum.curvature = spectrum.natural_spline_curvature();
        }

        if spectrum.matches_grid(centers) {
            return Ok(ResampleOutput {
                amplitudes: spectrum.values,
                bands: (0..centers.len()).collect(),
            });
        }

        let mut order: Vec<usize> = (0..centers.len()).collect();
        order.sort_by(|&a, &b| centers[a].total_cmp(&centers[b]));

        let mut resampled: Vec<(usize, f64)> = Vec::with_capacity(centers.len());
        for band in order {
            let center = centers[band];
            let Some((left, right)) = spectrum.source_indices(center) else {
                continue;
            };
            let value = if left == right {
                spectrum.values[left]
            } else {
                let width = fwhm.get(band).copied().unwrap_or(self.options.default_fwhm);
                match self.options.method {
                    ResampleMethod::Linear => spectrum.linear(left, right, center),
                    ResampleMethod::Spline => spectrum.spline(center),
                    ResampleMethod::Gaussian => spectrum
                        .gaussian(center, width)
                        .unwrap_or_else(|| spectrum.linear(left, right, center)),
                }
            };
            resampled.push((band, value));
        }

        if resampled.is_empty() {
            return Err(resampling("No bands could be resampled."));
        }
        resampled.sort_by_key(|&(band, _)| band);
        Ok(ResampleOutput {
            bands: resampled.iter().map(|&(band, _)| band).collect(),
            amplitudes: resampled.into_iter().map(|(_, value)| value).collect(),
        })
    }
}

fn resampling(reason: &str) -> SpectralError {
    SpectralError::Resampling {
        reason: reason.to_owned(),
    }
}

/// Source spectrum sorted by wavelength.
struct SortedSpectrum {
    wavelengths: Vec<f64>,
    values: Vec<f64>,
    /// Spline second derivatives at each sample; empty unless splining.
    curvature: Vec<f64>,
    window: f64,
}

impl SortedSpectrum {
    fn can_use_single_point(&self, from: f64, to: f64) -> bool {
        (from - to).abs() < self.window / 20.0
    }

    fn can_extrapolate(&self, left: f64, right: f64, to: f64) -> bool {
        if right - left >= self.window {
            return false;
        }
        let reach = self.window / 5.0;
        (to < left && to + reach > left) || (to > right && to - reach < right)
    }

    /// Source and target grids coincide sample for sample.
    fn matches_grid(&self, centers: &[f64]) -> bool {
        self.wavelengths.len() == centers.len()
            && self
                .wavelengths
                .iter()
                .zip(centers)
                .all(|(&from, &to)| self.can_use_single_point(from, to))
    }

    /// Chooses the source samples used to fill the band at `to`.
    ///
    /// Equal indices mean the sample value is copied.
    fn source_indices(&self, to: f64) -> Option<(usize, usize)> {
        let wl = &self.wavelengths;
        let n = wl.len();
        let first = wl[0];
        let last = wl[n - 1];

        if to < first || to > last {
            if n < 2 {
                return None;
            }
            if self.can_extrapolate(wl[0], wl[1], to) {
                return Some((0, 1));
            }
            if self.can_extrapolate(wl[n - 2], wl[n - 1], to) {
                return Some((n - 2, n - 1));
            }
            return None;
        }

        for i in 0..n {
            if wl[i] <= to {
                continue;
            }
            if i == 0 {
                return self.can_use_single_point(wl[0], to).then_some((0, 0));
            }
            if wl[i] - wl[i - 1] < self.window {
                return Some((i - 1, i));
            }
            if i >= 2 && self.can_extrapolate(wl[i - 2], wl[i - 1], to) {
                return Some((i - 2, i - 1));
            }
            if i + 1 < n && self.can_extrapolate(wl[i], wl[i + 1], to) {
                return Some((i, i + 1));
            }
            if self.can_use_single_point(wl[i], to) {
                return Some((i, i));
            }
            if self.can_use_single_point(wl[i - 1], to) {
                return Some((i - 1, i - 1));
            }
            return None;
        }

        self.can_use_single_point(last, to)
            .then_some((n - 1, n - 1))
    }

    fn linear(&self, left: usize, right: usize, to: f64) -> f64 {
        let (wl, wr) = (self.wavelengths[left], self.wavelengths[right]);
        let (vl, vr) = (self.values[left], self.values[right]);
        vl + (to - wl) * (vr - vl) / (wr - wl)
    }

    /// Second derivatives of the natural cubic spline through the samples.
    ///
    /// Both end second derivatives are zero; the interior ones solve the
    /// tridiagonal continuity system.
    fn natural_spline_curvature(&self) -> Vec<f64> {
        let x = &self.wavelengths;
        let y = &self.values;
        let n = x.len();
        let mut y2 = vec![0.0; n];
        if n < 3 {
            return y2;
        }
        let mut u = vec![0.0; n];
        for i in 1..n - 1 {
            let sig = (x[i] - x[i - 1]) / (x[i + 1] - x[i - 1]);
            let p = sig * y2[i - 1] + 2.0;
            y2[i] = (sig - 1.0) / p;
            let slope_change =
                (y[i + 1] - y[i]) / (x[i + 1] - x[i]) - (y[i] - y[i - 1]) / (x[i] - x[i - 1]);
            u[i] = (6.0 * slope_change / (x[i + 1] - x[i - 1]) - sig * u[i - 1]) / p;
        }
        y2[n - 1] = 0.0;
        for k in (0..n - 1).rev() {
            y2[k] = y2[k] * y2[k + 1] + u[k];
        }
        y2
    }

    /// Evaluates the spline at `to`; points outside the samples continue the
    /// end segments.
    fn spline(&self, to: f64) -> f64 {
        let x = &self.wavelengths;
        let y = &self.values;
        let n = x.len();
        let (mut lo, mut hi) = (0, n - 1);
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if x[mid] > to {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        let h = x[hi] - x[lo];
        let a = (x[hi] - to) / h;
        let b = (to - x[lo]) / h;
        let curvature = |i: usize| self.curvature.get(i).copied().unwrap_or(0.0);
        a * y[lo]
            + b * y[hi]
            + ((a * a * a - a) * curvature(lo) + (b * b * b - b) * curvature(hi)) * (h * h) / 6.0
    }

    /// Gaussian-weighted average, `None` when the weights vanish.
    fn gaussian(&self, to: f64, fwhm: f64) -> Option<f64> {
        let sigma = fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt());
        if !(sigma > 0.0) {
            return None;
        }
        let norm = 1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt());
        let mut value = 0.0;
        let mut scale = 0.0;
        for (&wl, &v) in self.wavelengths.iter().zip(&self.values) {
            let ratio = (to - wl) / sigma;
            let weight = norm * (-0.5 * ratio * ratio).exp();
            scale += weight;
            value += v * weight;
        }
        (scale > 0.0 && scale.is_finite()).then(|| value / scale)
    }
}
