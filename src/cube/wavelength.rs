//! Band wavelength grids.

use crate::util::{SpectralError, SpectralResult};

/// Units a wavelength sequence is expressed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WavelengthUnit {
    #[default]
    Microns,
    Nanometers,
    InverseCentimeters,
}

impl WavelengthUnit {
    /// Converts `value` in these units to microns.
    pub fn to_microns(self, value: f64) -> f64 {
        match self {
            WavelengthUnit::Microns => value,
            WavelengthUnit::Nanometers => value / 1000.0,
            WavelengthUnit::InverseCentimeters => {
                if value == 0.0 {
                    0.0
                } else {
                    10_000.0 / value
                }
            }
        }
    }
}

/// Center wavelengths (and optional full-width-half-max) of a cube's bands,
/// stored in microns.
#[derive(Clone, Debug, PartialEq)]
pub struct BandGrid {
    centers: Vec<f64>,
    fwhm: Vec<f64>,
}

impl BandGrid {
    /// Creates a grid from center wavelengths in microns, with optional FWHM.
    ///
    /// An empty `fwhm` means the resampler's default width is used.
    pub fn new(centers: Vec<f64>, fwhm: Vec<f64>) -> SpectralResult<Self> {
        if centers.is_empty() {
            return Err(SpectralError::InvalidWavelengths);
        }
        if !fwhm.is_empty() && fwhm.len() != centers.len() {
            return Err(SpectralError::InvalidCube {
                reason: "fwhm length does not match center wavelength count",
            });
        }
        if centers.iter().chain(fwhm.iter()).any(|v| !v.is_finite()) {
            return Err(SpectralError::InvalidWavelengths);
        }
        Ok(Self { centers, fwhm })
    }

    /// Creates a grid from centers expressed in `unit`.
    pub fn with_unit(centers: &[f64], fwhm: &[f64], unit: WavelengthUnit) -> SpectralResult<Self> {
        let centers = centers.iter().map(|&v| unit.to_microns(v)).collect();
        let fwhm = match unit {
            // Inverse wavenumbers do not convert widths linearly; drop them.
            WavelengthUnit::InverseCentimeters => Vec::new(),
            _ => fwhm.iter().map(|&v| unit.to_microns(v)).collect(),
        };
        Self::new(centers, fwhm)
    }

    /// Creates a grid from band start and end wavelengths in microns.
    ///
    /// Centers are the band midpoints and FWHM is the band width.
    pub fn from_edges(start: &[f64], end: &[f64]) -> SpectralResult<Self> {
        if start.len() != end.len() {
            return Err(SpectralError::InvalidWavelengths);
        }
        let centers = start.iter().zip(end).map(|(s, e)| 0.5 * (s + e)).collect();
        let fwhm = start.iter().zip(end).map(|(s, e)| (e - s).abs()).collect();
        Self::new(centers, fwhm)
    }

    /// Number of bands.
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Always false; grids hold at least one band.
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Band center wavelengths in microns.
    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    /// Band FWHM in microns, empty when unknown.
    pub fn fwhm(&self) -> &[f64] {
        &self.fwhm
    }
}
