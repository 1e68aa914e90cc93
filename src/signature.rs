//! Target signatures and their band-aligned form.

use crate::cube::{Units, WavelengthUnit};
use crate::util::{SpectralError, SpectralResult};

/// A named reference spectrum.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetSignature {
    name: String,
    wavelengths: Vec<f64>,
    wavelength_unit: WavelengthUnit,
    amplitudes: Vec<f64>,
    units: Option<Units>,
    in_scene: bool,
}

impl TargetSignature {
    /// Creates a signature from `(wavelength, amplitude)` samples.
    pub fn new(name: impl Into<String>, wavelengths: Vec<f64>, amplitudes: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            wavelengths,
            wavelength_unit: WavelengthUnit::Microns,
            amplitudes,
            units: None,
            in_scene: false,
        }
    }

    /// Creates a signature taken from a pixel of the cube being scored.
    ///
    /// Such a signature is already on the cube's band grid and is accepted
    /// even when the cube has no wavelength metadata.
    pub fn in_scene(name: impl Into<String>, amplitudes: Vec<f64>) -> Self {
        Self {
            in_scene: true,
            ..Self::new(name, Vec::new(), amplitudes)
        }
    }

    /// Sets the unit of the wavelength samples.
    pub fn with_wavelength_unit(mut self, unit: WavelengthUnit) -> Self {
        self.wavelength_unit = unit;
        self
    }

    /// Sets the amplitude units.
    pub fn with_units(mut self, units: Units) -> Self {
        self.units = Some(units);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw wavelength samples, in [`Self::wavelength_unit`].
    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    /// Wavelength samples converted to microns.
    pub fn wavelengths_microns(&self) -> Vec<f64> {
        self.wavelengths
            .iter()
            .map(|&v| self.wavelength_unit.to_microns(v))
            .collect()
    }

    pub fn wavelength_unit(&self) -> WavelengthUnit {
        self.wavelength_unit
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    pub fn units(&self) -> Option<Units> {
        self.units
    }

    /// Returns true for signatures extracted from the scored cube.
    pub fn is_in_scene(&self) -> bool {
        self.in_scene
    }
}

/// A signature aligned to a subset of the cube's bands.
#[derive(Clone, Debug, PartialEq)]
pub struct ResampledSignature {
    amplitudes: Vec<f64>,
    bands: Vec<usize>,
}

impl ResampledSignature {
    /// Pairs amplitudes with the cube band indices they belong to.
    ///
    /// `bands` must be strictly increasing, below `num_bands`, and as long as
    /// `amplitudes`.
    pub fn new(amplitudes: Vec<f64>, bands: Vec<usize>, num_bands: usize) -> SpectralResult<Self> {
        if amplitudes.len() != bands.len() {
            return Err(SpectralError::Resampling {
                reason: format!(
                    "{} amplitudes for {} band indices",
                    amplitudes.len(),
                    bands.len()
                ),
            });
        }
        if bands.is_empty() {
            return Err(SpectralError::Resampling {
                reason: "No bands could be resampled.".to_owned(),
            });
        }
        if bands.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SpectralError::Resampling {
                reason: "band indices are not strictly increasing".to_owned(),
            });
        }
        if let Some(&last) = bands.last() {
            if last >= num_bands {
                return Err(SpectralError::Resampling {
                    reason: format!("band index {last} outside cube with {num_bands} bands"),
                });
            }
        }
        Ok(Self { amplitudes, bands })
    }

    /// Amplitudes, one per entry of [`Self::bands`].
    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    /// Cube band indices covered by the signature.
    pub fn bands(&self) -> &[usize] {
        &self.bands
    }

    /// Number of covered bands.
    pub fn len(&self) -> usize {
        self.bands.len()
    }

    /// Always false; construction rejects empty coverage.
    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Returns true when every band of a `num_bands` cube is covered.
    pub fn covers_all(&self, num_bands: usize) -> bool {
        self.bands.len() == num_bands
    }

    /// Returns a copy with every amplitude multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            amplitudes: self.amplitudes.iter().map(|v| v * factor).collect(),
            bands: self.bands.clone(),
        }
    }
}
