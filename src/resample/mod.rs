//! Aligning target signatures onto a cube's band grid.
//!
//! [`resample_signature`] decides how a signature reaches the cube's bands:
//! in-scene spectra pass through unchanged, everything else goes through a
//! [`Resampler`]. Bands the signature cannot reach are dropped, so the result
//! may cover fewer bands than the cube has.

use crate::cube::BandGrid;
use crate::signature::{ResampledSignature, TargetSignature};
use crate::util::{SpectralError, SpectralResult};

mod interp;

pub use interp::{InterpolatingResampler, ResampleMethod, ResamplerOptions};

/// Output of a resampler: amplitudes and the target band indices they fill.
#[derive(Clone, Debug, PartialEq)]
pub struct ResampleOutput {
    pub amplitudes: Vec<f64>,
    pub bands: Vec<usize>,
}

/// Maps a spectrum sampled at arbitrary wavelengths onto target band centers.
pub trait Resampler: Send + Sync {
    /// Resamples `amplitudes` measured at `wavelengths` onto `centers`.
    ///
    /// `fwhm` is either empty or parallel to `centers`. All wavelengths are in
    /// microns. Band indices in the output refer to positions in `centers`
    /// and are strictly increasing.
    fn resample(
        &self,
        amplitudes: &[f64],
        wavelengths: &[f64],
        centers: &[f64],
        fwhm: &[f64],
    ) -> SpectralResult<ResampleOutput>;
}

/// A resampled signature together with its band coverage.
#[derive(Clone, Debug, PartialEq)]
pub struct Resampled {
    pub signature: ResampledSignature,
    /// Number of bands in the cube.
    pub total_bands: usize,
}

impl Resampled {
    /// Returns true when some cube bands are not covered by the signature.
    pub fn is_partial(&self) -> bool {
        !self.signature.covers_all(self.total_bands)
    }

    /// Coverage warning text, present only for partial coverage.
    pub fn coverage_warning(&self) -> Option<String> {
        self.is_partial().then(|| {
            format!(
                "The spectrum only provides spectral coverage for {} of {} bands.",
                self.signature.len(),
                self.total_bands
            )
        })
    }
}

/// Aligns `signature` onto a cube with `num_bands` bands.
///
/// Without a band grid only in-scene signatures are accepted. With a grid the
/// resampler is required, unless the signature is an in-scene spectrum that
/// carries no wavelengths of its own.
pub fn resample_signature(
    signature: &TargetSignature,
    grid: Option<&BandGrid>,
    num_bands: usize,
    resampler: Option<&dyn Resampler>,
) -> SpectralResult<Resampled> {
    let identity = || {
        let amplitudes = signature.amplitudes().to_vec();
        let bands = (0..amplitudes.len()).collect();
        ResampledSignature::new(amplitudes, bands, num_bands).map(|signature| Resampled {
            signature,
            total_bands: num_bands,
        })
    };

    let grid = match grid {
        Some(grid) if !grid.is_empty() => grid,
        _ => {
            if signature.is_in_scene() {
                return identity();
            }
            return Err(SpectralError::InvalidWavelengths);
        }
    };
    if signature.is_in_scene() && signature.wavelengths().is_empty() {
        return identity();
    }

    let resampler = resampler.ok_or(SpectralError::ResamplerUnavailable)?;
    let output = resampler.resample(
        signature.amplitudes(),
        &signature.wavelengths_microns(),
        grid.centers(),
        grid.fwhm(),
    )?;
    let signature = ResampledSignature::new(output.amplitudes, output.bands, num_bands)?;
    Ok(Resampled {
        signature,
        total_bands: num_bands,
    })
}

#[cfg(test)]
mod tests {
    use super::{resample_signature, InterpolatingResampler};
    use crate::cube::BandGrid;
    use crate::signature::TargetSignature;
    use crate::util::SpectralError;

    #[test]
    fn missing_grid_accepts_in_scene_signature() {
        let sig = TargetSignature::in_scene("pixel", vec![1.0, 2.0, 3.0]);
        let out = resample_signature(&sig, None, 3, None).unwrap();
        assert_eq!(out.signature.bands(), &[0, 1, 2]);
        assert!(out.coverage_warning().is_none());
    }

    #[test]
    fn missing_grid_rejects_library_signature() {
        let sig = TargetSignature::new("lib", vec![0.4, 0.5], vec![1.0, 2.0]);
        let err = resample_signature(&sig, None, 2, None).unwrap_err();
        assert_eq!(err, SpectralError::InvalidWavelengths);
    }

    #[test]
    fn grid_without_resampler_is_unavailable() {
        let grid = BandGrid::new(vec![0.4, 0.5], Vec::new()).unwrap();
        let sig = TargetSignature::new("lib", vec![0.4, 0.5], vec![1.0, 2.0]);
        let err = resample_signature(&sig, Some(&grid), 2, None).unwrap_err();
        assert_eq!(err, SpectralError::ResamplerUnavailable);
    }

    #[test]
    fn partial_coverage_produces_warning() {
        let grid = BandGrid::new(vec![0.40, 0.41, 0.42, 0.90], Vec::new()).unwrap();
        let sig = TargetSignature::new("lib", vec![0.40, 0.41, 0.42], vec![1.0, 2.0, 3.0]);
        let resampler = InterpolatingResampler::default();
        let out = resample_signature(&sig, Some(&grid), 4, Some(&resampler)).unwrap();
        assert_eq!(out.signature.bands(), &[0, 1, 2]);
        assert_eq!(
            out.coverage_warning().as_deref(),
            Some("The spectrum only provides spectral coverage for 3 of 4 bands.")
        );
    }
}
