//! specdetect scores hyperspectral and multispectral cubes against reference
//! spectra.
//!
//! Three detectors share one execution skeleton: the adaptive cosine
//! estimator (ACE), constrained energy minimisation (CEM) and the spectral
//! angle mapper (SAM). A [`Detector`] resamples each target signature onto the
//! cube's band grid, whitens it with the matching subset of the scene
//! statistics, scores every pixel on a row-partitioned worker pool (the
//! `rayon` feature), and thresholds the result or merges several targets into
//! a winner-take-all label raster.
//!
//! ```no_run
//! use specdetect::{Algorithm, Cube, DetectConfig, Detector, TargetSignature};
//!
//! # fn main() -> Result<(), specdetect::SpectralError> {
//! let cube = Cube::new(vec![0.2f32; 4 * 4 * 3], 4, 4, 3)?;
//! let target = TargetSignature::in_scene("roof", vec![0.2, 0.2, 0.2]);
//! let outcome = Detector::new(&cube)
//!     .with_config(DetectConfig::new(Algorithm::Sam))
//!     .run(&[target])?;
//! if let Some(results) = outcome.results() {
//!     println!("{} matches", results.targets()[0].match_count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cube;
pub mod detect;
pub mod merge;
pub mod progress;
pub mod resample;
pub mod score;
pub mod signature;
pub mod stats;
mod trace;
pub mod util;

pub use cube::{
    BandGrid, Cube, CubeAccessor, CubeDescriptor, Encoding, Roi, UnitKind, Units, WavelengthUnit,
};
pub use detect::{
    DetectConfig, DetectionResults, Detector, OutputMode, RunOutcome, RunState, TargetFailure,
};
pub use merge::{MatchPolicy, ThresholdDirection, ThresholdedRaster, WinnerTakeAll};
pub use progress::{NullProgress, ProgressSink, Severity};
pub use resample::{InterpolatingResampler, ResampleMethod, Resampler, ResamplerOptions};
pub use score::{AbortFlag, Algorithm, ScoreRaster};
pub use signature::{ResampledSignature, TargetSignature};
pub use stats::{DetectionStatistics, SceneStatistics, StatisticsKind, StatisticsProvider};
pub use util::{SpectralError, SpectralResult};
