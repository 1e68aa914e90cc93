//! Error types for specdetect.

use thiserror::Error;

/// Result alias for specdetect operations.
pub type SpectralResult<T> = std::result::Result<T, SpectralError>;

/// Errors that can occur while scoring a cube against target signatures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectralError {
    /// Complex-valued cubes cannot be scored.
    #[error("complex data is not supported")]
    ComplexData,
    /// Detection needs at least two bands.
    #[error("cannot perform detection on 1 band data")]
    SingleBand,
    /// The run was started without any target signatures.
    #[error("no signatures to process")]
    NoSignatures,
    /// The cube is missing or unusable.
    #[error("the sensor data is invalid: {reason}")]
    InvalidCube { reason: &'static str },
    /// Width, height or band count is zero or overflows.
    #[error("invalid dimensions: {rows} rows x {columns} columns x {bands} bands")]
    InvalidDimensions {
        rows: usize,
        columns: usize,
        bands: usize,
    },
    /// The backing buffer is shorter than the declared dimensions need.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// The region of interest does not lie inside the cube.
    #[error(
        "roi out of bounds: rows {row}+{rows}, columns {column}+{columns} \
         (cube {cube_rows}x{cube_columns})"
    )]
    RoiOutOfBounds {
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
        cube_rows: usize,
        cube_columns: usize,
    },
    /// The region of interest selects no pixels.
    #[error("the region of interest selects no pixels")]
    EmptyRoi,
    /// The cube carries no wavelengths and the signature is not in-scene.
    #[error("the data set wavelengths are invalid")]
    InvalidWavelengths,
    /// No resampler is configured.
    #[error("the resampler could not be created")]
    ResamplerUnavailable,
    /// The resampler rejected its inputs.
    #[error("resampling failed: {reason}")]
    Resampling { reason: String },
    /// No statistics provider is configured for an algorithm that needs one.
    #[error("unable to calculate {kind} statistics")]
    StatisticsUnavailable { kind: &'static str },
    /// Statistics do not match the cube's band count.
    #[error("statistics dimension {got} does not match band count {expected}")]
    StatisticsMismatch { expected: usize, got: usize },
    /// A band-statistics matrix could not be inverted.
    #[error("the {dim}x{dim} statistics matrix is singular")]
    SingularMatrix { dim: usize },
    /// A signature cannot produce a usable detection operator.
    #[error("degenerate signature: {reason}")]
    DegenerateSignature { reason: &'static str },
    /// The cube accessor could not deliver a requested row.
    #[error("unable to access cube row {row}: {reason}")]
    CubeAccess { row: usize, reason: String },
    /// A parallel pass left its output raster unusable.
    #[error("the results raster is unusable: {reason}")]
    ResultsUnavailable { reason: String },
    /// The worker pool could not be created.
    #[error("unable to start worker threads: {reason}")]
    ThreadPool { reason: String },
    /// A failure that belongs to one target signature.
    #[error("signature {index} ({name}): {source}")]
    Target {
        index: usize,
        name: String,
        #[source]
        source: Box<SpectralError>,
    },
}

impl SpectralError {
    /// Wraps `self` with the identity of the target that produced it.
    pub fn for_target(self, index: usize, name: &str) -> Self {
        SpectralError::Target {
            index,
            name: name.to_owned(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, unwrapping target context.
    pub fn root(&self) -> &SpectralError {
        match self {
            SpectralError::Target { source, .. } => source.root(),
            other => other,
        }
    }
}
