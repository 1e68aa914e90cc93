//! What a detection run hands back.

use crate::merge::{ThresholdedRaster, WinnerTakeAll};
use crate::util::SpectralError;

/// Final state of a run that did not fail.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    Completed(DetectionResults),
    /// The abort flag was raised; every partial raster was discarded.
    Aborted,
}

impl RunOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, RunOutcome::Aborted)
    }

    /// Results of a completed run.
    pub fn results(&self) -> Option<&DetectionResults> {
        match self {
            RunOutcome::Completed(results) => Some(results),
            RunOutcome::Aborted => None,
        }
    }

    pub fn into_results(self) -> Option<DetectionResults> {
        match self {
            RunOutcome::Completed(results) => Some(results),
            RunOutcome::Aborted => None,
        }
    }
}

/// A target skipped in independent mode.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetFailure {
    pub index: usize,
    pub name: String,
    pub error: SpectralError,
}

/// Output rasters of a completed run.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionResults {
    /// One thresholded raster per target that could be scored, in input order.
    Independent {
        targets: Vec<ThresholdedRaster>,
        failures: Vec<TargetFailure>,
    },
    /// Merged label and best-score rasters.
    WinnerTakeAll {
        name: String,
        merged: WinnerTakeAll,
        threshold: f64,
    },
}

impl DetectionResults {
    /// Per-target rasters, empty in winner-take-all mode.
    pub fn targets(&self) -> &[ThresholdedRaster] {
        match self {
            DetectionResults::Independent { targets, .. } => targets,
            DetectionResults::WinnerTakeAll { .. } => &[],
        }
    }

    /// Merged rasters, present only in winner-take-all mode.
    pub fn merged(&self) -> Option<&WinnerTakeAll> {
        match self {
            DetectionResults::Independent { .. } => None,
            DetectionResults::WinnerTakeAll { merged, .. } => Some(merged),
        }
    }

    /// Targets skipped because they could not be resampled or whitened.
    pub fn failures(&self) -> &[TargetFailure] {
        match self {
            DetectionResults::Independent { failures, .. } => failures,
            DetectionResults::WinnerTakeAll { .. } => &[],
        }
    }
}
