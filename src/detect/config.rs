//! Run configuration.

use crate::merge::MatchPolicy;
use crate::score::Algorithm;

/// How results of several targets are returned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// One thresholded raster per target.
    #[default]
    Independent,
    /// One label raster naming the best matching target per pixel.
    ///
    /// Runs with a single target fall back to [`OutputMode::Independent`].
    WinnerTakeAll,
}

/// Configuration for [`Detector`](crate::Detector) runs.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectConfig {
    pub algorithm: Algorithm,
    /// Match threshold; `None` uses the algorithm default.
    pub threshold: Option<f64>,
    pub mode: OutputMode,
    /// Worker threads per scoring pass; 0 uses every available core.
    pub threads: usize,
    /// Base name of the output rasters; `None` uses the algorithm default.
    pub results_name: Option<String>,
    /// Compute scene statistics over the region of interest instead of the
    /// whole cube.
    pub roi_statistics: bool,
}

impl DetectConfig {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            threshold: None,
            mode: OutputMode::Independent,
            threads: 0,
            results_name: None,
            roi_statistics: false,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_results_name(mut self, name: impl Into<String>) -> Self {
        self.results_name = Some(name.into());
        self
    }

    /// Threshold in effect for this run.
    pub fn effective_threshold(&self) -> f64 {
        self.threshold
            .unwrap_or_else(|| self.algorithm.default_threshold())
    }

    /// Base results name in effect for this run.
    pub fn effective_results_name(&self) -> &str {
        match &self.results_name {
            Some(name) if !name.is_empty() => name,
            _ => self.algorithm.default_results_name(),
        }
    }

    /// Threshold test for this run's scores.
    pub fn match_policy(&self) -> MatchPolicy {
        MatchPolicy::new(self.effective_threshold(), self.algorithm.direction())
            .with_bad_value(self.algorithm.bad_value())
    }
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self::new(Algorithm::Ace)
    }
}
