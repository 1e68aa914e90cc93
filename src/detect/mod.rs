//! Run controller.
//!
//! A [`Detector`] validates the cube, fetches scene statistics once, then for
//! each target signature resamples it onto the cube's bands, extracts the
//! matching statistics subset, runs the parallel scoring pass and either
//! merges the result into the winner-take-all rasters or keeps it as an
//! independent thresholded raster.
//!
//! In independent mode a target that cannot be resampled or whitened is
//! reported and skipped; in winner-take-all mode it fails the run. Errors
//! from a scoring pass always fail the run, and a raised abort flag ends it
//! with [`RunOutcome::Aborted`] and no rasters.

use std::borrow::Cow;
use std::cell::Cell;

use crate::cube::{CubeAccessor, Roi, UnitKind};
use crate::merge::{ThresholdedRaster, WinnerTakeAll};
use crate::progress::{NullProgress, ProgressSink, Severity};
use crate::resample::{resample_signature, InterpolatingResampler, Resampler};
use crate::score::{score, AbortFlag, Algorithm, PassOutcome, ScoreContext};
use crate::signature::{ResampledSignature, TargetSignature};
use crate::stats::{
    DetectionStatistics, SceneStatistics, StatisticsProvider, StatisticsSubset, SubsetExtractor,
};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{SpectralError, SpectralResult};

mod config;
mod results;

pub use config::{DetectConfig, OutputMode};
pub use results::{DetectionResults, RunOutcome, TargetFailure};

/// Controller state, observable through [`Detector::state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    Resampling { target: usize },
    ExtractingSubset { target: usize },
    Scoring { target: usize },
    Merging { target: usize },
    Finalizing,
    Done,
    Aborted,
    Failed,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Validating => "validating",
            RunState::Resampling { .. } => "resampling",
            RunState::ExtractingSubset { .. } => "extracting_subset",
            RunState::Scoring { .. } => "scoring",
            RunState::Merging { .. } => "merging",
            RunState::Finalizing => "finalizing",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
            RunState::Failed => "failed",
        }
    }
}

enum StatisticsSource<'a> {
    Provider(Box<dyn StatisticsProvider + 'a>),
    Precomputed(DetectionStatistics),
    Missing,
}

struct PreparedTarget<'s> {
    signature: ResampledSignature,
    subset: Option<StatisticsSubset<'s>>,
}

/// Scores a cube against target signatures.
pub struct Detector<'a> {
    cube: &'a dyn CubeAccessor,
    config: DetectConfig,
    roi: Option<Roi>,
    resampler: Option<Box<dyn Resampler + 'a>>,
    statistics: StatisticsSource<'a>,
    progress: &'a dyn ProgressSink,
    abort: AbortFlag,
    state: Cell<RunState>,
}

impl<'a> Detector<'a> {
    /// Creates a detector with the built-in resampler and statistics.
    pub fn new(cube: &'a dyn CubeAccessor) -> Self {
        Self {
            cube,
            config: DetectConfig::default(),
            roi: None,
            resampler: Some(Box::new(InterpolatingResampler::default())),
            statistics: StatisticsSource::Provider(Box::new(SceneStatistics)),
            progress: &NullProgress,
            abort: AbortFlag::new(),
            state: Cell::new(RunState::Idle),
        }
    }

    pub fn with_config(mut self, config: DetectConfig) -> Self {
        self.config = config;
        self
    }

    /// Restricts scoring to a region; output rasters cover its bounding box.
    pub fn with_roi(mut self, roi: Roi) -> Self {
        self.roi = Some(roi);
        self
    }

    pub fn with_resampler<R: Resampler + 'a>(mut self, resampler: R) -> Self {
        self.resampler = Some(Box::new(resampler));
        self
    }

    /// Runs without a resampler; only in-scene signatures can then be used
    /// on cubes with wavelength metadata.
    pub fn without_resampler(mut self) -> Self {
        self.resampler = None;
        self
    }

    pub fn with_statistics_provider<P: StatisticsProvider + 'a>(mut self, provider: P) -> Self {
        self.statistics = StatisticsSource::Provider(Box::new(provider));
        self
    }

    /// Uses statistics computed elsewhere instead of a provider.
    pub fn with_statistics(mut self, statistics: DetectionStatistics) -> Self {
        self.statistics = StatisticsSource::Precomputed(statistics);
        self
    }

    pub fn without_statistics(mut self) -> Self {
        self.statistics = StatisticsSource::Missing;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Shares `abort` with the caller; raising it cancels the current run.
    pub fn with_abort(mut self, abort: AbortFlag) -> Self {
        self.abort = abort;
        self
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    pub fn abort_flag(&self) -> &AbortFlag {
        &self.abort
    }

    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Scores every signature, in order.
    pub fn run(&self, signatures: &[TargetSignature]) -> SpectralResult<RunOutcome> {
        let _span = trace_span!(
            "detect_run",
            algorithm = self.config.algorithm.as_str(),
            signatures = signatures.len()
        )
        .entered();

        self.enter(RunState::Validating);
        let result = self.validate(signatures).and_then(|()| self.execute(signatures));
        match &result {
            Ok(RunOutcome::Completed(_)) => {
                self.progress
                    .report("Detection complete", 100, Severity::Normal);
                self.enter(RunState::Done);
            }
            Ok(RunOutcome::Aborted) => {
                self.progress
                    .report("User aborted the operation.", 0, Severity::Abort);
                self.enter(RunState::Aborted);
            }
            Err(err) => {
                self.progress.report(&err.to_string(), 0, Severity::Error);
                self.enter(RunState::Failed);
            }
        }
        result
    }

    fn enter(&self, state: RunState) {
        self.state.set(state);
        trace_event!("run_state", state = state.as_str());
    }

    fn validate(&self, signatures: &[TargetSignature]) -> SpectralResult<()> {
        let d = self.cube.descriptor();
        if d.encoding.is_complex() {
            return Err(SpectralError::ComplexData);
        }
        if d.rows == 0 || d.columns == 0 || d.bands == 0 {
            return Err(SpectralError::InvalidDimensions {
                rows: d.rows,
                columns: d.columns,
                bands: d.bands,
            });
        }
        if d.bands == 1 {
            return Err(SpectralError::SingleBand);
        }
        if signatures.is_empty() {
            return Err(SpectralError::NoSignatures);
        }
        if d.band_grid.as_ref().is_some_and(|g| g.len() != d.bands) {
            return Err(SpectralError::InvalidCube {
                reason: "band grid length does not match band count",
            });
        }
        if let Some(roi) = &self.roi {
            roi.check_bounds(d.rows, d.columns)?;
        }
        Ok(())
    }

    fn execute(&self, signatures: &[TargetSignature]) -> SpectralResult<RunOutcome> {
        let algorithm = self.config.algorithm;
        self.check_cube_units();
        let statistics = self.fetch_statistics()?;
        let mut extractor = statistics.as_deref().map(SubsetExtractor::new);

        let (rows, columns) = match &self.roi {
            Some(roi) => (roi.rows(), roi.columns()),
            None => (self.cube.descriptor().rows, self.cube.descriptor().columns),
        };
        let count = signatures.len();
        let winner_take_all = self.config.mode == OutputMode::WinnerTakeAll && count > 1;
        let mut merged =
            winner_take_all.then(|| WinnerTakeAll::new(rows, columns, algorithm.initial_best()));
        let policy = self.config.match_policy();
        let mut targets = Vec::new();
        let mut failures = Vec::new();

        for (index, signature) in signatures.iter().enumerate() {
            if self.abort.is_set() {
                return Ok(RunOutcome::Aborted);
            }
            let _span = trace_span!("target", index = index).entered();

            let prepared = match self.prepare(index, signature, extractor.as_mut()) {
                Ok(prepared) => prepared,
                Err(err) => {
                    let err = err.for_target(index, signature.name());
                    if winner_take_all {
                        return Err(err);
                    }
                    self.progress.report(&err.to_string(), 0, Severity::Error);
                    failures.push(TargetFailure {
                        index,
                        name: signature.name().to_owned(),
                        error: err,
                    });
                    continue;
                }
            };

            self.enter(RunState::Scoring { target: index });
            let message = format!(
                "Processing Signature {} of {} : {} running on signature {}",
                index + 1,
                count,
                algorithm.as_str(),
                signature.name()
            );
            let ctx = ScoreContext {
                cube: self.cube,
                roi: self.roi.as_ref(),
                abort: &self.abort,
                progress: self.progress,
                threads: self.config.threads,
                message: &message,
            };
            let outcome = score(
                &ctx,
                algorithm,
                &prepared.signature,
                prepared.subset.as_ref(),
            )
            .map_err(|err| err.for_target(index, signature.name()))?;
            let raster = match outcome {
                PassOutcome::Completed(raster) => raster,
                PassOutcome::Aborted => return Ok(RunOutcome::Aborted),
            };

            self.enter(RunState::Merging { target: index });
            match merged.as_mut() {
                Some(merged) => {
                    merged
                        .merge(index, signature.name(), &raster, &policy)
                        .map_err(|err| err.for_target(index, signature.name()))?;
                }
                None => {
                    let name = self.target_results_name(signature, count);
                    trace_event!(
                        "target_done",
                        index = index,
                        matches = raster.count_matches(policy.threshold, policy.direction)
                    );
                    targets.push(ThresholdedRaster {
                        name,
                        raster,
                        policy,
                    });
                }
            }
        }

        self.enter(RunState::Finalizing);
        if let Some(merged) = merged {
            return Ok(RunOutcome::Completed(DetectionResults::WinnerTakeAll {
                name: self.config.effective_results_name().to_owned(),
                merged,
                threshold: policy.threshold,
            }));
        }
        if targets.is_empty() {
            return Err(SpectralError::ResultsUnavailable {
                reason: format!("none of the {count} signatures could be processed"),
            });
        }
        Ok(RunOutcome::Completed(DetectionResults::Independent {
            targets,
            failures,
        }))
    }

    /// CEM expects reflectance; other declared cube units only earn a warning.
    fn check_cube_units(&self) {
        if self.config.algorithm != Algorithm::Cem {
            return;
        }
        let units = self.cube.descriptor().units;
        if units.is_some_and(|units| units.kind != UnitKind::Reflectance) {
            trace_warn!("non_reflectance_cube", algorithm = self.config.algorithm.as_str());
            self.progress.report(
                "The cube does not contain reflectance data.",
                0,
                Severity::Warning,
            );
        }
    }

    /// Statistics for the run's algorithm, checked against the band count.
    fn fetch_statistics(&self) -> SpectralResult<Option<Cow<'_, DetectionStatistics>>> {
        let Some(kind) = self.config.algorithm.statistics_kind() else {
            return Ok(None);
        };
        let bands = self.cube.descriptor().bands;
        let statistics = match &self.statistics {
            StatisticsSource::Precomputed(stats) if stats.kind() == kind => Cow::Borrowed(stats),
            StatisticsSource::Provider(provider) => {
                self.progress.report(
                    &format!("Calculating {} statistics", kind.as_str()),
                    0,
                    Severity::Normal,
                );
                let roi = if self.config.roi_statistics {
                    self.roi.as_ref()
                } else {
                    None
                };
                Cow::Owned(provider.statistics(self.cube, roi, kind)?)
            }
            StatisticsSource::Precomputed(_) | StatisticsSource::Missing => {
                return Err(SpectralError::StatisticsUnavailable {
                    kind: kind.as_str(),
                });
            }
        };
        if statistics.dim() != bands {
            return Err(SpectralError::StatisticsMismatch {
                expected: bands,
                got: statistics.dim(),
            });
        }
        trace_event!("statistics_ready", bands = bands);
        Ok(Some(statistics))
    }

    fn prepare<'s>(
        &self,
        index: usize,
        signature: &TargetSignature,
        extractor: Option<&mut SubsetExtractor<'s>>,
    ) -> SpectralResult<PreparedTarget<'s>> {
        self.enter(RunState::Resampling { target: index });
        let d = self.cube.descriptor();
        let resampled = resample_signature(
            signature,
            d.band_grid.as_ref(),
            d.bands,
            self.resampler.as_deref(),
        )?;
        if let Some(warning) = resampled.coverage_warning() {
            trace_warn!(
                "partial_coverage",
                covered = resampled.signature.len(),
                bands = d.bands
            );
            self.progress.report(&warning, 0, Severity::Warning);
        }
        let aligned = self.scale_to_cube_units(signature, resampled.signature);

        self.enter(RunState::ExtractingSubset { target: index });
        let subset = extractor
            .map(|extractor| extractor.extract(aligned.bands()))
            .transpose()?;
        Ok(PreparedTarget {
            signature: aligned,
            subset,
        })
    }

    /// Rescales signature amplitudes into the cube's units.
    fn scale_to_cube_units(
        &self,
        signature: &TargetSignature,
        resampled: ResampledSignature,
    ) -> ResampledSignature {
        let (Some(signature_units), Some(cube_units)) =
            (signature.units(), self.cube.descriptor().units)
        else {
            return resampled;
        };
        if signature_units.kind != cube_units.kind {
            let warning = format!(
                "The spectrum and data have different units. {} detections will be unpredictable.",
                self.config.algorithm.as_str()
            );
            self.progress.report(&warning, 0, Severity::Warning);
        }
        let ratio = if cube_units.scale_from_standard != 0.0 {
            signature_units.scale_from_standard / cube_units.scale_from_standard
        } else {
            1.0
        };
        if ratio == 1.0 {
            resampled
        } else {
            resampled.scaled(ratio)
        }
    }

    fn target_results_name(&self, signature: &TargetSignature, count: usize) -> String {
        let base = self.config.effective_results_name();
        if count > 1 {
            format!("{base} {}", signature.name())
        } else {
            base.to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DetectConfig, Detector, OutputMode, RunState};
    use crate::cube::{BandGrid, Cube, UnitKind, Units};
    use crate::score::Algorithm;
    use crate::signature::TargetSignature;
    use crate::util::SpectralError;

    fn cube() -> Cube<f32> {
        // 2 rows x 2 columns x 3 bands
        let data = vec![
            1.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0, 1.0, 1.0, 0.0,
        ];
        Cube::new(data, 2, 2, 3).unwrap()
    }

    #[test]
    fn single_band_cube_fails_validation() {
        let cube = Cube::new(vec![1.0f32; 4], 2, 2, 1).unwrap();
        let detector = Detector::new(&cube).with_config(DetectConfig::new(Algorithm::Sam));
        let err = detector
            .run(&[TargetSignature::in_scene("a", vec![1.0])])
            .unwrap_err();
        assert_eq!(err, SpectralError::SingleBand);
        assert_eq!(detector.state(), RunState::Failed);
    }

    #[test]
    fn empty_signature_list_is_rejected() {
        let cube = cube();
        let err = Detector::new(&cube).run(&[]).unwrap_err();
        assert_eq!(err, SpectralError::NoSignatures);
    }

    #[test]
    fn independent_failure_skips_target() {
        let cube = cube();
        let signatures = [
            TargetSignature::new("library", vec![0.4, 0.5, 0.6], vec![1.0, 0.0, 0.0]),
            TargetSignature::in_scene("pixel", vec![1.0, 0.0, 0.0]),
        ];
        let outcome = Detector::new(&cube)
            .with_config(DetectConfig::new(Algorithm::Sam))
            .run(&signatures)
            .unwrap();
        let results = outcome.results().unwrap();
        assert_eq!(results.targets().len(), 1);
        assert_eq!(results.targets()[0].name, "SAM Results pixel");
        assert_eq!(results.failures()[0].index, 0);
        assert_eq!(results.failures()[0].error.root(), &SpectralError::InvalidWavelengths);
    }

    #[test]
    fn winner_take_all_failure_fails_run() {
        let cube = cube();
        let signatures = [
            TargetSignature::in_scene("pixel", vec![1.0, 0.0, 0.0]),
            TargetSignature::new("library", vec![0.4, 0.5, 0.6], vec![1.0, 0.0, 0.0]),
        ];
        let err = Detector::new(&cube)
            .with_config(DetectConfig::new(Algorithm::Sam).with_mode(OutputMode::WinnerTakeAll))
            .run(&signatures)
            .unwrap_err();
        assert!(matches!(err, SpectralError::Target { index: 1, .. }));
    }

    #[test]
    fn signature_is_scaled_into_cube_units() {
        let grid = BandGrid::new(vec![0.4, 0.5, 0.6], Vec::new()).unwrap();
        let cube = cube()
            .with_band_grid(grid)
            .unwrap()
            .with_units(Units::new(UnitKind::Reflectance, 10.0));
        let signature = TargetSignature::new("lib", vec![0.4, 0.5, 0.6], vec![10.0, 0.0, 0.0])
            .with_units(Units::new(UnitKind::Reflectance, 1.0));
        let detector = Detector::new(&cube);
        let scaled = detector.scale_to_cube_units(
            &signature,
            crate::signature::ResampledSignature::new(vec![10.0, 0.0, 0.0], vec![0, 1, 2], 3)
                .unwrap(),
        );
        assert_eq!(scaled.amplitudes(), &[1.0, 0.0, 0.0]);
    }
}
