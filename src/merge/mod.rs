//! Thresholding and multi-target merging of score rasters.
//!
//! In independent mode every target keeps its own raster and a threshold.
//! In winner-take-all mode [`WinnerTakeAll`] folds each target's raster into
//! one label raster and one best-score raster, in target order, on the
//! calling thread.

use crate::score::ScoreRaster;
use crate::trace::trace_event;
use crate::util::{SpectralError, SpectralResult};

/// Which side of the threshold counts as a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdDirection {
    /// `score >= threshold` matches; larger is better.
    Upper,
    /// `score <= threshold` matches; smaller is better.
    Lower,
}

impl ThresholdDirection {
    /// Returns true when `score` lies on the matching side of `threshold`.
    #[inline]
    pub fn passes(self, score: f64, threshold: f64) -> bool {
        match self {
            ThresholdDirection::Upper => score >= threshold,
            ThresholdDirection::Lower => score <= threshold,
        }
    }

    /// Returns true when `candidate` is strictly better than `current`.
    #[inline]
    pub fn more_extreme(self, candidate: f32, current: f32) -> bool {
        match self {
            ThresholdDirection::Upper => candidate > current,
            ThresholdDirection::Lower => candidate < current,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThresholdDirection::Upper => "upper",
            ThresholdDirection::Lower => "lower",
        }
    }
}

/// Threshold test for one target's scores.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchPolicy {
    pub threshold: f64,
    pub direction: ThresholdDirection,
    /// Scores equal to this value are never matches.
    pub bad_value: Option<f32>,
}

impl MatchPolicy {
    pub fn new(threshold: f64, direction: ThresholdDirection) -> Self {
        Self {
            threshold,
            direction,
            bad_value: None,
        }
    }

    pub fn with_bad_value(mut self, bad_value: Option<f32>) -> Self {
        self.bad_value = bad_value;
        self
    }

    /// Returns true for valid scores on the matching side of the threshold.
    #[inline]
    pub fn is_match(&self, score: f32) -> bool {
        if score.is_nan() || self.bad_value == Some(score) {
            return false;
        }
        self.direction.passes(f64::from(score), self.threshold)
    }
}

/// Folds one target's scores into the label and best-score arrays.
///
/// A pixel moves to `label` when its score matches `policy` and is strictly
/// more extreme than the stored best. Returns the number of pixels won.
pub fn merge_winner(
    labels: &mut [u32],
    best: &mut [f32],
    scores: &[f32],
    policy: &MatchPolicy,
    label: u32,
) -> usize {
    let mut won = 0usize;
    for ((l, b), &score) in labels.iter_mut().zip(best.iter_mut()).zip(scores) {
        if policy.is_match(score) && policy.direction.more_extreme(score, *b) {
            *l = label;
            *b = score;
            won += 1;
        }
    }
    won
}

/// Label and best-score rasters of a winner-take-all run.
///
/// Label `0` means no target matched; label `i + 1` is target `i`.
#[derive(Clone, Debug, PartialEq)]
pub struct WinnerTakeAll {
    rows: usize,
    columns: usize,
    labels: Vec<u32>,
    best: Vec<f32>,
    names: Vec<String>,
}

impl WinnerTakeAll {
    /// Allocates rasters with every label at 0 and every best at `initial_best`.
    pub fn new(rows: usize, columns: usize, initial_best: f32) -> Self {
        let len = rows * columns;
        Self {
            rows,
            columns,
            labels: vec![0; len],
            best: vec![initial_best; len],
            names: Vec::new(),
        }
    }

    /// Merges the raster of target `index` (zero-based).
    pub fn merge(
        &mut self,
        index: usize,
        name: &str,
        scores: &ScoreRaster,
        policy: &MatchPolicy,
    ) -> SpectralResult<usize> {
        if scores.rows() != self.rows || scores.columns() != self.columns {
            return Err(SpectralError::ResultsUnavailable {
                reason: format!(
                    "score raster is {}x{}, merge rasters are {}x{}",
                    scores.rows(),
                    scores.columns(),
                    self.rows,
                    self.columns
                ),
            });
        }
        let label = u32::try_from(index + 1).map_err(|_| SpectralError::ResultsUnavailable {
            reason: format!("target index {index} does not fit a label"),
        })?;
        let won = merge_winner(
            &mut self.labels,
            &mut self.best,
            scores.as_slice(),
            policy,
            label,
        );
        if self.names.len() <= index {
            self.names.resize(index + 1, String::new());
        }
        self.names[index] = name.to_owned();
        trace_event!("merge", label = label, won = won);
        Ok(won)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Row-major winner labels.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Row-major best scores.
    pub fn best(&self) -> &[f32] {
        &self.best
    }

    /// Target names indexed by `label - 1`.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name of the target behind `label`, `None` for label 0.
    pub fn label_name(&self, label: u32) -> Option<&str> {
        let index = (label as usize).checked_sub(1)?;
        self.names.get(index).map(String::as_str)
    }

    /// Pixel count per label, index 0 counting unmatched pixels.
    pub fn histogram(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.names.len() + 1];
        for &label in &self.labels {
            let slot = label as usize;
            if slot >= counts.len() {
                counts.resize(slot + 1, 0);
            }
            counts[slot] += 1;
        }
        counts
    }
}

/// One target's score raster with the threshold it is displayed at.
#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdedRaster {
    pub name: String,
    pub raster: ScoreRaster,
    pub policy: MatchPolicy,
}

impl ThresholdedRaster {
    /// Returns whether the pixel at raster-relative `(row, column)` matches.
    pub fn is_match(&self, row: usize, column: usize) -> bool {
        self.raster
            .get(row, column)
            .is_some_and(|score| self.policy.is_match(score))
    }

    /// Number of matching pixels.
    pub fn match_count(&self) -> usize {
        self.raster
            .as_slice()
            .iter()
            .filter(|&&score| self.policy.is_match(score))
            .count()
    }

    /// Row-major match mask.
    pub fn mask(&self) -> Vec<bool> {
        self.raster
            .as_slice()
            .iter()
            .map(|&score| self.policy.is_match(score))
            .collect()
    }
}
