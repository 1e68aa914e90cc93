//! Detection algorithms and their per-pixel scorers.

use nalgebra::DMatrix;

use crate::merge::ThresholdDirection;
use crate::signature::ResampledSignature;
use crate::stats::{cem_operator, StatisticsKind, StatisticsSubset};
use crate::util::math::{cos_to_deg, dot, norm};
use crate::util::{SpectralError, SpectralResult};

/// Detection statistic computed per pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Adaptive cosine estimator.
    Ace,
    /// Constrained energy minimisation.
    Cem,
    /// Spectral angle mapper, in degrees.
    Sam,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Ace => "ACE",
            Algorithm::Cem => "CEM",
            Algorithm::Sam => "SAM",
        }
    }

    /// Scene statistics the scorer needs, if any.
    pub fn statistics_kind(self) -> Option<StatisticsKind> {
        match self {
            Algorithm::Ace => Some(StatisticsKind::Covariance),
            Algorithm::Cem => Some(StatisticsKind::SecondMoment),
            Algorithm::Sam => None,
        }
    }

    pub fn direction(self) -> ThresholdDirection {
        match self {
            Algorithm::Ace | Algorithm::Cem => ThresholdDirection::Upper,
            Algorithm::Sam => ThresholdDirection::Lower,
        }
    }

    /// Value written for unselected and degenerate pixels.
    pub fn sentinel(self) -> f32 {
        match self {
            Algorithm::Ace => 0.0,
            Algorithm::Cem => -10.0,
            Algorithm::Sam => 181.0,
        }
    }

    /// Declared bad value of the output raster.
    ///
    /// ACE's sentinel `0.0` is a legitimate score, so ACE declares none.
    pub fn bad_value(self) -> Option<f32> {
        match self {
            Algorithm::Ace => None,
            Algorithm::Cem | Algorithm::Sam => Some(self.sentinel()),
        }
    }

    pub fn default_threshold(self) -> f64 {
        match self {
            Algorithm::Ace => 0.4225,
            Algorithm::Cem => 0.5,
            Algorithm::Sam => 5.0,
        }
    }

    pub fn default_results_name(self) -> &'static str {
        match self {
            Algorithm::Ace => "ACE Results",
            Algorithm::Cem => "CEM Results",
            Algorithm::Sam => "SAM Results",
        }
    }

    /// Starting value of the winner-take-all best-score raster.
    pub fn initial_best(self) -> f32 {
        match self {
            Algorithm::Ace | Algorithm::Cem => 0.0,
            Algorithm::Sam => 180.0,
        }
    }
}

/// Scores one pixel against a fixed target.
///
/// `pixel` holds the cube values at the target's resampled bands, in order.
pub trait PixelScorer: Sync {
    /// Value for pixels that are not scored.
    fn sentinel(&self) -> f32;

    fn score(&self, pixel: &[f64]) -> f32;
}

/// Whitened cosine between the mean-removed pixel and target.
#[derive(Clone, Debug)]
pub struct AceScorer {
    means: Vec<f64>,
    /// Row-major inverse covariance.
    inverse: Vec<f64>,
    /// `(s - μ)ᵗ Σ⁻¹`, so the numerator is a dot product per pixel.
    whitened_target: Vec<f64>,
    target_norm: f64,
}

impl AceScorer {
    pub fn new(signature: &[f64], means: &[f64], inverse: &DMatrix<f64>) -> SpectralResult<Self> {
        let k = check_dims(signature, means, inverse)?;
        let centered: Vec<f64> = signature.iter().zip(means).map(|(s, m)| s - m).collect();
        let inverse = row_major(inverse);
        let whitened_target: Vec<f64> = (0..k)
            .map(|j| (0..k).map(|i| centered[i] * inverse[i * k + j]).sum())
            .collect();
        let energy = dot(&whitened_target, &centered);
        Ok(Self {
            means: means.to_vec(),
            inverse,
            whitened_target,
            target_norm: energy.max(0.0).sqrt(),
        })
    }
}

impl PixelScorer for AceScorer {
    fn sentinel(&self) -> f32 {
        Algorithm::Ace.sentinel()
    }

    fn score(&self, pixel: &[f64]) -> f32 {
        let k = self.means.len();
        let mut numerator = 0.0f64;
        let mut pixel_energy = 0.0f64;
        for i in 0..k {
            let xi = pixel[i] - self.means[i];
            numerator += self.whitened_target[i] * xi;
            let row = &self.inverse[i * k..(i + 1) * k];
            let mut acc = 0.0f64;
            for j in 0..k {
                acc += row[j] * (pixel[j] - self.means[j]);
            }
            pixel_energy += xi * acc;
        }
        let denominator = self.target_norm * pixel_energy.max(0.0).sqrt();
        if !(denominator > f64::EPSILON) {
            return self.sentinel();
        }
        (numerator / denominator) as f32
    }
}

/// Linear filter with unit gain on the target.
#[derive(Clone, Debug)]
pub struct CemScorer {
    operator: Vec<f64>,
}

impl CemScorer {
    pub fn new(signature: &[f64], inverse: &DMatrix<f64>) -> SpectralResult<Self> {
        Ok(Self {
            operator: cem_operator(signature, inverse)?,
        })
    }

    /// The filter `w`, with `wᵗ s = 1`.
    pub fn operator(&self) -> &[f64] {
        &self.operator
    }
}

impl PixelScorer for CemScorer {
    fn sentinel(&self) -> f32 {
        Algorithm::Cem.sentinel()
    }

    fn score(&self, pixel: &[f64]) -> f32 {
        let value = dot(&self.operator, pixel);
        if value.is_finite() {
            value as f32
        } else {
            self.sentinel()
        }
    }
}

/// Angle in degrees between pixel and target.
#[derive(Clone, Debug)]
pub struct SamScorer {
    target: Vec<f64>,
    target_norm: f64,
}

impl SamScorer {
    pub fn new(signature: &[f64]) -> Self {
        Self {
            target: signature.to_vec(),
            target_norm: norm(signature),
        }
    }
}

impl PixelScorer for SamScorer {
    fn sentinel(&self) -> f32 {
        Algorithm::Sam.sentinel()
    }

    fn score(&self, pixel: &[f64]) -> f32 {
        let magnitude = self.target_norm * norm(pixel);
        if magnitude == 0.0 || !magnitude.is_finite() {
            return self.sentinel();
        }
        cos_to_deg(dot(&self.target, pixel) / magnitude) as f32
    }
}

/// Scorer for one target under any algorithm.
#[derive(Clone, Debug)]
pub enum TargetScorer {
    Ace(AceScorer),
    Cem(CemScorer),
    Sam(SamScorer),
}

impl TargetScorer {
    /// Builds the scorer for `signature`; ACE and CEM need `subset`.
    pub fn new(
        algorithm: Algorithm,
        signature: &ResampledSignature,
        subset: Option<&StatisticsSubset<'_>>,
    ) -> SpectralResult<Self> {
        let s = signature.amplitudes();
        let stats = || {
            subset.ok_or(SpectralError::StatisticsUnavailable {
                kind: algorithm
                    .statistics_kind()
                    .map_or("scene", StatisticsKind::as_str),
            })
        };
        Ok(match algorithm {
            Algorithm::Ace => {
                let subset = stats()?;
                TargetScorer::Ace(AceScorer::new(s, subset.means(), subset.inverse())?)
            }
            Algorithm::Cem => {
                TargetScorer::Cem(CemScorer::new(s, stats()?.inverse())?)
            }
            Algorithm::Sam => TargetScorer::Sam(SamScorer::new(s)),
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            TargetScorer::Ace(_) => Algorithm::Ace,
            TargetScorer::Cem(_) => Algorithm::Cem,
            TargetScorer::Sam(_) => Algorithm::Sam,
        }
    }
}

impl PixelScorer for TargetScorer {
    fn sentinel(&self) -> f32 {
        self.algorithm().sentinel()
    }

    #[inline]
    fn score(&self, pixel: &[f64]) -> f32 {
        match self {
            TargetScorer::Ace(s) => s.score(pixel),
            TargetScorer::Cem(s) => s.score(pixel),
            TargetScorer::Sam(s) => s.score(pixel),
        }
    }
}

fn check_dims(signature: &[f64], means: &[f64], inverse: &DMatrix<f64>) -> SpectralResult<usize> {
    let k = signature.len();
    if means.len() != k || inverse.nrows() != k || inverse.ncols() != k {
        return Err(SpectralError::StatisticsMismatch {
            expected: k,
            got: means.len().max(inverse.nrows()),
        });
    }
    Ok(k)
}

fn row_major(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix.transpose().as_slice().to_vec()
}
