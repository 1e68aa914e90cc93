//! Parallel per-pixel scoring of one target.
//!
//! [`score`] splits the rows of the cube (or region) into contiguous
//! [`RowRange`]s, hands each worker its range plus a disjoint mutable slice of
//! the output raster, and runs the algorithm's [`PixelScorer`] on every
//! selected pixel. Workers poll the [`AbortFlag`] once per row. A worker that
//! cannot read its rows leaves them at the sentinel and reports back; the
//! driver turns that into an error after all workers have joined.

use std::ops::Range;

use crate::cube::{CubeAccessor, Roi};
use crate::progress::{ProgressSink, WorkerProgress};
use crate::signature::ResampledSignature;
use crate::stats::StatisticsSubset;
use crate::trace::{trace_event, trace_span};
use crate::util::{SpectralError, SpectralResult};

mod algorithm;
mod partition;
mod raster;

pub use algorithm::{AceScorer, Algorithm, CemScorer, PixelScorer, SamScorer, TargetScorer};
pub use partition::{partition_rows, thread_count, AbortFlag, RowRange};
pub use raster::ScoreRaster;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Shared inputs of a scoring pass.
#[derive(Clone, Copy)]
pub struct ScoreContext<'a> {
    pub cube: &'a dyn CubeAccessor,
    pub roi: Option<&'a Roi>,
    pub abort: &'a AbortFlag,
    pub progress: &'a dyn ProgressSink,
    /// Requested worker count; 0 uses every available core.
    pub threads: usize,
    /// Progress message shown while the pass runs.
    pub message: &'a str,
}

/// Result of a scoring pass.
#[derive(Clone, Debug, PartialEq)]
pub enum PassOutcome {
    Completed(ScoreRaster),
    Aborted,
}

enum WorkerStatus {
    Done,
    Aborted,
    Failed(SpectralError),
}

/// Scores every pixel of the context's cube or region against `signature`.
pub fn score(
    ctx: &ScoreContext<'_>,
    algorithm: Algorithm,
    signature: &ResampledSignature,
    subset: Option<&StatisticsSubset<'_>>,
) -> SpectralResult<PassOutcome> {
    let scorer = TargetScorer::new(algorithm, signature, subset)?;
    run_pass(ctx, signature.bands(), &scorer, algorithm.bad_value())
}

/// Runs `scorer` over the context's region using the cube bands in `bands`.
pub fn run_pass<S: PixelScorer>(
    ctx: &ScoreContext<'_>,
    bands: &[usize],
    scorer: &S,
    bad_value: Option<f32>,
) -> SpectralResult<PassOutcome> {
    let d = ctx.cube.descriptor();
    if let Some(&band) = bands.iter().find(|&&b| b >= d.bands) {
        return Err(SpectralError::StatisticsMismatch {
            expected: d.bands,
            got: band + 1,
        });
    }
    let region = Region::new(ctx.cube, ctx.roi)?;

    let mut raster = ScoreRaster::filled(
        region.rows,
        region.columns.len(),
        (region.row, region.columns.start),
        scorer.sentinel(),
        bad_value,
    );
    let ranges = partition_rows(region.rows, thread_count(ctx.threads, region.rows));
    let _span = trace_span!(
        "score_pass",
        rows = region.rows,
        columns = region.columns.len(),
        workers = ranges.len()
    )
    .entered();

    let progress = WorkerProgress::new(ctx.progress, ctx.message, ranges.len());
    let width = region.columns.len();
    let mut jobs = Vec::with_capacity(ranges.len());
    let mut rest = raster.as_mut_slice();
    for (worker, range) in ranges.iter().copied().enumerate() {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len() * width);
        jobs.push((worker, range, head));
        rest = tail;
    }

    let worker = |(worker, range, out): (usize, RowRange, &mut [f32])| {
        score_rows(ctx, &region, bands, scorer, &progress, worker, range, out)
    };
    let statuses = run_workers(jobs.len(), jobs, worker)?;

    let mut aborted = ctx.abort.is_set();
    let mut failure = None;
    for status in statuses {
        match status {
            WorkerStatus::Done => {}
            WorkerStatus::Aborted => aborted = true,
            WorkerStatus::Failed(err) => {
                failure.get_or_insert(err);
            }
        }
    }
    if aborted {
        trace_event!("score_pass_aborted", workers = ranges.len());
        return Ok(PassOutcome::Aborted);
    }
    if let Some(err) = failure {
        return Err(SpectralError::ResultsUnavailable {
            reason: err.to_string(),
        });
    }
    trace_event!("score_pass_done", pixels = raster.as_slice().len());
    Ok(PassOutcome::Completed(raster))
}

/// Cube rows and columns covered by the output raster.
struct Region<'a> {
    row: usize,
    rows: usize,
    columns: Range<usize>,
    roi: Option<&'a Roi>,
}

impl<'a> Region<'a> {
    fn new(cube: &dyn CubeAccessor, roi: Option<&'a Roi>) -> SpectralResult<Self> {
        let d = cube.descriptor();
        match roi {
            Some(roi) => {
                roi.check_bounds(d.rows, d.columns)?;
                let start = roi.column_offset();
                Ok(Self {
                    row: roi.row_offset(),
                    rows: roi.rows(),
                    columns: start..start + roi.columns(),
                    roi: (!roi.is_rectangular()).then_some(roi),
                })
            }
            None => Ok(Self {
                row: 0,
                rows: d.rows,
                columns: 0..d.columns,
                roi: None,
            }),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn score_rows<S: PixelScorer>(
    ctx: &ScoreContext<'_>,
    region: &Region<'_>,
    bands: &[usize],
    scorer: &S,
    progress: &WorkerProgress<'_>,
    worker: usize,
    range: RowRange,
    out: &mut [f32],
) -> WorkerStatus {
    let num_bands = ctx.cube.descriptor().bands;
    let width = region.columns.len();
    let sentinel = scorer.sentinel();
    let mut samples = vec![0.0f64; width * num_bands];
    let mut pixel = vec![0.0f64; bands.len()];

    for (row, out_row) in (range.first..=range.last).zip(out.chunks_exact_mut(width)) {
        progress.update(worker, range.percent_at(row));
        if ctx.abort.is_set() {
            return WorkerStatus::Aborted;
        }
        let cube_row = region.row + row;
        if let Err(err) = ctx
            .cube
            .read_row(cube_row, region.columns.clone(), &mut samples)
        {
            return WorkerStatus::Failed(err);
        }
        for (column, value) in out_row.iter_mut().enumerate() {
            if region.roi.is_some_and(|roi| !roi.contains(row, column)) {
                *value = sentinel;
                continue;
            }
            let px = &samples[column * num_bands..(column + 1) * num_bands];
            for (dst, &band) in pixel.iter_mut().zip(bands) {
                *dst = px[band];
            }
            *value = scorer.score(&pixel);
        }
    }
    progress.update(worker, 100);
    WorkerStatus::Done
}

type Job<'a> = (usize, RowRange, &'a mut [f32]);

#[cfg(feature = "rayon")]
fn run_workers<'a, F>(
    threads: usize,
    jobs: Vec<Job<'a>>,
    worker: F,
) -> SpectralResult<Vec<WorkerStatus>>
where
    F: Fn(Job<'a>) -> WorkerStatus + Sync + Send,
{
    if threads <= 1 {
        return Ok(jobs.into_iter().map(worker).collect());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|err| SpectralError::ThreadPool {
            reason: err.to_string(),
        })?;
    Ok(pool.install(|| jobs.into_par_iter().map(&worker).collect()))
}

#[cfg(not(feature = "rayon"))]
fn run_workers<'a, F>(
    _threads: usize,
    jobs: Vec<Job<'a>>,
    worker: F,
) -> SpectralResult<Vec<WorkerStatus>>
where
    F: Fn(Job<'a>) -> WorkerStatus,
{
    Ok(jobs.into_iter().map(worker).collect())
}
