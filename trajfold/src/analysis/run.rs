//! Orchestration of one block-parallel analysis run.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, instrument, warn};

use super::context::RunContext;
use super::traits::{Combine, ParallelAnalysis};
use crate::config::RunConfig;
use crate::error::{TrajError, TrajResult};
use crate::logging::LogConfig;
use crate::partition::{BlockSlice, PartitionPlan};
use crate::pool::{gather, Job, TokioPool, WorkerPool};
use crate::sources::{FrameLike, FrameReader, FrameSource};
use crate::timing::{BlockReport, BlockTiming, RunTimings, Timer};

/// Lifecycle phase of an [`AnalysisRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunPhase {
    Created,
    Prepared,
    Running,
    Reduced,
    Concluded,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Prepared => "prepared",
            Self::Running => "running",
            Self::Reduced => "reduced",
            Self::Concluded => "concluded",
        };
        f.write_str(name)
    }
}

/// What a block task sends back to the run.
pub type BlockOutcome<P> = TrajResult<BlockReport<P>>;

struct Prepared<St> {
    state: Arc<St>,
    plan: Arc<PartitionPlan>,
    context: RunContext,
}

/// Drives a [`ParallelAnalysis`] over a [`FrameSource`].
///
/// The run moves through `created -> prepared -> running -> reduced ->
/// concluded`. Each step can also be driven individually, which is what
/// [`AnalysisRun::run`] does in order. A failure in any block discards every
/// partial result and returns the run to `created`.
///
/// # Example
///
/// ```rust
/// use trajfold::prelude::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> TrajResult<()> {
/// let positions = (0..8).map(|i| vec![[i as f64, 0.0, 0.0]]).collect();
/// let traj = InMemoryTrajectory::new(positions, 1.0)?;
///
/// let mut run = AnalysisRun::new(
///     PositionFluctuation::all_atoms(),
///     traj,
///     RunConfig::new().with_n_blocks(3),
/// );
/// let result = run.run(&TokioPool::new(Some(2))?).await?;
/// assert_eq!(result.n_frames, 8);
/// assert!((result.mean_positions[0][0] - 3.5).abs() < 1e-12);
/// # Ok(())
/// # }
/// ```
pub struct AnalysisRun<A, S>
where
    A: ParallelAnalysis<S>,
    S: FrameSource,
{
    analysis: Arc<A>,
    source: Arc<S>,
    config: RunConfig,
    log_config: LogConfig,
    phase: RunPhase,
    prepared: Option<Prepared<A::State>>,
    reports: Vec<BlockReport<A::Partial>>,
    folded: Option<A::Partial>,
    output: Option<A::Output>,
    timings: RunTimings,
}

impl<A, S> AnalysisRun<A, S>
where
    A: ParallelAnalysis<S>,
    S: FrameSource,
{
    /// Creates a run in the `created` phase.
    pub fn new(analysis: A, source: S, config: RunConfig) -> Self {
        Self {
            analysis: Arc::new(analysis),
            source: Arc::new(source),
            config,
            log_config: LogConfig::default(),
            phase: RunPhase::Created,
            prepared: None,
            reports: Vec::new(),
            folded: None,
            output: None,
            timings: RunTimings::default(),
        }
    }

    /// Sets the logging verbosity.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn analysis(&self) -> &A {
        &self.analysis
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Resolves the frame selection, builds the partition plan and lets the
    /// analysis prepare its state.
    ///
    /// # Errors
    ///
    /// [`TrajError::InvalidState`] unless the run is `created`;
    /// [`TrajError::InvalidArgument`] for a bad selection or an explicit block
    /// count larger than the number of selected frames; anything the
    /// analysis' own `prepare` returns.
    #[instrument(skip(self), fields(analysis = %self.analysis.name()))]
    pub fn prepare(&mut self) -> TrajResult<()> {
        if self.phase != RunPhase::Created {
            return Err(TrajError::invalid_state("prepare", self.phase));
        }
        self.timings = RunTimings::default();
        self.timings.record_start();
        let timer = Timer::start();

        self.config.validate()?;
        let total = self.source.n_frames();
        let range = self.config.frames.resolve(total)?;
        let n_blocks = self.resolve_n_blocks(range.n_frames);
        let plan = PartitionPlan::balanced(
            range.n_frames,
            n_blocks,
            Some(range.start),
            Some(range.stop),
            Some(range.step),
        )?;
        let state = self.analysis.prepare(self.source.as_ref())?;

        let context = RunContext::new(
            range,
            plan.len(),
            plan.frames(total),
            self.source.start_time(),
            self.source.dt(),
        );

        info!(
            n_frames = range.n_frames,
            n_blocks = plan.len(),
            start = range.start,
            stop = range.stop,
            step = range.step,
            "Prepared analysis run"
        );

        self.prepared = Some(Prepared {
            state: Arc::new(state),
            plan: Arc::new(plan),
            context,
        });
        self.phase = RunPhase::Prepared;
        self.timings.prepare = timer.elapsed();
        Ok(())
    }

    fn resolve_n_blocks(&self, n_frames: usize) -> usize {
        match self.config.n_blocks {
            Some(n_blocks) => n_blocks,
            None => {
                let available = num_cpus::get();
                let n_blocks = available.min(n_frames).max(1);
                if n_blocks < available {
                    warn!(
                        available,
                        n_blocks, n_frames, "Fewer frames than workers, using fewer blocks"
                    );
                }
                n_blocks
            }
        }
    }

    /// Runs one task per block on `pool` and waits for all of them.
    ///
    /// Each task opens its own reader, visits its frames in increasing order
    /// and folds the per-frame partials. On failure the run returns to
    /// `created` and the error is a [`TrajError::AnalysisFailed`] naming the
    /// block.
    #[instrument(skip(self, pool), fields(analysis = %self.analysis.name(), pool = pool.name()))]
    pub async fn execute<W>(&mut self, pool: &W) -> TrajResult<()>
    where
        W: WorkerPool<BlockOutcome<A::Partial>> + ?Sized,
    {
        if self.phase != RunPhase::Prepared {
            return Err(TrajError::invalid_state("execute", self.phase));
        }
        let Some(prepared) = self.prepared.as_ref() else {
            return Err(TrajError::invalid_state("execute", self.phase));
        };
        let plan = Arc::clone(&prepared.plan);
        let state = Arc::clone(&prepared.state);
        self.phase = RunPhase::Running;
        let timer = Timer::start();

        info!(n_blocks = plan.len(), "Dispatching block tasks");

        let tasks = plan.iter().map(|(block_index, &block)| {
            let analysis = Arc::clone(&self.analysis);
            let source = Arc::clone(&self.source);
            let state = Arc::clone(&state);
            let log_config = self.log_config.clone();
            let span = info_span!("block", block_index, %block);

            let job: Job<BlockOutcome<A::Partial>> = Box::new(move || {
                let _entered = span.enter();
                run_block(&*analysis, &*source, &*state, block_index, block, &log_config)
            });

            pool.submit(job).map(move |outcome| {
                outcome.and_then(|report| report).map_err(|cause| {
                    error!(block_index, %block, error = %cause, "Block task failed");
                    TrajError::analysis_failed(block_index, block, cause)
                })
            })
        });

        let result = gather(tasks).await;
        match result {
            Ok(reports) => {
                for timing in reports.iter().map(|report| &report.timing) {
                    crate::log_perf!(
                        self.log_config,
                        block_index = timing.block_index,
                        n_frames = timing.n_frames,
                        compute_ms = timing.compute.as_secs_f64() * 1000.0,
                        io_ms = timing.io_wait.as_secs_f64() * 1000.0,
                        "Block timing"
                    );
                }
                self.timings.blocks = reports.iter().map(|report| report.timing).collect();
                self.timings.wait = timer.elapsed();
                self.reports = reports;

                if self.log_config.log_timings {
                    info!(
                        wait_ms = self.timings.wait.as_secs_f64() * 1000.0,
                        compute_ms = self.timings.compute_total().as_secs_f64() * 1000.0,
                        io_ms = self.timings.io_total().as_secs_f64() * 1000.0,
                        "All block tasks finished"
                    );
                } else {
                    info!("All block tasks finished");
                }
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Analysis run failed, discarding partial results");
                self.reset();
                Err(err)
            }
        }
    }

    /// Folds the block partials in ascending block order.
    #[instrument(skip(self), fields(analysis = %self.analysis.name()))]
    pub fn reduce(&mut self) -> TrajResult<()> {
        if self.phase != RunPhase::Running || self.prepared.is_none() {
            return Err(TrajError::invalid_state("reduce", self.phase));
        }
        let timer = Timer::start();

        let reports = std::mem::take(&mut self.reports);
        let n_partials = reports.len();
        let folded = reports
            .into_iter()
            .try_fold(<A::Partial as Combine>::empty(), |acc, report| {
                self.analysis.combine(acc, report.partial)
            });

        match folded {
            Ok(folded) => {
                self.folded = Some(folded);
                self.phase = RunPhase::Reduced;
                self.timings.reduce = timer.elapsed();
                debug!(n_partials, "Reduced block partials");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Failed to combine block partials");
                self.reset();
                Err(err)
            }
        }
    }

    /// Turns the folded partial into the analysis result.
    ///
    /// Calling it a second time fails with [`TrajError::InvalidState`]; the
    /// result stays available through [`AnalysisRun::output`].
    #[instrument(skip(self), fields(analysis = %self.analysis.name()))]
    pub fn conclude(&mut self) -> TrajResult<&A::Output> {
        if self.phase != RunPhase::Reduced {
            return Err(TrajError::invalid_state("conclude", self.phase));
        }
        let timer = Timer::start();

        let folded = self
            .folded
            .take()
            .ok_or_else(|| TrajError::invalid_state("conclude", self.phase))?;
        let prepared = self
            .prepared
            .as_ref()
            .ok_or_else(|| TrajError::invalid_state("conclude", self.phase))?;

        match self
            .analysis
            .conclude(folded, &prepared.state, &prepared.context)
        {
            Ok(output) => {
                self.phase = RunPhase::Concluded;
                self.timings.conclude = timer.elapsed();
                self.timings.record_end();
                if let Some(total) = self.timings.total() {
                    info!(
                        "Analysis completed in {:.3}s",
                        total.num_milliseconds() as f64 / 1000.0
                    );
                }
                Ok(self.output.insert(output))
            }
            Err(err) => {
                error!(error = %err, "Failed to conclude analysis");
                self.reset();
                Err(err)
            }
        }
    }

    /// Prepares, executes, reduces and concludes on `pool`.
    pub async fn run<W>(&mut self, pool: &W) -> TrajResult<&A::Output>
    where
        W: WorkerPool<BlockOutcome<A::Partial>> + ?Sized,
    {
        self.prepare()?;
        self.execute(pool).await?;
        self.reduce()?;
        self.conclude()
    }

    /// Like [`AnalysisRun::run`] on a [`TokioPool`] sized from the configuration.
    pub async fn run_parallel(&mut self) -> TrajResult<&A::Output> {
        let pool = TokioPool::new(self.config.max_workers)?;
        self.run(&pool).await
    }

    /// The concluded result, if any.
    pub fn output(&self) -> Option<&A::Output> {
        self.output.as_ref()
    }

    pub fn into_output(self) -> Option<A::Output> {
        self.output
    }

    /// The partition plan, once prepared.
    pub fn plan(&self) -> Option<&PartitionPlan> {
        self.prepared.as_ref().map(|p| p.plan.as_ref())
    }

    /// Frame bookkeeping, once prepared.
    pub fn context(&self) -> Option<&RunContext> {
        self.prepared.as_ref().map(|p| &p.context)
    }

    /// Selected absolute frame indices.
    pub fn frames(&self) -> TrajResult<&[usize]> {
        self.context()
            .map(|context| context.frames.as_slice())
            .ok_or_else(|| TrajError::invalid_state("read frames", self.phase))
    }

    /// Times of the selected frames.
    pub fn times(&self) -> TrajResult<&[f64]> {
        self.context()
            .map(|context| context.times.as_slice())
            .ok_or_else(|| TrajError::invalid_state("read times", self.phase))
    }

    pub fn timings(&self) -> &RunTimings {
        &self.timings
    }

    fn reset(&mut self) {
        self.phase = RunPhase::Created;
        self.prepared = None;
        self.reports.clear();
        self.folded = None;
        self.timings.blocks.clear();
    }
}

impl<A, S> fmt::Debug for AnalysisRun<A, S>
where
    A: ParallelAnalysis<S>,
    S: FrameSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRun")
            .field("analysis", &self.analysis.name())
            .field("phase", &self.phase)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn run_block<A, S>(
    analysis: &A,
    source: &S,
    state: &A::State,
    block_index: usize,
    block: BlockSlice,
    log_config: &LogConfig,
) -> BlockOutcome<A::Partial>
where
    A: ParallelAnalysis<S>,
    S: FrameSource,
{
    let timer = Timer::start();
    crate::log_block!(log_config, block_index, %block, "Starting block");

    let io = Timer::start();
    let mut reader = source.open()?;
    let mut frames = reader.read_block(&block)?;
    let mut io_wait = io.elapsed();

    let mut partial = <A::Partial as Combine>::empty();
    let mut previous: Option<usize> = None;
    let mut n_frames = 0;

    loop {
        let io = Timer::start();
        let next = frames.next();
        io_wait += io.elapsed();
        let Some(frame) = next else {
            break;
        };
        let frame = frame?;

        let index = frame.index();
        if !block.contains(index) {
            return Err(TrajError::frame(format!(
                "reader yielded frame {index}, which is outside block {block}"
            )));
        }
        if let Some(previous) = previous {
            if index <= previous {
                return Err(TrajError::frame(format!(
                    "reader yielded frame {index} after frame {previous}"
                )));
            }
        }
        crate::log_frame!(log_config, frame = index, time = frame.time(), "Processing frame");

        let frame_partial = analysis.process_frame(&frame, state)?;
        partial = analysis.combine(partial, frame_partial)?;
        previous = Some(index);
        n_frames += 1;
    }

    let expected = block.len_within(source.n_frames());
    if n_frames != expected {
        return Err(TrajError::frame(format!(
            "reader yielded {n_frames} of {expected} frames in block {block}"
        )));
    }

    let timing = BlockTiming {
        block_index,
        n_frames,
        compute: timer.elapsed(),
        io_wait,
    };
    crate::log_block!(
        log_config,
        block_index,
        n_frames,
        compute_ms = timing.compute.as_secs_f64() * 1000.0,
        "Finished block"
    );
    Ok(BlockReport { partial, timing })
}
