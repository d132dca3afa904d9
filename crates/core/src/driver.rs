use std::time::{Duration, Instant};

use crate::attributes::VoxelData;
use crate::error::MorphError;
use crate::parallel::ParallelTaskRunner;
use crate::plan::RemapPlan;
use crate::progress::{
    CancelFlag, ProgressEvent, ProgressReporter, ProgressSink, DEFAULT_PROGRESS_INTERVAL,
};
use crate::propagate::{PassScanner, ScanSummary};
use crate::remap::{remap_labels, CopyGuard, RemapTarget};

/// Everything a filter run needs besides its data and configuration.
pub struct ExecutionContext {
    runner: ParallelTaskRunner,
    sink: Option<ProgressSink>,
    progress_interval: Duration,
    cancel: CancelFlag,
}

impl ExecutionContext {
    pub fn new() -> Result<Self, MorphError> {
        Ok(Self::with_runner(ParallelTaskRunner::with_default_parallelism()?))
    }

    pub fn serial() -> Result<Self, MorphError> {
        Ok(Self::with_runner(ParallelTaskRunner::serial()?))
    }

    pub fn with_runner(runner: ParallelTaskRunner) -> Self {
        Self {
            runner,
            sink: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn runner(&self) -> &ParallelTaskRunner {
        &self.runner
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub(crate) fn reporter(&self, filter: &'static str) -> ProgressReporter {
        ProgressReporter::new(filter, self.sink.clone(), self.progress_interval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { passes: usize },
    /// Cancellation was observed; the data reflects the last completed pass.
    Cancelled { completed_passes: usize },
}

impl RunOutcome {
    pub fn passes(&self) -> usize {
        match self {
            RunOutcome::Completed { passes } => *passes,
            RunOutcome::Cancelled { completed_passes } => *completed_passes,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled { .. })
    }
}

/// Checks the label array and every remap target without borrowing anything mutably.
pub(crate) fn validate_targets(
    data: &VoxelData,
    labels: &str,
    ignored: &[String],
) -> Result<(), MorphError> {
    let expected = data.geometry().voxel_count();
    data.get(labels)
        .ok_or_else(|| MorphError::MissingArray(labels.to_string()))?
        .scalar_i32(labels)?;
    for (name, array) in data.iter() {
        if name != labels && ignored.iter().any(|ignored| ignored == name) {
            continue;
        }
        if array.tuple_count() != expected {
            return Err(MorphError::DimensionMismatch {
                name: name.to_string(),
                expected,
                actual: array.tuple_count(),
            });
        }
        if name != labels && !array.data_type().is_primitive() {
            return Err(MorphError::UnsupportedElementType {
                name: name.to_string(),
                data_type: array.data_type(),
            });
        }
    }
    Ok(())
}

/// The label field plus the validated arrays that follow it.
pub(crate) struct PassTargets<'a> {
    labels: &'a mut [i32],
    arrays: Vec<(&'a str, RemapTarget<'a>)>,
}

impl<'a> PassTargets<'a> {
    pub(crate) fn split(
        data: &'a mut VoxelData,
        labels: &str,
        ignored: &[String],
    ) -> Result<Self, MorphError> {
        validate_targets(data, labels, ignored)?;
        let (labels, arrays) = data.labels_and_arrays_mut(labels, ignored)?;
        let arrays = arrays
            .into_iter()
            .map(|(name, array)| Ok((name, RemapTarget::new(name, array)?)))
            .collect::<Result<Vec<_>, MorphError>>()?;
        Ok(Self { labels, arrays })
    }

    pub(crate) fn labels(&self) -> &[i32] {
        self.labels
    }

    pub(crate) fn labels_mut(&mut self) -> &mut [i32] {
        self.labels
    }

    pub(crate) fn array_names(&self) -> Vec<&str> {
        self.arrays.iter().map(|(name, _)| *name).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Idle,
    Scanning(usize),
    Remapping(usize),
    LabelUpdating(usize),
    Done,
    Cancelled,
}

/// What a convergence loop should do after a scan or a committed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Stop,
}

/// Runs scan, remap and label-update passes over one set of targets.
pub(crate) struct IterationDriver<'c> {
    ctx: &'c ExecutionContext,
    reporter: ProgressReporter,
    state: DriverState,
    plan: RemapPlan,
    passes: usize,
    started: Instant,
}

impl<'c> IterationDriver<'c> {
    pub(crate) fn new(ctx: &'c ExecutionContext, filter: &'static str, voxel_count: usize) -> Self {
        Self {
            ctx,
            reporter: ctx.reporter(filter),
            state: DriverState::Idle,
            plan: RemapPlan::new(voxel_count),
            passes: 0,
            started: Instant::now(),
        }
    }

    pub(crate) fn start(&mut self) -> bool {
        self.reporter.start();
        tracing::info!(
            "{}: started ({} workers, parallel = {})",
            self.reporter.filter(),
            self.ctx.runner.max_in_flight(),
            self.ctx.runner.is_parallel()
        );
        !self.ctx.cancel.is_cancelled()
    }

    fn transition(&mut self, next: DriverState) {
        tracing::trace!("{}: {:?} -> {:?}", self.reporter.filter(), self.state, next);
        self.state = next;
    }

    /// Exactly `iterations` passes, stopping early only on cancellation.
    pub(crate) fn run_fixed(
        &mut self,
        targets: &mut PassTargets<'_>,
        scanner: &mut dyn PassScanner,
        iterations: usize,
    ) -> RunOutcome {
        if !self.start() {
            return self.finish(true);
        }
        for iteration in 0..iterations {
            self.transition(DriverState::Scanning(iteration));
            let reporter = &self.reporter;
            let mut on_slice = |fraction: f32| {
                reporter.advance((iteration as f32 + fraction) / iterations as f32);
            };
            let Some(summary) =
                scanner.scan(targets.labels, &mut self.plan, &self.ctx.cancel, &mut on_slice)
            else {
                return self.finish(true);
            };
            tracing::debug!(
                "{}: pass {} planned {} of {} active voxels",
                self.reporter.filter(),
                iteration,
                summary.planned,
                summary.active
            );
            self.commit(targets, scanner.guard());
        }
        self.finish(false)
    }

    /// Repeats passes until `after_scan` or `after_commit` says stop. There is no pass limit;
    /// the cancel flag is the only other way out.
    pub(crate) fn run_until_converged(
        &mut self,
        targets: &mut PassTargets<'_>,
        scanner: &mut dyn PassScanner,
        mut after_scan: impl FnMut(&ScanSummary, &ProgressReporter) -> Step,
        mut after_commit: impl FnMut(&[i32], &ProgressReporter) -> Step,
    ) -> RunOutcome {
        if !self.start() {
            return self.finish(true);
        }
        loop {
            if self.ctx.cancel.is_cancelled() {
                return self.finish(true);
            }
            self.transition(DriverState::Scanning(self.passes));
            let Some(summary) =
                scanner.scan(targets.labels, &mut self.plan, &self.ctx.cancel, &mut |_: f32| {})
            else {
                return self.finish(true);
            };
            tracing::debug!(
                "{}: pass {} planned {} of {} active voxels",
                self.reporter.filter(),
                self.passes,
                summary.planned,
                summary.active
            );
            if after_scan(&summary, &self.reporter) == Step::Stop {
                return self.finish(false);
            }
            self.commit(targets, scanner.guard());
            if after_commit(targets.labels, &self.reporter) == Step::Stop {
                return self.finish(false);
            }
        }
    }

    /// Applies the current plan to every array, then, once all of them are done, to the labels.
    fn commit(&mut self, targets: &mut PassTargets<'_>, guard: CopyGuard) {
        let pass = self.passes;
        self.reporter.emit(ProgressEvent::PassStarted { pass });
        self.transition(DriverState::Remapping(pass));
        {
            let PassTargets { labels, arrays } = targets;
            let snapshot: &[i32] = &**labels;
            let plan = &self.plan;
            let reporter = &self.reporter;
            self.ctx.runner.scope(|group| {
                for (name, target) in arrays.iter_mut() {
                    let name: &str = *name;
                    group.submit(move || {
                        let copied = target.apply(plan, snapshot, guard);
                        reporter.emit(ProgressEvent::ArrayRemapped {
                            pass,
                            name: name.to_string(),
                            copied,
                        });
                    });
                }
                group.wait();
            });
        }

        self.transition(DriverState::LabelUpdating(pass));
        let copied = remap_labels(targets.labels, &self.plan, guard);
        self.reporter
            .emit(ProgressEvent::LabelsRemapped { pass, copied });
        self.passes += 1;
    }

    /// Ends a run that was cancelled before its first pass could start.
    pub(crate) fn abandon(&mut self) -> RunOutcome {
        self.reporter.start();
        self.finish(true)
    }

    fn finish(&mut self, cancelled: bool) -> RunOutcome {
        let filter = self.reporter.filter();
        let elapsed_ms = self.started.elapsed().as_secs_f32() * 1000.0;
        if cancelled {
            self.transition(DriverState::Cancelled);
            tracing::info!(
                "{}: cancelled after {} passes ({:.1} ms)",
                filter,
                self.passes,
                elapsed_ms
            );
        } else {
            self.transition(DriverState::Done);
            self.reporter.complete();
            tracing::info!(
                "{}: finished {} passes ({:.1} ms)",
                filter,
                self.passes,
                elapsed_ms
            );
        }
        self.reporter.finish(self.passes, cancelled);
        if cancelled {
            RunOutcome::Cancelled {
                completed_passes: self.passes,
            }
        } else {
            RunOutcome::Completed {
                passes: self.passes,
            }
        }
    }
}
