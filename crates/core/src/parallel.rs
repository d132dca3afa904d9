use std::sync::{Arc, Condvar, Mutex, PoisonError};

use rayon::prelude::*;

use crate::error::MorphError;

const PARALLEL_THRESHOLD: usize = 1024;

pub fn for_each_indexed_mut<T, F>(slice: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    if slice.len() >= PARALLEL_THRESHOLD {
        slice
            .par_iter_mut()
            .enumerate()
            .for_each(|(idx, value)| f(idx, value));
        return;
    }

    for (idx, value) in slice.iter_mut().enumerate() {
        f(idx, value);
    }
}

pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

/// Counting gate for tasks that have been submitted but not finished.
struct InFlight {
    count: Mutex<usize>,
    changed: Condvar,
    limit: usize,
}

impl InFlight {
    fn new(limit: usize) -> Self {
        Self {
            count: Mutex::new(0),
            changed: Condvar::new(),
            limit: limit.max(1),
        }
    }

    fn acquire(self: &Arc<Self>) -> Permit {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count >= self.limit {
            count = self
                .changed
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *count += 1;
        Permit {
            gate: Arc::clone(self),
        }
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self
                .changed
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Held by a running task; releases its slot even if the task unwinds.
struct Permit {
    gate: Arc<InFlight>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut count = self.gate.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count -= 1;
        self.gate.changed.notify_all();
    }
}

/// Bounded fan-out of independent tasks onto a dedicated rayon pool.
pub struct ParallelTaskRunner {
    pool: rayon::ThreadPool,
    max_in_flight: usize,
    parallel: bool,
}

impl ParallelTaskRunner {
    pub fn new(max_in_flight: usize) -> Result<Self, MorphError> {
        let max_in_flight = max_in_flight.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_in_flight)
            .thread_name(|index| format!("voxmorph-worker-{index}"))
            .build()
            .map_err(|err| MorphError::ThreadPool(err.to_string()))?;
        Ok(Self {
            pool,
            max_in_flight,
            parallel: true,
        })
    }

    pub fn with_default_parallelism() -> Result<Self, MorphError> {
        Self::new(default_parallelism())
    }

    pub fn serial() -> Result<Self, MorphError> {
        let mut runner = Self::new(1)?;
        runner.set_parallelism(false);
        Ok(runner)
    }

    /// When disabled, `submit` runs each task inline on the calling thread.
    pub fn set_parallelism(&mut self, enabled: bool) {
        self.parallel = enabled;
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Data-parallel loop on this runner's pool, or a plain loop when parallelism is off.
    pub fn for_each_indexed_mut<T, F>(&self, slice: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync + Send,
    {
        if !self.parallel {
            for (idx, value) in slice.iter_mut().enumerate() {
                f(idx, value);
            }
            return;
        }
        self.pool.install(|| for_each_indexed_mut(slice, f));
    }

    /// Runs `f` with a task group. Every task submitted to the group has finished when this
    /// returns; a panicking task resumes its panic here.
    pub fn scope<'scope, F, R>(&self, f: F) -> R
    where
        F: FnOnce(&TaskGroup<'_, 'scope>) -> R,
    {
        let in_flight = Arc::new(InFlight::new(self.max_in_flight));
        if !self.parallel {
            let group = TaskGroup {
                scope: None,
                in_flight,
            };
            return f(&group);
        }
        self.pool.in_place_scope(|scope| {
            let group = TaskGroup {
                scope: Some(scope),
                in_flight,
            };
            f(&group)
        })
    }
}

pub struct TaskGroup<'a, 'scope> {
    scope: Option<&'a rayon::Scope<'scope>>,
    in_flight: Arc<InFlight>,
}

impl<'a, 'scope> TaskGroup<'a, 'scope> {
    /// Queues `task`, blocking while the in-flight budget is exhausted.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'scope,
    {
        let Some(scope) = self.scope else {
            task();
            return;
        };
        let permit = self.in_flight.acquire();
        scope.spawn(move |_| {
            let _permit = permit;
            task();
        });
    }

    /// Blocks until every task submitted so far has finished.
    pub fn wait(&self) {
        self.in_flight.wait_idle();
    }
}
