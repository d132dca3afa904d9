use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    Start { filter: &'static str },
    Advance { filter: &'static str, fraction: f32 },
    Message { filter: &'static str, text: String },
    PassStarted { pass: usize },
    ArrayRemapped { pass: usize, name: String, copied: usize },
    LabelsRemapped { pass: usize, copied: usize },
    Finish { filter: &'static str, passes: usize, cancelled: bool },
}

pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Shared cancellation request, polled by long-running loops.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct Throttle {
    last_emit: Option<Instant>,
    fraction: f32,
}

/// Per-run progress front end. Advances and messages are rate limited; pass events are not.
pub struct ProgressReporter {
    filter: &'static str,
    sink: Option<ProgressSink>,
    interval: Duration,
    throttle: Mutex<Throttle>,
}

impl ProgressReporter {
    pub fn new(filter: &'static str, sink: Option<ProgressSink>, interval: Duration) -> Self {
        Self {
            filter,
            sink,
            interval,
            throttle: Mutex::new(Throttle {
                last_emit: None,
                fraction: 0.0,
            }),
        }
    }

    pub fn filter(&self) -> &'static str {
        self.filter
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = self.sink.as_ref() {
            (sink)(event);
        }
    }

    pub fn start(&self) {
        self.emit(ProgressEvent::Start {
            filter: self.filter,
        });
    }

    pub fn finish(&self, passes: usize, cancelled: bool) {
        self.emit(ProgressEvent::Finish {
            filter: self.filter,
            passes,
            cancelled,
        });
    }

    /// Reports a fraction in `0..=1`. Values below the last reported one are dropped.
    pub fn advance(&self, fraction: f32) {
        if self.sink.is_none() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        {
            let mut throttle = self.throttle.lock().unwrap_or_else(PoisonError::into_inner);
            if fraction <= throttle.fraction || !Self::due(&mut throttle, self.interval) {
                return;
            }
            throttle.fraction = fraction;
        }
        self.emit(ProgressEvent::Advance {
            filter: self.filter,
            fraction,
        });
    }

    /// Reports `1.0` unless it was already reported, bypassing the rate limit.
    pub fn complete(&self) {
        if self.sink.is_none() {
            return;
        }
        {
            let mut throttle = self.throttle.lock().unwrap_or_else(PoisonError::into_inner);
            if throttle.fraction >= 1.0 {
                return;
            }
            throttle.fraction = 1.0;
            throttle.last_emit = Some(Instant::now());
        }
        self.emit(ProgressEvent::Advance {
            filter: self.filter,
            fraction: 1.0,
        });
    }

    pub fn message(&self, text: impl Into<String>) {
        if self.sink.is_none() {
            return;
        }
        {
            let mut throttle = self.throttle.lock().unwrap_or_else(PoisonError::into_inner);
            if !Self::due(&mut throttle, self.interval) {
                return;
            }
        }
        self.emit(ProgressEvent::Message {
            filter: self.filter,
            text: text.into(),
        });
    }

    fn due(throttle: &mut Throttle, interval: Duration) -> bool {
        let now = Instant::now();
        match throttle.last_emit {
            Some(last) if now.duration_since(last) < interval => false,
            _ => {
                throttle.last_emit = Some(now);
                true
            }
        }
    }
}
