use std::num::NonZeroU32;
use std::ops::Range;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use super::{BoxedTransformer, FieldTransformer};
use crate::error::TransformError;
use crate::field::Field;

/// Returns the field unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl FieldTransformer for Identity {
    fn transform(&mut self, field: Field) -> Result<Field, TransformError> {
        Ok(field)
    }
}

/// Adapter turning a closure into a transformer.
pub struct FnTransformer<F>(F);

pub fn from_fn<F>(f: F) -> FnTransformer<F>
where
    F: FnMut(Field) -> Result<Field, TransformError> + Send,
{
    FnTransformer(f)
}

impl<F> FieldTransformer for FnTransformer<F>
where
    F: FnMut(Field) -> Result<Field, TransformError> + Send,
{
    fn transform(&mut self, field: Field) -> Result<Field, TransformError> {
        (self.0)(field)
    }
}

/// Applies its stages left to right, feeding each the previous output.
#[derive(Default)]
pub struct Chain {
    stages: Vec<BoxedTransformer>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, next: impl FieldTransformer + 'static) -> Self {
        self.stages.push(Box::new(next));
        self
    }
}

impl FromIterator<BoxedTransformer> for Chain {
    fn from_iter<I: IntoIterator<Item = BoxedTransformer>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}

impl FieldTransformer for Chain {
    fn transform(&mut self, field: Field) -> Result<Field, TransformError> {
        self.stages
            .iter_mut()
            .try_fold(field, |field, stage| stage.transform(field))
    }
}

/// Times the wrapped transformer and appends the duration to `full_text`.
///
/// Calls slower than `threshold` are counted; once the count is non-zero it
/// is rendered too, e.g. `5K(130ms, 2 times >100ms)`.
///
/// The returned field is the inner transformer's output with only
/// `full_text` extended; keys the inner transformer dropped stay dropped.
pub struct Profiling<T> {
    inner: T,
    threshold: Duration,
    violations: u64,
}

impl<T: FieldTransformer> Profiling<T> {
    pub fn new(inner: T, threshold: Duration) -> Self {
        Self {
            inner,
            threshold,
            violations: 0,
        }
    }

    pub fn violations(&self) -> u64 {
        self.violations
    }
}

impl<T: FieldTransformer> FieldTransformer for Profiling<T> {
    fn transform(&mut self, field: Field) -> Result<Field, TransformError> {
        let started = Instant::now();
        let mut result = self.inner.transform(field)?;
        let elapsed = started.elapsed();

        if elapsed > self.threshold {
            self.violations += 1;
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.threshold.as_millis() as u64,
                violations = self.violations,
                "transformer exceeded threshold"
            );
        }

        let elapsed_ms = (elapsed.as_secs_f64() * 1000.0).round() as u64;
        let mut text = result.full_text().unwrap_or_default().to_string();
        if self.violations > 0 {
            text.push_str(&format!(
                "({elapsed_ms}ms, {} times >{}ms)",
                self.violations,
                self.threshold.as_millis()
            ));
        } else {
            text.push_str(&format!("({elapsed_ms}ms)"));
        }
        result.set_full_text(text);
        Ok(result)
    }
}

/// Sleeps for a random duration in `[min, max)` milliseconds, then delegates.
pub struct Latency<T> {
    inner: T,
    range_ms: Range<u64>,
}

impl<T: FieldTransformer> Latency<T> {
    pub fn new(inner: T, range_ms: Range<u64>) -> Self {
        Self { inner, range_ms }
    }

    fn pick_delay(&self) -> Duration {
        let ms = if self.range_ms.start < self.range_ms.end {
            rand::thread_rng().gen_range(self.range_ms.clone())
        } else {
            self.range_ms.start
        };
        Duration::from_millis(ms)
    }
}

impl<T: FieldTransformer> FieldTransformer for Latency<T> {
    fn transform(&mut self, field: Field) -> Result<Field, TransformError> {
        let delay = self.pick_delay();
        debug!(delay_ms = delay.as_millis() as u64, "injecting latency");
        std::thread::sleep(delay);
        self.inner.transform(field)
    }
}

/// Recomputes on every `period`-th call and replays the last result otherwise.
///
/// The first call always computes. A failed computation is not cached and
/// does not advance the counter.
pub struct TimedCaching<T> {
    inner: T,
    period: NonZeroU32,
    calls: u32,
    cached: Option<Field>,
}

impl<T: FieldTransformer> TimedCaching<T> {
    pub fn new(inner: T, period: NonZeroU32) -> Self {
        Self {
            inner,
            period,
            calls: 0,
            cached: None,
        }
    }
}

impl<T: FieldTransformer> FieldTransformer for TimedCaching<T> {
    fn transform(&mut self, field: Field) -> Result<Field, TransformError> {
        let result = match &self.cached {
            Some(cached) if self.calls != 0 => cached.clone(),
            _ => {
                let fresh = self.inner.transform(field)?;
                self.cached = Some(fresh.clone());
                fresh
            }
        };
        self.calls = (self.calls + 1) % self.period.get();
        Ok(result)
    }
}
