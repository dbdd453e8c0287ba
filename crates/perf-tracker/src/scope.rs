//! Scoped span acquisition and instrumented wrappers.

use std::future::Future;
use std::sync::Arc;

use tracing::trace;

use crate::span::SpanHandle;
use crate::tracker::PerfTracker;

/// Closes its span when dropped.
///
/// Drop covers every exit path: normal return, `?`, a panic unwinding
/// through the scope, and a future being cancelled mid-await. A panic is
/// counted as one error on the span.
#[must_use = "the span closes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SpanGuard<'a> {
    tracker: &'a PerfTracker,
    handle: SpanHandle,
}

impl SpanGuard<'_> {
    pub fn handle(&self) -> &SpanHandle {
        &self.handle
    }
}

impl Drop for SpanGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.handle.add_error();
        }
        self.tracker.end_span(&self.handle);
    }
}

impl PerfTracker {
    /// Begin `name` and return a guard that ends it.
    pub fn enter(&self, name: &str) -> SpanGuard<'_> {
        SpanGuard {
            tracker: self,
            handle: self.begin(name),
        }
    }

    /// Run `op` inside a span named `name`.
    ///
    /// An `Err` from `op` adds one to the span's `error_count` and is returned
    /// unchanged. The span is closed however the future finishes.
    pub async fn scope<F, Fut, T, E>(&self, name: &str, op: F) -> Result<T, E>
    where
        F: FnOnce(SpanHandle) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let guard = self.enter(name);
        let result = op(guard.handle().clone()).await;
        if result.is_err() {
            guard.handle().add_error();
        }
        result
    }

    /// Blocking counterpart of [`scope`](Self::scope).
    pub fn scope_blocking<F, T, E>(&self, name: &str, op: F) -> Result<T, E>
    where
        F: FnOnce(SpanHandle) -> Result<T, E>,
    {
        let guard = self.enter(name);
        let result = op(guard.handle().clone());
        if result.is_err() {
            guard.handle().add_error();
        }
        result
    }
}

/// Something that names its own spans, like an agent with a fixed name.
pub trait Traced {
    fn span_name(&self) -> &str;
}

/// An operation bound to a tracker and a span name.
///
/// Every call runs through [`PerfTracker::scope`]; the operation receives the
/// span handle followed by its input.
#[derive(Debug, Clone)]
pub struct Tracked<F> {
    tracker: Arc<PerfTracker>,
    name: String,
    op: F,
}

impl<F> Tracked<F> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn call<I, Fut, T, E>(&self, input: I) -> Result<T, E>
    where
        F: Fn(SpanHandle, I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.tracker
            .scope(&self.name, |span| (self.op)(span, input))
            .await
    }

    pub fn call_blocking<I, T, E>(&self, input: I) -> Result<T, E>
    where
        F: Fn(SpanHandle, I) -> Result<T, E>,
    {
        self.tracker
            .scope_blocking(&self.name, |span| (self.op)(span, input))
    }
}

/// Instrument `op` under an explicit span name.
pub fn wrap<F>(tracker: Arc<PerfTracker>, name: impl Into<String>, op: F) -> Tracked<F> {
    Tracked {
        tracker,
        name: name.into(),
        op,
    }
}

/// Instrument `op` under the name of the function itself.
///
/// Closures fall back to the name of the function that defines them.
pub fn wrap_fn<F>(tracker: Arc<PerfTracker>, op: F) -> Tracked<F> {
    let name = callable_name::<F>();
    trace!(span = %name, "instrumenting callable");
    wrap(tracker, name, op)
}

/// Instrument `op` under the span name carried by `target`.
pub fn wrap_traced<T, F>(tracker: Arc<PerfTracker>, target: &T, op: F) -> Tracked<F>
where
    T: Traced + ?Sized,
{
    wrap(tracker, target.span_name(), op)
}

fn callable_name<F>() -> &'static str {
    let full = std::any::type_name::<F>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::")
        .find(|segment| !segment.is_empty() && *segment != "{{closure}}")
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PerfConfig;

    fn plain_step(_span: SpanHandle, n: u32) -> Result<u32, String> {
        Ok(n + 1)
    }

    #[test]
    fn fn_items_are_named_after_themselves() {
        let tracker = Arc::new(PerfTracker::new(PerfConfig::default()));
        let tracked = wrap_fn(tracker, plain_step);
        assert_eq!(tracked.name(), "plain_step");
    }

    #[test]
    fn closures_take_enclosing_function_name() {
        let tracker = Arc::new(PerfTracker::new(PerfConfig::default()));
        let tracked = wrap_fn(tracker, |_span: SpanHandle, n: u32| -> Result<u32, ()> { Ok(n) });
        assert_eq!(tracked.name(), "closures_take_enclosing_function_name");
    }

    #[test]
    fn guard_closes_on_drop() {
        let tracker = PerfTracker::new(PerfConfig::default());
        {
            let guard = tracker.enter("verify_agent");
            guard.handle().add_api_call();
        }
        let span = tracker.get("verify_agent").expect("span");
        assert!(span.duration.is_some());
        assert_eq!(tracker.summary().total_api_calls, 1);
    }

    #[test]
    fn scope_blocking_counts_error_once() {
        let tracker = PerfTracker::new(PerfConfig::default());
        let result: Result<(), &str> = tracker.scope_blocking("parse_agent", |span| {
            span.add_api_call();
            Err("bad output")
        });
        assert_eq!(result, Err("bad output"));

        let span = tracker.get("parse_agent").expect("span");
        assert_eq!(span.error_count, 1);
        assert!(span.duration.expect("closed") >= 0.0);
        assert_eq!(tracker.summary().total_errors, 1);
    }

    #[test]
    fn traced_target_names_the_span() {
        struct Agent;
        impl Traced for Agent {
            fn span_name(&self) -> &str {
                "summarize_agent"
            }
        }

        let tracker = Arc::new(PerfTracker::new(PerfConfig::default()));
        let tracked = wrap_traced(tracker.clone(), &Agent, plain_step);
        assert_eq!(tracked.call_blocking(1), Ok(2));
        assert!(tracker.get("summarize_agent").is_some());
    }
}
