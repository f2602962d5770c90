//! Named-step executor with uniform failure capture.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use dispatch_core::{PipelineError, StatusCode, panic_message};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};

/// The single error type a pipeline owner has to catch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pipeline workflow failed: {error}")]
pub struct PipelineWorkflowException {
    error: PipelineError,
    failures: Vec<PipelineError>,
}

impl PipelineWorkflowException {
    fn single(error: PipelineError) -> Self {
        Self {
            failures: vec![error.clone()],
            error,
        }
    }

    /// The failure that stopped the pipeline.
    pub fn error(&self) -> &PipelineError {
        &self.error
    }

    /// Name of the step that failed.
    pub fn step_name(&self) -> Option<&str> {
        self.error.step_name.as_deref()
    }

    pub fn status_code(&self) -> StatusCode {
        self.error.status_code
    }

    /// Every failure of a parallel group, in registration order.
    pub fn failures(&self) -> &[PipelineError] {
        &self.failures
    }

    pub fn into_error(self) -> PipelineError {
        self.error
    }
}

/// A step registered for concurrent execution.
pub struct ParallelStep<'a, T> {
    name: String,
    future: BoxFuture<'a, Result<T, PipelineError>>,
}

impl<T> ParallelStep<'_, T> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap `future` as a named member of a parallel group.
pub fn define_parallel_step<'a, T, E, Fut>(name: impl Into<String>, future: Fut) -> ParallelStep<'a, T>
where
    Fut: Future<Output = Result<T, E>> + Send + 'a,
    E: Into<PipelineError>,
{
    ParallelStep {
        name: name.into(),
        future: Box::pin(async move { future.await.map_err(Into::into) }),
    }
}

/// Executes the named steps of one request, in the order they are invoked.
///
/// Once a step fails the workflow is halted: later `step`/`parallel` calls
/// return the original failure without running anything.
#[derive(Debug, Default)]
pub struct PipelineWorkflow {
    executed: Vec<String>,
    failure: Option<PipelineWorkflowException>,
}

impl PipelineWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the steps that ran, in order, including a failed one.
    pub fn executed_steps(&self) -> &[String] {
        &self.executed
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Run one named step.
    ///
    /// An error returned by the step, or a panic inside it, is tagged with
    /// `name` and surfaced as a [`PipelineWorkflowException`].
    pub async fn step<T, E, F, Fut>(
        &mut self,
        name: &str,
        f: F,
    ) -> Result<T, PipelineWorkflowException>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<PipelineError>,
    {
        self.admit(name)?;
        self.executed.push(name.to_string());

        run_step(name, f()).await.map_err(|error| {
            let exception = PipelineWorkflowException::single(error);
            self.failure = Some(exception.clone());
            exception
        })
    }

    /// Start every step of the group, then wait for all of them.
    ///
    /// Outputs come back in registration order. The group fails if any
    /// member fails; the first failing member (by registration order) becomes
    /// the reported error and all failures are kept.
    pub async fn parallel<T>(
        &mut self,
        steps: Vec<ParallelStep<'_, T>>,
    ) -> Result<Vec<T>, PipelineWorkflowException> {
        for (i, step) in steps.iter().enumerate() {
            self.admit(&step.name)?;
            if steps[..i].iter().any(|earlier| earlier.name == step.name) {
                return Err(registered_twice(&step.name));
            }
        }
        self.executed.extend(steps.iter().map(|s| s.name.clone()));

        let outcomes = join_all(steps.into_iter().map(|step| {
            let ParallelStep { name, future } = step;
            async move { run_step(&name, future).await }
        }))
        .await;

        let mut values = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(value) => values.push(value),
                Err(error) => failures.push(error),
            }
        }

        if let Some(first) = failures.first().cloned() {
            let exception = PipelineWorkflowException {
                error: first,
                failures,
            };
            self.failure = Some(exception.clone());
            return Err(exception);
        }

        Ok(values)
    }

    fn admit(&self, name: &str) -> Result<(), PipelineWorkflowException> {
        if let Some(failure) = &self.failure {
            tracing::warn!(
                step = name,
                failed_step = failure.step_name().unwrap_or("-"),
                "Skipping step, pipeline already failed"
            );
            return Err(failure.clone());
        }
        if self.executed.iter().any(|s| s == name) {
            return Err(registered_twice(name));
        }
        Ok(())
    }
}

fn registered_twice(name: &str) -> PipelineWorkflowException {
    PipelineWorkflowException::single(
        PipelineError::new(
            StatusCode::InternalServerError,
            format!("step '{}' registered twice", name),
        )
        .in_step(name),
    )
}

async fn run_step<T, E, Fut>(name: &str, future: Fut) -> Result<T, PipelineError>
where
    Fut: Future<Output = Result<T, E>>,
    E: Into<PipelineError>,
{
    tracing::info!(step = name, "Pipeline step started");
    let started = Instant::now();

    let outcome = AssertUnwindSafe(future).catch_unwind().await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(value)) => {
            tracing::info!(step = name, elapsed_ms, "Pipeline step completed");
            Ok(value)
        }
        Ok(Err(error)) => {
            let error = error.into().in_step(name);
            tracing::warn!(step = name, elapsed_ms, "Pipeline step failed: {}", error.message);
            Err(error)
        }
        Err(payload) => {
            let error = PipelineError::new(
                StatusCode::InternalServerError,
                panic_message(payload.as_ref()),
            )
            .in_step(name);
            tracing::warn!(step = name, elapsed_ms, "Pipeline step panicked: {}", error.message);
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::ResultError;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;

    #[tokio::test]
    async fn steps_run_in_invocation_order() {
        let mut pipeline = PipelineWorkflow::new();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let log = log.clone();
            pipeline
                .step(name, || async move {
                    log.lock().unwrap().push(name);
                    Ok::<_, Infallible>(())
                })
                .await
                .unwrap();
        }

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(pipeline.executed_steps(), ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn returns_step_value() {
        let mut pipeline = PipelineWorkflow::new();
        let value = pipeline
            .step("compute", || async { Ok::<_, ResultError>(41 + 1) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn failure_is_tagged_and_halts_later_steps() {
        let mut pipeline = PipelineWorkflow::new();
        let later_ran = Arc::new(AtomicUsize::new(0));

        let error = pipeline
            .step("triggerJob", || async {
                Err::<(), _>(ResultError::internal("broker unreachable"))
            })
            .await
            .unwrap_err();
        assert_eq!(error.step_name(), Some("triggerJob"));
        assert_eq!(error.status_code(), StatusCode::InternalServerError);
        assert_eq!(error.error().message, "broker unreachable");

        let counter = later_ran.clone();
        let skipped = pipeline
            .step("response", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(())
            })
            .await
            .unwrap_err();
        assert_eq!(skipped.step_name(), Some("triggerJob"));
        assert_eq!(later_ran.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.executed_steps(), ["triggerJob"]);
    }

    #[tokio::test]
    async fn client_error_status_is_preserved() {
        let mut pipeline = PipelineWorkflow::new();
        let error = pipeline
            .step("validate", || async {
                Err::<(), _>(ResultError::bad_request("params.request is null"))
            })
            .await
            .unwrap_err();
        assert_eq!(error.status_code(), StatusCode::BadRequest);
    }

    #[tokio::test]
    async fn panics_become_step_failures() {
        let mut pipeline = PipelineWorkflow::new();
        let error = pipeline
            .step("explode", || async {
                if true {
                    panic!("boom");
                }
                Ok::<(), Infallible>(())
            })
            .await
            .unwrap_err();
        assert_eq!(error.step_name(), Some("explode"));
        assert_eq!(error.error().message, "boom");
        assert!(pipeline.is_failed());
    }

    #[tokio::test]
    async fn duplicate_step_names_are_rejected() {
        let mut pipeline = PipelineWorkflow::new();
        pipeline
            .step("once", || async { Ok::<_, Infallible>(()) })
            .await
            .unwrap();
        let error = pipeline
            .step("once", || async { Ok::<_, Infallible>(()) })
            .await
            .unwrap_err();
        assert!(error.error().message.contains("registered twice"));
    }

    #[tokio::test]
    async fn duplicate_names_within_a_parallel_group_are_rejected() {
        let mut pipeline = PipelineWorkflow::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let steps = (0..2)
            .map(|_| {
                let ran = ran.clone();
                define_parallel_step("notify", async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(())
                })
            })
            .collect();

        let error = pipeline.parallel(steps).await.unwrap_err();
        assert_eq!(error.step_name(), Some("notify"));
        assert!(error.error().message.contains("registered twice"));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(pipeline.executed_steps().is_empty());
    }

    #[tokio::test]
    async fn parallel_steps_start_before_any_is_awaited() {
        let mut pipeline = PipelineWorkflow::new();
        // Each member waits for all three; this only completes if all run concurrently.
        let barrier = Arc::new(Barrier::new(3));

        let steps = (0..3)
            .map(|i| {
                let barrier = barrier.clone();
                define_parallel_step(format!("fan-{}", i), async move {
                    barrier.wait().await;
                    Ok::<_, Infallible>(i)
                })
            })
            .collect();

        let values = tokio::time::timeout(Duration::from_secs(5), pipeline.parallel(steps))
            .await
            .expect("parallel group deadlocked")
            .unwrap();
        assert_eq!(values, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn parallel_group_fails_if_one_member_fails() {
        let mut pipeline = PipelineWorkflow::new();
        let steps = vec![
            define_parallel_step("ok", async { Ok::<u32, ResultError>(1) }),
            define_parallel_step("broken", async {
                Err::<u32, _>(ResultError::internal("nope"))
            }),
            define_parallel_step("also-ok", async { Ok::<u32, ResultError>(3) }),
        ];

        let error = pipeline.parallel(steps).await.unwrap_err();
        assert_eq!(error.step_name(), Some("broken"));
        assert_eq!(error.failures().len(), 1);
        assert!(pipeline.is_failed());
    }
}
