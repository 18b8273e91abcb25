use super::resolution::{EngineSettings, ResolutionEngine};
use super::selector::SourceSelector;
use crate::model::{RunResult, WebsiteTarget};
use crate::output::ResultSink;
use crate::sources::SourceSet;
use crate::CheckerError;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Control surface for starting runs on background tasks
///
/// Each run gets its own task, rate limiter and cancellation token; runs for
/// different websites share nothing mutable.
#[derive(Debug, Clone, Default)]
pub struct Checker {
    engine: Arc<ResolutionEngine>,
}

impl Checker {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            engine: Arc::new(ResolutionEngine::new(settings)),
        }
    }

    /// Validates the target and spawns its run
    ///
    /// A pinned method whose prerequisite is missing is rejected here with
    /// `ConfigurationInvalid`, before any task is spawned. Must be called
    /// from within a Tokio runtime.
    pub fn start(
        &self,
        target: WebsiteTarget,
        sources: SourceSet,
        sink: Arc<dyn ResultSink>,
    ) -> Result<RunHandle, CheckerError> {
        let tier = SourceSelector::new(&target, &sources).select()?;
        tracing::debug!("Starting {} on the {} tier", target.name, tier);

        let cancel = CancellationToken::new();
        let website = target.name.clone();
        let engine = Arc::clone(&self.engine);
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            engine
                .run(&target, &sources, sink.as_ref(), &token)
                .await
        });

        Ok(RunHandle {
            website,
            cancel,
            task,
        })
    }
}

/// A running check
pub struct RunHandle {
    website: String,
    cancel: CancellationToken,
    task: JoinHandle<RunResult>,
}

impl RunHandle {
    pub fn website(&self) -> &str {
        &self.website
    }

    /// Asks the run to stop at its next cancellation check point
    ///
    /// In-flight requests are left to finish or time out; records that are
    /// already terminal stay in the result.
    pub fn signal_stop(&self) {
        tracing::info!("Stop signalled for {}", self.website);
        self.cancel.cancel();
    }

    /// A clone of the run's token, for wiring external stop signals
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the run to reach a terminal status
    pub async fn wait(self) -> RunResult {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Run task for {} did not finish: {}", self.website, e);
                RunResult::failed(self.website, format!("run task failed: {}", e))
            }
        }
    }
}
