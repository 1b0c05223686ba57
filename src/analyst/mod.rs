// Analyst core: generate, execute and repair data-analysis scripts
pub mod error;
pub mod executors;
pub mod extract;
pub mod inference;
pub mod metadata;
pub mod prompts;
pub mod repair;
pub mod workspace;

use crate::shared::config::{AnalystConfig, ExecutionConfig};
use error::Result;
use executors::{ScriptExecutor, SubprocessExecutor};
use inference::{CompletionBackend, CompletionClient};
use repair::{LoopSettings, Outcome, RepairLoop};
use std::sync::Arc;
use tracing::info;
use workspace::RequestContext;

/// Long-lived collaborators shared by every request. Holds no per-request
/// state, so concurrent requests only share the backend connection pool.
pub struct Analyst {
    completion: Arc<dyn CompletionBackend>,
    executor: Arc<dyn ScriptExecutor>,
    settings: LoopSettings,
    system_prompt: String,
}

impl Analyst {
    pub fn from_config(config: &AnalystConfig) -> Result<Self> {
        let completion = CompletionClient::new(&config.inference)?;
        let executor = SubprocessExecutor::from_config(&config.execution);
        info!(
            interpreter = %config.execution.interpreter,
            max_attempts = config.execution.max_attempts,
            script_timeout_secs = config.execution.script_timeout_secs,
            "Analyst initialized"
        );
        Ok(Self::new(
            Arc::new(completion),
            Arc::new(executor),
            &config.execution,
        ))
    }

    pub fn new(
        completion: Arc<dyn CompletionBackend>,
        executor: Arc<dyn ScriptExecutor>,
        execution: &ExecutionConfig,
    ) -> Self {
        Self {
            completion,
            executor,
            settings: LoopSettings::from_config(execution),
            system_prompt: prompts::system_prompt(execution),
        }
    }

    pub async fn solve(&self, ctx: &RequestContext) -> Result<Outcome> {
        RepairLoop::new(
            self.completion.as_ref(),
            self.executor.as_ref(),
            &self.system_prompt,
            &self.settings,
        )
        .run(ctx)
        .await
    }
}
