use crate::context::EngineContext;
use crate::handlers::handler_for;
use enginecore::{
    Action, Ancestors, EngineError, ExecutionState, PauseMetadata, StepKey, StepOutput,
    StepOutputStatus, StopResponse,
};
use futures::future::BoxFuture;

/// How a chain (or a whole run) ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Succeeded,
    Failed {
        step: StepKey,
        error_message: String,
    },
    Paused {
        step: StepKey,
        metadata: PauseMetadata,
    },
    Stopped {
        step: StepKey,
        response: StopResponse,
    },
}

impl Verdict {
    pub fn status(&self) -> StepOutputStatus {
        match self {
            Verdict::Succeeded => StepOutputStatus::Succeeded,
            Verdict::Failed { .. } => StepOutputStatus::Failed,
            Verdict::Paused { .. } => StepOutputStatus::Paused,
            Verdict::Stopped { .. } => StepOutputStatus::Stopped,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, Verdict::Succeeded)
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            Verdict::Failed { error_message, .. } => Some(error_message.clone()),
            _ => None,
        }
    }

    /// Verdict of a step that finished in an earlier pass.
    fn from_stored(step: StepKey, output: &StepOutput) -> Self {
        match output.status {
            StepOutputStatus::Failed => Verdict::Failed {
                step,
                error_message: output
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "step failed".to_string()),
            },
            StepOutputStatus::Stopped => Verdict::Stopped {
                step,
                response: StopResponse::default(),
            },
            _ => Verdict::Succeeded,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    pub verdict: Verdict,
    /// Sum of the step durations along the walked chain.
    pub duration_ms: u64,
}

impl ChainOutput {
    pub fn succeeded() -> Self {
        Self {
            verdict: Verdict::Succeeded,
            duration_ms: 0,
        }
    }
}

/// Walks a `nextAction` chain one step at a time.
pub struct FlowExecutor<'c> {
    ctx: &'c EngineContext,
}

impl<'c> FlowExecutor<'c> {
    pub fn new(ctx: &'c EngineContext) -> Self {
        Self { ctx }
    }

    /// Execute `first` and its successors within `ancestors`.
    ///
    /// Steps that already finished in an earlier pass are skipped and their
    /// stored output reused. The walk stops at the first step that does not
    /// succeed; later steps are never attempted.
    pub fn execute<'a>(
        &'a self,
        first: &'a Action,
        state: &'a mut ExecutionState,
        ancestors: &'a Ancestors,
    ) -> BoxFuture<'a, Result<ChainOutput, EngineError>>
    where
        'c: 'a,
    {
        Box::pin(async move {
            let mut duration_ms = 0;

            for action in first.chain() {
                let key = StepKey::new(action.name(), ancestors.clone());

                let stored = state
                    .get_step(action.name(), ancestors)
                    .filter(|output| output.status.is_finished())
                    .map(|output| {
                        let verdict = Verdict::from_stored(key.clone(), output);
                        (output.duration.unwrap_or_default(), verdict)
                    });
                if let Some((stored_duration, verdict)) = stored {
                    tracing::debug!("Skipping finished step {}", key);
                    duration_ms += stored_duration;
                    if !verdict.is_succeeded() {
                        return Ok(ChainOutput { verdict, duration_ms });
                    }
                    continue;
                }

                tracing::debug!("Executing step {} ({:?})", key, action.action_type());
                self.ctx
                    .hooks
                    .on_step_started(self.ctx.flow_run_id, &key, action.action_type());

                let result = handler_for(action).execute(self.ctx, state, ancestors).await?;

                self.ctx
                    .hooks
                    .on_step_finished(self.ctx.flow_run_id, &key, &result.output);
                duration_ms += result.output.duration.unwrap_or_default();

                match &result.verdict {
                    Verdict::Succeeded => tracing::debug!("Step {} succeeded", key),
                    Verdict::Failed { step, error_message } => {
                        tracing::warn!("Step {} failed at {}: {}", key, step, error_message)
                    }
                    _ => tracing::info!("Step {} ended the pass as {:?}", key, result.output.status),
                }
                if !result.verdict.is_succeeded() {
                    return Ok(ChainOutput {
                        verdict: result.verdict,
                        duration_ms,
                    });
                }
            }

            Ok(ChainOutput {
                verdict: Verdict::Succeeded,
                duration_ms,
            })
        })
    }
}
