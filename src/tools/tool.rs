//! The [`Tool`] seam and a closure-backed implementation.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use super::arguments::ToolArguments;
use super::types::ToolParameters;
use crate::agent_loop::types::RunId;
use crate::error::Result;
use crate::types::ToolCallContent;

/// Identifies the call a tool is answering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolExecutionContext {
    pub call_id: String,
    pub tool_name: String,
    pub run_id: Option<RunId>,
}

impl ToolExecutionContext {
    pub fn for_call(call: &ToolCallContent, run_id: RunId) -> Self {
        Self {
            call_id: call.call_id.clone(),
            tool_name: call.name.clone(),
            run_id: Some(run_id),
        }
    }
}

/// A locally executed tool.
///
/// `execute` runs on a spawned task once the call's arguments are complete;
/// its value becomes the tool-result message, its error aborts the round trip.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the provider uses when calling this tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &ToolParameters;

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value>;
}

type Executor =
    dyn Fn(ToolArguments, ToolExecutionContext) -> BoxFuture<'static, Result<serde_json::Value>>
        + Send
        + Sync;

/// [`Tool`] backed by an async closure.
pub struct FnTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    executor: Arc<Executor>,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        executor: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            executor: Arc::new(move |args, ctx| executor(args, ctx).boxed()),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value> {
        (self.executor)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
