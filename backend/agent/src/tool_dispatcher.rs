//! Dispatcher for agent tool calls.
//!
//! Routes the model's requested tool invocations to registered tools and
//! turns every outcome, including failures, into a response the requesting
//! agent can read.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use confab_core::{ConfabError, Tool, ToolCallRequest, ToolRegistry, ToolResponse};

use crate::relay::MessageObserver;

#[derive(Default)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.registry.register(tool);
    }

    pub fn can_execute(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Run one call. Never fails: errors become `Error: ...` content.
    pub async fn execute(&self, call: &ToolCallRequest, observer: &dyn MessageObserver) -> ToolResponse {
        let content = match self.run(call, observer).await {
            Ok(content) => content,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                let logic_error = e
                    .downcast_ref::<ConfabError>()
                    .is_some_and(|ce| ce.is_tool_logic() || matches!(ce, ConfabError::ToolNotFound(_)));
                if !logic_error {
                    observer.on_notice(&format!("Error executing {}: {e}", call.name));
                }
                match e.downcast_ref::<ConfabError>() {
                    Some(ConfabError::ToolNotFound(name)) => {
                        format!("Error: Function {name} not found.")
                    }
                    _ => format!("Error: {e}"),
                }
            }
        };
        ToolResponse {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content,
        }
    }

    /// Run calls sequentially in request order.
    pub async fn execute_all(
        &self,
        calls: &[ToolCallRequest],
        observer: &dyn MessageObserver,
    ) -> Vec<ToolResponse> {
        let mut responses = Vec::with_capacity(calls.len());
        for call in calls {
            responses.push(self.execute(call, observer).await);
        }
        responses
    }

    async fn run(&self, call: &ToolCallRequest, observer: &dyn MessageObserver) -> anyhow::Result<String> {
        let tool = self
            .registry
            .get(&call.name)
            .ok_or_else(|| ConfabError::ToolNotFound(call.name.clone()))?;

        let args: Value = if call.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| ConfabError::InvalidArguments {
                tool: call.name.clone(),
                message: format!("{e}. The argument must be in JSON format."),
            })?
        };

        info!(tool = %call.name, call_id = %call.id, "Executing tool call");
        let output = tool.execute(args).await?;
        if let Some(notice) = &output.notice {
            observer.on_notice(notice);
        }
        Ok(output.content)
    }
}
