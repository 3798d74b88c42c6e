use std::sync::Arc;

use rig::{completion::ToolDefinition, tool::Tool};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::identity::IdentityStore;
use crate::ledger::Ledger;

#[derive(Clone)]
pub struct UpdateUserMemoryTool {
    pub ledger: Arc<Ledger>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserMemoryArgs {
    pub user_id: String,
    pub memory: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateUserMemoryOutput {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("Memory update error: {0}")]
pub struct UpdateUserMemoryError(pub String);

impl Tool for UpdateUserMemoryTool {
    const NAME: &'static str = "update_user_memory";
    type Error = UpdateUserMemoryError;
    type Args = UpdateUserMemoryArgs;
    type Output = UpdateUserMemoryOutput;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: "update_user_memory".to_string(),
            description: "Update memory about a user.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "user_id": {
                        "type": "string",
                        "description": "The ID of the user to update memory for."
                    },
                    "memory": {
                        "type": "string",
                        "description": "The new memory to replace the old memory (try to keep previous memory information intact by restating it unless requested to remove certain details)."
                    }
                },
                "required": ["user_id", "memory"],
                "additionalProperties": false
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let user_id: i64 = args
            .user_id
            .parse()
            .map_err(|_| UpdateUserMemoryError(format!("invalid user id `{}`", args.user_id)))?;
        self.ledger
            .set_description(user_id, &args.memory)
            .await
            .map_err(|e| UpdateUserMemoryError(e.to_string()))?;
        tracing::info!("Updated memory for user {user_id}");
        Ok(UpdateUserMemoryOutput {
            status: "success".to_string(),
            message: format!(
                "Memory for user {} updated successfully to '{}'.",
                args.user_id, args.memory
            ),
        })
    }
}
