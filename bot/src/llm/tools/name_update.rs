use std::sync::Arc;

use rig::{completion::ToolDefinition, tool::Tool};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::identity::IdentityStore;
use crate::ledger::Ledger;

#[derive(Clone)]
pub struct UpdateUserNameTool {
    pub ledger: Arc<Ledger>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserNameArgs {
    pub user_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateUserNameOutput {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("Name update error: {0}")]
pub struct UpdateUserNameError(pub String);

impl Tool for UpdateUserNameTool {
    const NAME: &'static str = "update_user_name";
    type Error = UpdateUserNameError;
    type Args = UpdateUserNameArgs;
    type Output = UpdateUserNameOutput;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: "update_user_name".to_string(),
            description: "Update the preferred name of a user.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "user_id": {
                        "type": "string",
                        "description": "The ID of the user to update name for."
                    },
                    "name": {
                        "type": "string",
                        "description": "The new preferred name for the user."
                    }
                },
                "required": ["user_id", "name"],
                "additionalProperties": false
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let user_id: i64 = args
            .user_id
            .parse()
            .map_err(|_| UpdateUserNameError(format!("invalid user id `{}`", args.user_id)))?;
        self.ledger
            .set_name(user_id, &args.name)
            .await
            .map_err(|e| UpdateUserNameError(e.to_string()))?;
        tracing::info!("Updated name for user {user_id} to {}", args.name);
        Ok(UpdateUserNameOutput {
            status: "success".to_string(),
            message: format!(
                "Name for user {} updated successfully to '{}'.",
                args.user_id, args.name
            ),
        })
    }
}
