use std::sync::Arc;

use rig::{completion::ToolDefinition, tool::Tool};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::identity::IdentityStore;
use crate::ledger::Ledger;

#[derive(Clone)]
pub struct GetUserNameTool {
    pub ledger: Arc<Ledger>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetUserNameArgs {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetUserNameOutput {
    pub status: String,
    pub name: String,
}

#[derive(Debug, Error)]
#[error("Name lookup error: {0}")]
pub struct GetUserNameError(pub String);

impl Tool for GetUserNameTool {
    const NAME: &'static str = "get_user_name";
    type Error = GetUserNameError;
    type Args = GetUserNameArgs;
    type Output = GetUserNameOutput;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: "get_user_name".to_string(),
            description: "Get the preferred name of a user.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "user_id": {
                        "type": "string",
                        "description": "The ID of the user to get name for."
                    }
                },
                "required": ["user_id"],
                "additionalProperties": false
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let user_id: i64 = args
            .user_id
            .parse()
            .map_err(|_| GetUserNameError(format!("invalid user id `{}`", args.user_id)))?;
        let name = self
            .ledger
            .identity(user_id)
            .await
            .map_err(|e| GetUserNameError(e.to_string()))?
            .and_then(|identity| identity.name)
            .unwrap_or_else(|| "User".to_string());
        Ok(GetUserNameOutput {
            status: "success".to_string(),
            name,
        })
    }
}
