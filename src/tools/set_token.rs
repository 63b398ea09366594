use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;

use super::Tool;
use crate::token::TokenStore;

/// Stores the Bear API token used by search and tag actions.
pub struct SetToken {
    store: Arc<TokenStore>,
}

impl SetToken {
    pub fn new(store: Arc<TokenStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for SetToken {
    type Input = Value;
    type Output = String;

    fn name(&self) -> &str {
        "set_bear_token"
    }

    fn description(&self) -> &str {
        "Set the Bear app token (Help → Advanced → API Token) used to search notes and list tags"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "token": { "type": "string", "description": "Your Bear app token" }
            },
            "required": ["token"]
        })
    }

    async fn run(&self, args: Value) -> Result<String> {
        let token = args
            .get("token")
            .and_then(Value::as_str)
            .context("Missing required argument 'token'")?;
        self.store.save(token)?;
        Ok(format!("Bear token saved to {}", self.store.file().display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenSource;

    #[tokio::test]
    async fn test_saves_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TokenStore::new(dir.path().join("token"), "BEAR_BRIDGE_TEST_UNSET_4"));
        let tool = SetToken::new(store.clone());

        let reply = tool.run(json!({"token": "XYZ"})).await.unwrap();
        assert!(reply.contains("saved"));
        assert_eq!(store.load().as_deref(), Some("XYZ"));
    }

    #[tokio::test]
    async fn test_missing_token_argument() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TokenStore::new(dir.path().join("token"), "BEAR_BRIDGE_TEST_UNSET_5"));
        let err = SetToken::new(store).run(json!({})).await.unwrap_err();
        assert!(err.to_string().contains("token"));
    }
}
