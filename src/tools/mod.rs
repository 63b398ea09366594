pub mod bear_action;
pub mod catalog;
pub mod database;
pub mod set_token;

pub use bear_action::BearAction;
pub use database::{CheckDatabase, ListNotes};
pub use set_token::SetToken;

use anyhow::Result;
use serde_json::Value;

/// Tool trait for agent-callable operations.
///
/// Not object-safe (associated types). The server calls tools by
/// concrete type, not `dyn Tool`.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    type Input: Send;
    type Output: Send;

    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema advertised in `tools/list`.
    fn input_schema(&self) -> Value;
    async fn run(&self, input: Self::Input) -> Result<Self::Output>;
}
