use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::bridge::CorrelationBridge;
use crate::config::Config;
use crate::dispatcher::{ActionDispatcher, UrlOpener};
use crate::tools::catalog::ACTIONS;
use crate::tools::{BearAction, CheckDatabase, ListNotes, SetToken, Tool};

const SERVER_NAME: &str = "bear-bridge";
const DEFAULT_PROTOCOL: &str = "2024-11-05";

/// MCP server exposing Bear actions as tools.
pub struct McpServer {
    actions: Vec<BearAction>,
    set_token: SetToken,
    check_database: CheckDatabase,
    list_notes: ListNotes,
}

impl McpServer {
    pub fn new(config: &Config, opener: Arc<dyn UrlOpener>) -> Self {
        let dispatcher = ActionDispatcher::new(config.bear.scheme.clone(), opener);
        let bridge = Arc::new(CorrelationBridge::new(dispatcher, config.listener()));
        let tokens = Arc::new(config.token_store());
        let timeout = config.callback_timeout();
        let database = Arc::new(config.bear_database());

        let actions = ACTIONS
            .iter()
            .map(|spec| BearAction::new(spec, bridge.clone(), tokens.clone(), timeout))
            .collect();

        Self {
            actions,
            set_token: SetToken::new(tokens),
            check_database: CheckDatabase::new(database.clone()),
            list_notes: ListNotes::new(database),
        }
    }

    /// Serve line-delimited JSON-RPC until stdin closes.
    ///
    /// Requests are handled one at a time, which keeps round trips on the
    /// callback port strictly sequential.
    pub async fn run_stdio(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            if line.trim().is_empty() {
                continue;
            }

            let msg: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("Skipping unparseable message: {}", e);
                    continue;
                }
            };

            if let Some(reply) = self.handle_message(&msg).await {
                let mut out = reply.to_string();
                out.push('\n');
                stdout.write_all(out.as_bytes()).await?;
                stdout.flush().await?;
            }
        }

        log::info!("stdin closed, shutting down");
        Ok(())
    }

    /// Returns `None` for notifications, which get no reply.
    pub async fn handle_message(&self, msg: &Value) -> Option<Value> {
        let id = msg.get("id").cloned()?;
        let method = msg.get("method").and_then(Value::as_str).unwrap_or("");

        let reply = match method {
            "initialize" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": msg
                        .get("params")
                        .and_then(|p| p.get("protocolVersion"))
                        .cloned()
                        .unwrap_or(json!(DEFAULT_PROTOCOL)),
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") }
                }
            }),
            "ping" => json!({ "jsonrpc": "2.0", "id": id, "result": {} }),
            "tools/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "tools": self.tool_list() }
            }),
            "tools/call" => {
                let params = msg.get("params").cloned().unwrap_or(json!({}));
                self.tool_call(id, &params).await
            }
            "resources/list" => {
                json!({ "jsonrpc": "2.0", "id": id, "result": { "resources": [] } })
            }
            "prompts/list" => json!({ "jsonrpc": "2.0", "id": id, "result": { "prompts": [] } }),
            _ => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {method}") }
            }),
        };
        Some(reply)
    }

    fn tool_list(&self) -> Vec<Value> {
        let mut tools: Vec<Value> = self.actions.iter().map(describe).collect();
        tools.push(describe(&self.set_token));
        tools.push(describe(&self.check_database));
        tools.push(describe(&self.list_notes));
        tools
    }

    async fn tool_call(&self, id: Value, params: &Value) -> Value {
        let name = params.get("name").and_then(Value::as_str).unwrap_or("");
        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        let result = if name == self.set_token.name() {
            self.set_token.run(args).await
        } else if name == self.check_database.name() {
            self.check_database.run(args).await
        } else if name == self.list_notes.name() {
            self.list_notes.run(args).await
        } else if let Some(action) = self.actions.iter().find(|a| a.name() == name) {
            action.run(args).await
        } else {
            Err(anyhow::anyhow!("Unknown tool: {}", name))
        };

        let (text, is_error) = match result {
            Ok(text) => (text, false),
            Err(e) => (format!("Error: {:#}", e), true),
        };

        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "content": [{ "type": "text", "text": text }], "isError": is_error }
        })
    }
}

fn describe<T: Tool>(tool: &T) -> Value {
    json!({
        "name": tool.name(),
        "description": tool.description(),
        "inputSchema": tool.input_schema(),
    })
}
