use anyhow::{bail, Result};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::catalog::{ActionSpec, ParamKind};
use super::Tool;
use crate::bridge::{CorrelationBridge, Outcome, RoundTrip};
use crate::dispatcher::OutgoingAction;
use crate::token::TokenStore;

/// Runs one catalog entry through the correlation bridge.
pub struct BearAction {
    spec: &'static ActionSpec,
    bridge: Arc<CorrelationBridge>,
    tokens: Arc<TokenStore>,
    timeout: Duration,
}

impl BearAction {
    pub fn new(
        spec: &'static ActionSpec,
        bridge: Arc<CorrelationBridge>,
        tokens: Arc<TokenStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            spec,
            bridge,
            tokens,
            timeout,
        }
    }

    /// Marshal tool arguments into Bear query parameters.
    fn build_action(spec: &ActionSpec, args: &Value) -> Result<OutgoingAction> {
        let mut action = OutgoingAction::new(spec.action);

        for param in spec.params {
            let arg = args.get(param.name);
            let value = match param.kind {
                ParamKind::Text => arg.and_then(as_text),
                ParamKind::Flag => arg.filter(|v| is_truthy(v)).map(|_| "yes".to_string()),
                ParamKind::Choice(options) => match arg.and_then(as_text) {
                    Some(choice) if !options.iter().any(|o| *o == choice) => {
                        bail!(
                            "Invalid value '{}' for '{}' (expected one of: {})",
                            choice,
                            param.name,
                            options.join(", ")
                        );
                    }
                    other => other,
                },
            };

            if param.required && value.is_none() {
                bail!("Missing required argument '{}'", param.name);
            }
            action.set(param.name, value);
        }

        for (key, value) in spec.fixed {
            action.set(key, Some(value.to_string()));
        }
        Ok(action)
    }

    fn schema(spec: &ActionSpec) -> Value {
        let mut properties = Map::new();
        for param in spec.params {
            let mut schema = match param.kind {
                ParamKind::Text => json!({ "type": "string" }),
                ParamKind::Flag => json!({ "type": "boolean" }),
                ParamKind::Choice(options) => json!({ "type": "string", "enum": options }),
            };
            schema["description"] = json!(param.description);
            properties.insert(param.name.to_string(), schema);
        }

        let required: Vec<&str> = spec
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    fn render(&self, outcome: Outcome) -> Result<String> {
        match outcome {
            Outcome::Dispatched => Ok(format!("{} in Bear", self.spec.done)),
            Outcome::Fulfilled(payload) if payload.is_empty() => {
                Ok(format!("{} in Bear", self.spec.done))
            }
            Outcome::Fulfilled(payload) => Ok(serde_json::to_string_pretty(&payload)?),
        }
    }
}

#[async_trait::async_trait]
impl Tool for BearAction {
    type Input = Value;
    type Output = String;

    fn name(&self) -> &str {
        self.spec.tool
    }

    fn description(&self) -> &str {
        self.spec.description
    }

    fn input_schema(&self) -> Value {
        Self::schema(self.spec)
    }

    async fn run(&self, args: Value) -> Result<String> {
        let action = Self::build_action(self.spec, &args)?;
        log::info!("{}: dispatching Bear action '{}'", self.spec.tool, self.spec.action);

        let request = if self.spec.expects_callback {
            RoundTrip::with_callback(action, self.timeout)
        } else {
            RoundTrip::fire_and_forget(action)
        }
        .needs_token(self.spec.needs_token);

        let outcome = self.bridge.round_trip(request, self.tokens.as_ref()).await?;
        self.render(outcome)
    }
}

/// Empty strings count as absent, like an unset argument.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.as_str(), "yes" | "true" | "1"),
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::tests::RecordingOpener;
    use crate::dispatcher::ActionDispatcher;
    use crate::listener::tests::test_config;
    use crate::tools::catalog::find;

    fn spec(tool: &str) -> &'static ActionSpec {
        find(tool).unwrap()
    }

    #[test]
    fn test_build_create_note() {
        let args = json!({
            "title": "Groceries",
            "text": "",
            "clipboard": true,
            "timestamp": false
        });
        let action = BearAction::build_action(spec("create_note"), &args).unwrap();
        let url = action.to_url("bear").unwrap();
        assert_eq!(
            url.as_str(),
            "bear://x-callback-url/create?clipboard=yes&open_note=no&title=Groceries"
        );
    }

    #[test]
    fn test_missing_required_argument() {
        let err = BearAction::build_action(spec("add_text"), &json!({"id": "N1"})).unwrap_err();
        assert_eq!(err.to_string(), "Missing required argument 'text'");
    }

    #[test]
    fn test_choice_is_validated() {
        let prepend = json!({"text": "x", "mode": "prepend"});
        let ok = BearAction::build_action(spec("add_text"), &prepend);
        assert_eq!(
            ok.unwrap().parameters.get("mode").cloned().flatten().as_deref(),
            Some("prepend")
        );

        let sideways = json!({"text": "x", "mode": "sideways"});
        let err = BearAction::build_action(spec("add_text"), &sideways).unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn test_search_runs_in_background() {
        let args = json!({"term": "rust"});
        let action = BearAction::build_action(spec("search_notes"), &args).unwrap();
        let url = action.to_url("bear").unwrap();
        assert_eq!(url.as_str(), "bear://x-callback-url/search?show_window=no&term=rust");
    }

    #[test]
    fn test_schema_lists_required_and_enum() {
        let schema = BearAction::schema(spec("add_text"));
        assert_eq!(schema["required"], json!(["text"]));
        assert_eq!(schema["properties"]["new_line"]["type"], "boolean");
        assert_eq!(schema["properties"]["mode"]["enum"][3], "replace_all");
    }

    #[tokio::test]
    async fn test_fire_and_forget_reply() {
        let opener = Arc::new(RecordingOpener::default());
        let bridge = Arc::new(CorrelationBridge::new(
            ActionDispatcher::new("bear", opener.clone()),
            test_config(),
        ));
        let dir = tempfile::tempdir().unwrap();
        let tokens = Arc::new(TokenStore::new(
            dir.path().join("token"),
            "BEAR_BRIDGE_TEST_UNSET_6",
        ));
        let tool = BearAction::new(spec("trash_note"), bridge, tokens, Duration::from_secs(1));

        let reply = tool.run(json!({"id": "N1"})).await.unwrap();
        assert_eq!(reply, "Note moved to trash in Bear");
        assert_eq!(
            opener.opened.lock().unwrap()[0].as_str(),
            "bear://x-callback-url/trash?id=N1"
        );
    }
}
