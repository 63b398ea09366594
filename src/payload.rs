use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

const ERROR_CODE: &str = "errorCode";
const ERROR_MESSAGE: &str = "errorMessage";

/// Decoded query parameters of one callback from Bear.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CallbackPayload(Map<String, Value>);

/// The closed set of shapes a callback can take.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadShape {
    Success,
    ApplicationError { code: i64, message: String },
    /// Error markers are present but cannot be read as a code/message pair.
    Unrecognized,
}

impl CallbackPayload {
    /// Decode a raw (still percent-encoded) query string.
    ///
    /// Each value is tried as JSON first so that Bear's array fields
    /// (`tags`, `notes`) come through structured; anything else stays the
    /// decoded string. A repeated key keeps its last value.
    pub fn from_query(query: &str) -> Self {
        let mut fields = Map::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let decoded = serde_json::from_str::<Value>(&value)
                .unwrap_or_else(|_| Value::String(value.clone().into_owned()));
            fields.insert(key.into_owned(), decoded);
        }
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[cfg(test)]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn classify(&self) -> PayloadShape {
        let code = self.get(ERROR_CODE);
        let message = self.get(ERROR_MESSAGE);

        match (code, message) {
            (None, None) => PayloadShape::Success,
            (Some(code), message) => match as_integer(code) {
                Some(code) => PayloadShape::ApplicationError {
                    code,
                    message: message.map(as_text).unwrap_or_default(),
                },
                None => PayloadShape::Unrecognized,
            },
            (None, Some(_)) => PayloadShape::Unrecognized,
        }
    }
}

impl fmt::Display for CallbackPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_array_value_decodes_as_sequence() {
        let payload = CallbackPayload::from_query("tags=%5B%22work%22%2C%22ideas%22%5D");
        assert_eq!(payload.get("tags"), Some(&json!(["work", "ideas"])));
    }

    #[test]
    fn test_non_json_value_stays_decoded_string() {
        let payload = CallbackPayload::from_query("title=hello%20world&note=a+b");
        assert_eq!(payload.get_str("title"), Some("hello world"));
        assert_eq!(payload.get_str("note"), Some("a b"));
    }

    #[test]
    fn test_malformed_json_degrades_to_string() {
        let payload = CallbackPayload::from_query("notes=%5B%7B%22title%22");
        assert_eq!(payload.get_str("notes"), Some("[{\"title\""));
    }

    #[test]
    fn test_repeated_key_keeps_last_value() {
        let payload = CallbackPayload::from_query("id=first&id=second");
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.get_str("id"), Some("second"));
    }

    #[test]
    fn test_empty_query() {
        let payload = CallbackPayload::from_query("");
        assert!(payload.is_empty());
        assert_eq!(payload.classify(), PayloadShape::Success);
    }

    #[test]
    fn test_classify_success() {
        let payload = CallbackPayload::from_query("identifier=abc123&title=Hello");
        assert_eq!(payload.classify(), PayloadShape::Success);
    }

    #[test]
    fn test_classify_application_error() {
        let payload = CallbackPayload::from_query("errorCode=1&errorMessage=Not%20Found");
        assert_eq!(
            payload.classify(),
            PayloadShape::ApplicationError {
                code: 1,
                message: "Not Found".to_string()
            }
        );
    }

    #[test]
    fn test_classify_code_without_message() {
        let payload = CallbackPayload::from_query("errorCode=3");
        assert_eq!(
            payload.classify(),
            PayloadShape::ApplicationError {
                code: 3,
                message: String::new()
            }
        );
    }

    #[test]
    fn test_classify_unrecognized_markers() {
        let message_only = CallbackPayload::from_query("errorMessage=oops");
        assert_eq!(message_only.classify(), PayloadShape::Unrecognized);

        let bad_code = CallbackPayload::from_query("errorCode=abc&errorMessage=oops");
        assert_eq!(bad_code.classify(), PayloadShape::Unrecognized);
    }

    #[test]
    fn test_display_is_json() {
        let payload = CallbackPayload::from_query("identifier=abc123");
        assert_eq!(payload.to_string(), r#"{"identifier":"abc123"}"#);
    }
}
