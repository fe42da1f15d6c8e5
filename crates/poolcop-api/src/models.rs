// Wire types for the PoolCopilot API.
//
// The status payload is deliberately left as `serde_json::Value`: the
// firmware omits whole branches depending on installed equipment, and
// consumers address it by dotted path instead of typed fields.

use serde::Deserialize;
use serde_json::Value;

/// Response of `POST token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    /// Token lifetime in seconds (defaults to the documented 900 s when absent).
    #[serde(default, alias = "validity")]
    pub expires_in: Option<u64>,
    /// Identifier of the PoolCop bound to this API key.
    #[serde(default, alias = "poolcop_id", alias = "PoolCopId")]
    pub poolcop: Option<Value>,
}

impl TokenResponse {
    /// The device id as a string, whether the API sent it as text or a number.
    pub fn poolcop_id(&self) -> Option<String> {
        match self.poolcop.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Error body shape: `{"error": "..."}` or `{"error": {"message": "..."}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn message(&self) -> Option<String> {
        match &self.error {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(map)) => map
                .get("message")
                .and_then(Value::as_str)
                .map(String::from),
            _ => self.message.clone(),
        }
    }
}
