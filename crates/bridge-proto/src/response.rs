//! Reply envelopes returned by the command service.

use serde_json::{json, Value};

/// Every handler ultimately produces one JSON value: either a
/// method-specific success shape, or `{"error": "<message>"}`. This helper
/// centralizes the error shape so every handler uses it identically.
pub fn error_reply(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

pub fn raw_reply(status: &str, raw: &str) -> Value {
    json!({ "status": status, "raw": raw })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_reply_has_error_key() {
        let v = error_reply("boom");
        assert_eq!(v["error"], "boom");
    }

    #[test]
    fn raw_reply_has_status_and_raw() {
        let v = raw_reply("ok", "resp 0");
        assert_eq!(v["status"], "ok");
        assert_eq!(v["raw"], "resp 0");
    }
}
