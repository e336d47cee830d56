use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

pub fn unique_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// True when the URL resolves to the local host. Used to warn when a remote
/// bot is handed a localhost serviceUrl it will never be able to call back.
pub fn is_localhost_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(
            parsed.host_str(),
            Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1")
        ),
        Err(_) => false,
    }
}

/// Decode a base64 (standard or url-safe) blob into JSON, if it is one.
/// Emulator tokens are base64-encoded JSON objects.
pub fn decode_base64_json(token: &str) -> Option<Value> {
    let bytes = STANDARD
        .decode(token)
        .or_else(|_| URL_SAFE_NO_PAD.decode(token))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_detection() {
        assert!(is_localhost_url("http://localhost:3978/api/messages"));
        assert!(is_localhost_url("http://127.0.0.1:3978/api/messages"));
        assert!(!is_localhost_url("https://mybot.azurewebsites.net/api/messages"));
        assert!(!is_localhost_url("not a url"));
    }

    #[test]
    fn base64_json_tokens_decode() {
        let token = STANDARD.encode(r#"{"conversationId":"abc123"}"#);
        let value = decode_base64_json(&token).unwrap();
        assert_eq!(value["conversationId"], "abc123");
        assert!(decode_base64_json("plain-endpoint-id").is_none());
    }
}
