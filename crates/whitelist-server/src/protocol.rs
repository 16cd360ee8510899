//! JSON-lines request/response messages

use serde::{Deserialize, Serialize};
use whitelist_core::{ErrorKind, Requester, WhitelistError};

/// Request ID (can be string or number)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

/// Chat identity attached to a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// One inbound command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub sender: Sender,
    /// Chat-group context, checked against the origin allow-set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Request {
    pub fn requester(&self) -> Requester {
        Requester {
            id: self.sender.id.clone(),
            name: self.sender.name.clone(),
            origin: self.origin.clone(),
        }
    }
}

/// Reply to one command; `text` is always human-readable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// `None` when the request line could not be parsed
    pub id: Option<RequestId>,
    pub ok: bool,
    pub kind: Option<ErrorKind>,
    pub text: String,
}

impl Response {
    pub fn success(id: RequestId, text: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            ok: true,
            kind: None,
            text: text.into(),
        }
    }

    pub fn failure(id: Option<RequestId>, error: &WhitelistError) -> Self {
        Self {
            id,
            ok: false,
            kind: Some(error.kind()),
            text: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialize() {
        let request: Request = serde_json::from_str(
            r#"{"id": 7, "command": "bind", "args": ["Steve"], "sender": {"id": "10001", "name": "alice"}, "origin": "group-a"}"#,
        )
        .unwrap();
        assert_eq!(request.id, RequestId::Number(7));
        let requester = request.requester();
        assert_eq!(requester.id, "10001");
        assert_eq!(requester.origin.as_deref(), Some("group-a"));
    }

    #[test]
    fn test_request_defaults() {
        let request: Request =
            serde_json::from_str(r#"{"id": "a", "command": "query", "sender": {"id": "1"}}"#)
                .unwrap();
        assert!(request.args.is_empty());
        assert!(request.origin.is_none());
        assert_eq!(request.sender.name, "");
    }

    #[test]
    fn test_failure_response_shape() {
        let response = Response::failure(
            Some(RequestId::Number(1)),
            &WhitelistError::AlreadyBound("Steve".into()),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["kind"], "AlreadyBound");
        assert_eq!(json["text"], "Game ID Steve is already bound to your account");
    }

    #[test]
    fn test_success_response_has_null_kind() {
        let json = serde_json::to_value(Response::success(RequestId::Number(2), "done")).unwrap();
        assert_eq!(json["ok"], true);
        assert!(json["kind"].is_null());
    }
}
