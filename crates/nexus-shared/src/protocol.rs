use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Every message a client can send, as it appears on the wire.
///
/// Payload fields are optional at this layer so that a well-formed object
/// with a missing field can be answered with an error instead of being
/// discarded as undecodable. [`ClientMessage::into_request`] does the
/// validation. Older clients use the snake_case aliases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Register {
        username: Option<String>,
        password: Option<String>,
    },

    Login {
        username: Option<String>,
        password: Option<String>,
    },

    Logout,

    /// Text to a single user. `from` is accepted but never trusted.
    #[serde(alias = "private_msg")]
    Direct {
        from: Option<String>,
        to: Option<String>,
        msg: Option<String>,
    },

    File {
        from: Option<String>,
        to: Option<String>,
        filename: Option<String>,
        file: Option<String>,
    },

    #[serde(alias = "group_msg")]
    GroupMessage {
        from: Option<String>,
        group: Option<String>,
        msg: Option<String>,
    },

    #[serde(alias = "group_file")]
    GroupFile {
        from: Option<String>,
        group: Option<String>,
        filename: Option<String>,
        file: Option<String>,
    },

    #[serde(alias = "create_group")]
    CreateGroup {
        group: Option<String>,
        members: Option<Vec<String>>,
    },
}

/// A validated client message.
#[derive(Clone, PartialEq, Eq)]
pub enum Request {
    Register { username: String, password: String },
    Login { username: String, password: String },
    Logout,
    Direct { to: String, text: String },
    File { to: String, filename: String, blob: String },
    GroupMessage { group: String, text: String },
    GroupFile { group: String, filename: String, blob: String },
    CreateGroup { group: String, members: Vec<String> },
}

impl Request {
    /// Short name for logs. Requests carry credentials and message bodies,
    /// so they are never logged whole.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Register { .. } => "register",
            Request::Login { .. } => "login",
            Request::Logout => "logout",
            Request::Direct { .. } => "direct",
            Request::File { .. } => "file",
            Request::GroupMessage { .. } => "groupMessage",
            Request::GroupFile { .. } => "groupFile",
            Request::CreateGroup { .. } => "createGroup",
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request").field("kind", &self.kind()).finish()
    }
}

impl ClientMessage {
    pub fn into_request(self) -> Result<Request, ProtocolError> {
        let request = match self {
            ClientMessage::Register { username, password } => Request::Register {
                username: present(username, "username")?,
                password: present(password, "password")?,
            },
            ClientMessage::Login { username, password } => Request::Login {
                username: present(username, "username")?,
                password: present(password, "password")?,
            },
            ClientMessage::Logout => Request::Logout,
            ClientMessage::Direct { to, msg, .. } => Request::Direct {
                to: non_empty(to, "to")?,
                text: present(msg, "msg")?,
            },
            ClientMessage::File {
                to, filename, file, ..
            } => Request::File {
                to: non_empty(to, "to")?,
                filename: non_empty(filename, "filename")?,
                blob: present(file, "file")?,
            },
            ClientMessage::GroupMessage { group, msg, .. } => Request::GroupMessage {
                group: non_empty(group, "group")?,
                text: present(msg, "msg")?,
            },
            ClientMessage::GroupFile {
                group,
                filename,
                file,
                ..
            } => Request::GroupFile {
                group: non_empty(group, "group")?,
                filename: non_empty(filename, "filename")?,
                blob: present(file, "file")?,
            },
            ClientMessage::CreateGroup { group, members } => Request::CreateGroup {
                group: non_empty(group, "group")?,
                members: members.ok_or(ProtocolError::MissingField("members"))?,
            },
        };
        Ok(request)
    }
}

fn present(value: Option<String>, field: &'static str) -> Result<String, ProtocolError> {
    value.ok_or(ProtocolError::MissingField(field))
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<String, ProtocolError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ProtocolError::MissingField(field)),
    }
}

/// Every message the relay sends to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Success {
        message: String,
    },

    Error {
        message: String,
    },

    LoginSuccess {
        token: String,
    },

    /// Direct text delivered to its recipient
    Private {
        from: String,
        msg: String,
    },

    /// Direct file delivered to its recipient
    File {
        from: String,
        filename: String,
        file: String,
    },

    GroupMsg {
        group: String,
        from: String,
        msg: String,
    },

    GroupFile {
        group: String,
        from: String,
        filename: String,
        file: String,
    },

    /// Roster of currently connected users
    OnlineUsers {
        users: Vec<String>,
    },
}

impl ServerMessage {
    pub fn success(message: impl Into<String>) -> Self {
        ServerMessage::Success {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ClientMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_camel_case_kinds() {
        let msg = parse(json!({"type": "groupMessage", "from": "a", "group": "g", "msg": "hi"}));
        assert_eq!(
            msg.into_request().unwrap(),
            Request::GroupMessage {
                group: "g".into(),
                text: "hi".into()
            }
        );

        let msg = parse(json!({"type": "createGroup", "group": "g", "members": ["a", "b"]}));
        assert!(matches!(
            msg.into_request().unwrap(),
            Request::CreateGroup { members, .. } if members.len() == 2
        ));
    }

    #[test]
    fn test_parse_legacy_aliases() {
        let msg = parse(json!({"type": "private_msg", "from": "a", "to": "b", "msg": "yo"}));
        assert!(matches!(msg, ClientMessage::Direct { .. }));

        let msg = parse(json!({"type": "group_file", "group": "g", "filename": "f.txt", "file": "AAAA"}));
        assert!(matches!(msg, ClientMessage::GroupFile { .. }));
    }

    #[test]
    fn test_missing_field_is_protocol_error() {
        let msg = parse(json!({"type": "direct", "msg": "no recipient"}));
        assert_eq!(msg.into_request(), Err(ProtocolError::MissingField("to")));

        let msg = parse(json!({"type": "createGroup", "group": "g"}));
        assert_eq!(
            msg.into_request(),
            Err(ProtocolError::MissingField("members"))
        );

        let msg = parse(json!({"type": "file", "to": "b", "filename": "  ", "file": "AA"}));
        assert_eq!(
            msg.into_request(),
            Err(ProtocolError::MissingField("filename"))
        );
    }

    #[test]
    fn test_sender_field_ignored() {
        let msg = parse(json!({"type": "direct", "from": "mallory", "to": "b", "msg": "x"}));
        assert_eq!(
            msg.into_request().unwrap(),
            Request::Direct {
                to: "b".into(),
                text: "x".into()
            }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_value(json!({"type": "selfDestruct"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_request_debug_hides_credentials() {
        let req = Request::Login {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        let printed = format!("{req:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("login"));
    }

    #[test]
    fn test_server_message_wire_shape() {
        let value = serde_json::to_value(ServerMessage::GroupMsg {
            group: "g".into(),
            from: "a".into(),
            msg: "hi".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "group_msg", "group": "g", "from": "a", "msg": "hi"})
        );

        let value = serde_json::to_value(ServerMessage::OnlineUsers {
            users: vec!["a".into()],
        })
        .unwrap();
        assert_eq!(value, json!({"type": "online_users", "users": ["a"]}));

        let value = serde_json::to_value(ServerMessage::LoginSuccess { token: "t".into() }).unwrap();
        assert_eq!(value, json!({"type": "login_success", "token": "t"}));
    }
}
