use serde_json::{Value, json};

use super::ProtocolError;

pub const DEFAULT_NAMESPACE: &str = "/";

/// A Socket.IO packet carried inside an Engine.IO `message`.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        nsp: String,
        data: Option<Value>,
    },
    Disconnect {
        nsp: String,
    },
    Event {
        nsp: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        nsp: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        nsp: String,
        message: String,
    },
}

impl SocketPacket {
    pub fn connect() -> Self {
        Self::Connect {
            nsp: DEFAULT_NAMESPACE.to_string(),
            data: None,
        }
    }

    pub fn disconnect() -> Self {
        Self::Disconnect {
            nsp: DEFAULT_NAMESPACE.to_string(),
        }
    }

    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self::Event {
            nsp: DEFAULT_NAMESPACE.to_string(),
            id: None,
            name: name.into(),
            args: vec![data],
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { nsp, .. }
            | Self::Disconnect { nsp }
            | Self::Event { nsp, .. }
            | Self::Ack { nsp, .. }
            | Self::ConnectError { nsp, .. } => nsp,
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        if matches!(kind, '5' | '6') {
            return Err(ProtocolError::BinaryUnsupported);
        }
        if !matches!(kind, '0'..='4') {
            return Err(ProtocolError::UnknownSocketType(kind));
        }

        let (nsp, rest) = split_namespace(chars.as_str());
        let (id, body) = split_ack_id(rest)?;
        let payload = parse_json(body)?;

        match kind {
            '0' => Ok(Self::Connect { nsp, data: payload }),
            '1' => Ok(Self::Disconnect { nsp }),
            '2' => {
                let mut args = into_array(payload)?;
                if args.is_empty() {
                    return Err(ProtocolError::MissingEventName);
                }
                let Value::String(name) = args.remove(0) else {
                    return Err(ProtocolError::MissingEventName);
                };
                Ok(Self::Event {
                    nsp,
                    id,
                    name,
                    args,
                })
            }
            '3' => {
                let id = id.ok_or_else(|| {
                    ProtocolError::InvalidPayload("ack packet without id".to_string())
                })?;
                Ok(Self::Ack {
                    nsp,
                    id,
                    args: into_array(payload)?,
                })
            }
            _ => Ok(Self::ConnectError {
                nsp,
                message: connect_error_message(payload),
            }),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Connect { nsp, data } => {
                let body = data.as_ref().map(Value::to_string).unwrap_or_default();
                format!("0{}{body}", namespace_prefix(nsp))
            }
            Self::Disconnect { nsp } => format!("1{}", namespace_prefix(nsp)),
            Self::Event {
                nsp,
                id,
                name,
                args,
            } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                let id = id.map(|id| id.to_string()).unwrap_or_default();
                format!("2{}{id}{}", namespace_prefix(nsp), Value::Array(items))
            }
            Self::Ack { nsp, id, args } => {
                format!("3{}{id}{}", namespace_prefix(nsp), Value::Array(args.clone()))
            }
            Self::ConnectError { nsp, message } => {
                format!("4{}{}", namespace_prefix(nsp), json!({ "message": message }))
            }
        }
    }
}

fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_string(), rest);
    }
    match rest.split_once(',') {
        Some((nsp, tail)) => (nsp.to_string(), tail),
        None => (rest.to_string(), ""),
    }
}

fn split_ack_id(rest: &str) -> Result<(Option<u64>, &str), ProtocolError> {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Ok((None, rest));
    }
    let id = rest[..digits]
        .parse::<u64>()
        .map_err(|err| ProtocolError::InvalidPayload(format!("bad ack id: {err}")))?;
    Ok((Some(id), &rest[digits..]))
}

fn parse_json(body: &str) -> Result<Option<Value>, ProtocolError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body)
        .map(Some)
        .map_err(|err| ProtocolError::InvalidPayload(err.to_string()))
}

fn into_array(payload: Option<Value>) -> Result<Vec<Value>, ProtocolError> {
    match payload {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ProtocolError::InvalidPayload(format!(
            "expected array, got {other}"
        ))),
    }
}

fn connect_error_message(payload: Option<Value>) -> String {
    match payload {
        Some(Value::String(message)) => message,
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("connection refused")
            .to_string(),
        _ => "connection refused".to_string(),
    }
}

fn namespace_prefix(nsp: &str) -> String {
    if nsp == DEFAULT_NAMESPACE {
        String::new()
    } else {
        format!("{nsp},")
    }
}
