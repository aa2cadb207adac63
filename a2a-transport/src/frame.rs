use a2a_core::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Destination of a frame: a single agent, an explicit set, or every active agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Single(AgentId),
    Multiple(Vec<AgentId>),
    Broadcast,
}

impl Serialize for Target {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Target::Single(id) => id.to_string().serialize(serializer),
            Target::Multiple(ids) => {
                let strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                strings.serialize(serializer)
            }
            Target::Broadcast => "broadcast".serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        let parse = |s: &str| -> Result<AgentId, D::Error> {
            uuid::Uuid::parse_str(s)
                .map(AgentId)
                .map_err(|e| serde::de::Error::custom(e.to_string()))
        };

        match Raw::deserialize(deserializer)? {
            Raw::One(s) if s == "broadcast" => Ok(Target::Broadcast),
            Raw::One(s) => Ok(Target::Single(parse(&s)?)),
            Raw::Many(ids) => {
                let parsed: Result<Vec<AgentId>, D::Error> = ids.iter().map(|s| parse(s)).collect();
                Ok(Target::Multiple(parsed?))
            }
        }
    }
}

/// Priority hint carried alongside a frame; consensus uses this to jump the queue for
/// view-change and heartbeat traffic ahead of ordinary capability calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

/// A JSON-RPC 2.0 request or notification (an `id` of `None` makes it a notification — no
/// response is expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    pub params: Value,
    pub id: Option<String>,
    pub from: AgentId,
    pub to: Target,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "messageType")]
    pub message_type: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: JsonRpcVersion,
    pub id: String,
    pub from: AgentId,
    pub to: Target,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: JsonRpcOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonRpcOutcome {
    Result(Value),
    Error(JsonRpcError),
}

/// Always `"2.0"`; a distinct type so a mismatched version fails to deserialize instead of
/// silently round-tripping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        "2.0".serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "2.0" {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!("unsupported jsonrpc version {s}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_broadcast_round_trips() {
        let json = serde_json::to_string(&Target::Broadcast).unwrap();
        assert_eq!(json, "\"broadcast\"");
        let back: Target = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Target::Broadcast);
    }

    #[test]
    fn target_single_round_trips() {
        let id = AgentId::new();
        let target = Target::Single(id);
        let json = serde_json::to_string(&target).unwrap();
        let back: Target = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Target::Single(id));
    }

    #[test]
    fn target_multiple_round_trips() {
        let ids = vec![AgentId::new(), AgentId::new()];
        let target = Target::Multiple(ids.clone());
        let json = serde_json::to_string(&target).unwrap();
        let back: Target = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Target::Multiple(ids));
    }

    #[test]
    fn notification_has_no_id() {
        let req = JsonRpcRequest {
            jsonrpc: JsonRpcVersion,
            method: "consensus.pre-prepare".to_string(),
            params: serde_json::json!({}),
            id: None,
            from: AgentId::new(),
            to: Target::Broadcast,
            timestamp: Utc::now(),
            message_type: "consensus".to_string(),
            priority: Some(Priority::High),
            signature: None,
            nonce: None,
            context: None,
        };
        assert!(req.is_notification());
    }
}
