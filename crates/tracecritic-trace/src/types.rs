use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Author of a conversational turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" | "human" => Ok(Role::User),
            "assistant" | "model" | "ai" => Ok(Role::Assistant),
            "system" | "developer" => Ok(Role::System),
            "tool" | "function" => Ok(Role::Tool),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let role = String::deserialize(deserializer)?;
        role.parse().map_err(D::Error::custom)
    }
}

/// A single function invocation requested by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ToolCallRepr")]
pub struct ToolCall {
    pub function_name: String,
    /// Arguments as emitted by the model, usually a JSON object encoded as text
    pub arguments: String,
}

impl ToolCall {
    pub fn new(function_name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Accepts the flat `{function, arguments}` shape as well as the nested
/// `{function: {name, arguments}}` shape used by chat-completion APIs.
#[derive(Deserialize)]
struct ToolCallRepr {
    #[serde(default)]
    function_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    function: Option<FunctionRepr>,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FunctionRepr {
    Name(String),
    Call {
        name: String,
        #[serde(default)]
        arguments: Option<Value>,
    },
}

impl From<ToolCallRepr> for ToolCall {
    fn from(repr: ToolCallRepr) -> Self {
        let (nested_name, nested_args) = match repr.function {
            Some(FunctionRepr::Name(name)) => (Some(name), None),
            Some(FunctionRepr::Call { name, arguments }) => (Some(name), arguments),
            None => (None, None),
        };

        let function_name = repr
            .function_name
            .or(nested_name)
            .or(repr.name)
            .unwrap_or_default();

        let arguments = match repr.arguments.or(nested_args) {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        Self {
            function_name,
            arguments,
        }
    }
}

/// One turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Stable per-record identifier (the backend's span id when available)
    #[serde(default, alias = "span_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "content_as_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tool_calls: Vec<ToolCall>,
}

/// The primary payload of an interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    ToolCall(&'a ToolCall),
    Text(&'a str),
}

impl Interaction {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            name: None,
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Assistant turn whose payload is a list of tool calls
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            id: None,
            role: Role::Assistant,
            name: None,
            content: None,
            tool_calls: calls,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Tool calls take precedence over plain content. Only the first call
    /// is considered.
    pub fn payload(&self) -> Payload<'_> {
        match self.tool_calls.first() {
            Some(call) => Payload::ToolCall(call),
            None => Payload::Text(self.content.as_deref().unwrap_or("")),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// A stored trace record: either a normalized interaction or an opaque
/// backend span carrying vendor-specific attributes.
///
/// Any object with a `role` key is read as an interaction. If it does not
/// parse as one it is kept as [`SpanRecord::Invalid`] so the problem can be
/// reported at its position instead of being mistaken for a backend span.
#[derive(Debug, Clone, PartialEq)]
pub enum SpanRecord {
    Interaction(Interaction),
    Raw(Value),
    Invalid { error: String, value: Value },
}

impl SpanRecord {
    /// Classify one stored JSON record
    pub fn from_value(value: Value) -> Self {
        if value.get("role").is_none() {
            return SpanRecord::Raw(value);
        }
        match Interaction::deserialize(&value) {
            Ok(interaction) => SpanRecord::Interaction(interaction),
            Err(e) => SpanRecord::Invalid {
                error: e.to_string(),
                value,
            },
        }
    }

    /// Identifier used to look a record up by span id
    pub fn span_id(&self) -> Option<&str> {
        match self {
            SpanRecord::Interaction(interaction) => interaction.id.as_deref(),
            SpanRecord::Raw(value) | SpanRecord::Invalid { value, .. } => value
                .get("span_id")
                .or_else(|| value.get("id"))
                .and_then(Value::as_str),
        }
    }

    pub fn as_interaction(&self) -> Option<&Interaction> {
        match self {
            SpanRecord::Interaction(interaction) => Some(interaction),
            SpanRecord::Raw(_) | SpanRecord::Invalid { .. } => None,
        }
    }
}

impl Serialize for SpanRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            SpanRecord::Interaction(interaction) => interaction.serialize(serializer),
            SpanRecord::Raw(value) | SpanRecord::Invalid { value, .. } => {
                value.serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for SpanRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(SpanRecord::from_value)
    }
}

fn content_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ToolCall>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ToolCall>>::deserialize(deserializer)?.unwrap_or_default())
}
