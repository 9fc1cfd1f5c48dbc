use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text produced by one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    /// Model reported by the backend, when known
    #[serde(default)]
    pub model: Option<String>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl Generation {
    pub fn new(text: String, duration: Duration) -> Self {
        Self {
            text,
            model: None,
            duration,
        }
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
