use serde_json::{Map, Value};

use crate::{ModelError, TaskIds, TaskKind};

/// Environment variable naming the task kind.
pub const ENV_TASK_TYPE: &str = "SHIPYARD_TASK_TYPE";
/// Environment variable carrying the JSON parameter object.
pub const ENV_TASK_PAYLOAD: &str = "SHIPYARD_TASK_PAYLOAD";

/// Scheduler payload after parsing, before kind-specific validation.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub kind: TaskKind,
    pub ids: TaskIds,
    /// Whole parameter object, identifiers included.
    pub payload: Map<String, Value>,
}

impl TaskRequest {
    /// Parse a kind string and a JSON payload.
    ///
    /// Every failure here is a [`ModelError::Parse`]: the payload is malformed or lacks the identifiers all kinds share.
    pub fn parse(kind: &str, payload: &str) -> Result<Self, ModelError> {
        let kind: TaskKind = kind.parse()?;

        let value: Value = serde_json::from_str(payload)
            .map_err(|e| ModelError::parse(format!("payload is not valid JSON: {e}")))?;
        let Value::Object(payload) = value else {
            return Err(ModelError::parse("payload must be a JSON object"));
        };

        let ids: TaskIds = serde_json::from_value(Value::Object(payload.clone()))
            .map_err(|e| ModelError::parse(format!("missing task identifiers: {e}")))?;
        ids.validate()?;

        Ok(Self { kind, ids, payload })
    }

    /// Parse from a variable lookup, typically the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ModelError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = lookup(ENV_TASK_TYPE)
            .ok_or_else(|| ModelError::parse(format!("{ENV_TASK_TYPE} is not set")))?;
        let payload = lookup(ENV_TASK_PAYLOAD)
            .ok_or_else(|| ModelError::parse(format!("{ENV_TASK_PAYLOAD} is not set")))?;
        Self::parse(&kind, &payload)
    }

    pub fn from_env() -> Result<Self, ModelError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}
