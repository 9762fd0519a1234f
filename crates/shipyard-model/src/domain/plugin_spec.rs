use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Plugin-specific option bag.
///
/// Stored as a JSON object and decoded by each plugin into its own typed options struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginOptions(pub Map<String, Value>);

impl PluginOptions {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Builder-style insert, mostly for wiring options in code and tests.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Decode into a plugin's typed option set.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }
}

/// Selects a plugin by name together with its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "PluginOptions::is_empty")]
    pub options: PluginOptions,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: PluginOptions::new(),
        }
    }

    pub fn with_options(mut self, options: PluginOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Opts {
        destination: String,
        #[serde(default)]
        draft: bool,
    }

    #[test]
    fn decode_typed_options() {
        let opts = PluginOptions::new()
            .with("destination", "/srv/out")
            .with("draft", true);
        let decoded: Opts = opts.decode().unwrap();
        assert_eq!(decoded.destination, "/srv/out");
        assert!(decoded.draft);
    }

    #[test]
    fn decode_rejects_unknown_keys() {
        let opts = PluginOptions::new()
            .with("destination", "/srv/out")
            .with("bogus", 1);
        assert!(opts.decode::<Opts>().is_err());
    }

    #[test]
    fn spec_without_options_deserializes() {
        let spec: PluginSpec = serde_json::from_str(r#"{"name":"local"}"#).unwrap();
        assert_eq!(spec.name, "local");
        assert!(spec.options.is_empty());
    }
}
