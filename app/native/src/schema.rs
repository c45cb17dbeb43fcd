//! JSON Schema for the SpeedChat configuration file.

use crate::config::SpeedchatConfig;

/// Generates a JSON Schema for the SpeedChat configuration.
///
/// The schema includes all configuration options with their types,
/// descriptions, and default values.
#[must_use]
pub fn generate_schema() -> schemars::Schema { schemars::schema_for!(SpeedchatConfig) }

/// Generates a pretty-printed JSON Schema string for the configuration.
#[must_use]
pub fn print_schema() -> String {
    let schema = generate_schema();
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_schema_produces_valid_json() {
        let schema_json = print_schema();
        let parsed: serde_json::Value = serde_json::from_str(&schema_json).unwrap();

        assert_eq!(parsed["$schema"], "https://json-schema.org/draft/2020-12/schema");
        assert_eq!(parsed["title"], "SpeedchatConfig");
        for key in ["debounceMs", "frameIntervalMs", "streamingThrottleMs", "trialDays", "logLevel", "statePath"] {
            assert!(parsed["properties"][key].is_object(), "missing property {key}");
        }
    }

    #[test]
    fn test_schema_records_defaults() {
        let parsed: serde_json::Value = serde_json::from_str(&print_schema()).unwrap();
        assert_eq!(parsed["properties"]["debounceMs"]["default"], 100);
    }

    #[test]
    fn test_schema_json_is_pretty_printed() {
        assert!(print_schema().contains('\n'));
    }
}
