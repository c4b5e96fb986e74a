//! JSON decoding helpers

use serde::{Deserialize, Deserializer};

/// Decode an explicit `null` the same way as a missing field
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Sample {
        #[serde(deserialize_with = "null_as_default")]
        name: String,
        #[serde(deserialize_with = "null_as_default")]
        tags: Vec<String>,
    }

    #[test]
    fn test_null_decodes_as_default() {
        let sample: Sample = serde_json::from_str(r#"{"name":null,"tags":null}"#).unwrap();
        assert_eq!(sample.name, "");
        assert!(sample.tags.is_empty());

        let sample: Sample = serde_json::from_str(r#"{"name":"a","tags":["x"]}"#).unwrap();
        assert_eq!(sample.name, "a");
        assert_eq!(sample.tags, vec!["x".to_string()]);

        let sample: Sample = serde_json::from_str("{}").unwrap();
        assert_eq!(sample.name, "");
    }
}
