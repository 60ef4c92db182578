use serde_json::Value;

use crate::error::ParseError;

// Walk `keys` through nested objects and return the string at the end.
// `provider` only goes into error messages.
pub fn extract_country(doc: &Value, keys: &[String], provider: &str) -> Result<String, ParseError> {
    let mut current = doc;

    for key in keys {
        current = current
            .as_object()
            .and_then(|object| object.get(key))
            .ok_or_else(|| ParseError::MissingKey {
                key: key.clone(),
                provider: provider.to_string(),
            })?;
    }

    current
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ParseError::NotAString {
            provider: provider.to_string(),
        })
}
