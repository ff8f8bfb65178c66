use serde::Serialize;

use crate::error::OlsError;

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, OlsError> {
    Ok(serde_json::to_string_pretty(value)?)
}
