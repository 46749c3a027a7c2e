#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Replica count as handed to a scale request: either a number already in hand or
/// raw text from an input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleInput {
    Number(i64),
    Text(String),
}

impl ScaleInput {
    /// Replica counts are int32 on the API server.
    pub const MAX: i64 = i32::MAX as i64;

    pub fn validate(&self) -> Result<u32, ValidationError> {
        let n = match self {
            ScaleInput::Number(n) => *n,
            ScaleInput::Text(s) => s.trim().parse::<i64>().map_err(|_| ValidationError::NotANumber(s.clone()))?,
        };
        if n < 0 {
            return Err(ValidationError::Negative(n));
        }
        if n > Self::MAX {
            return Err(ValidationError::OutOfRange(n));
        }
        Ok(n as u32)
    }
}

impl From<i64> for ScaleInput {
    fn from(n: i64) -> Self { ScaleInput::Number(n) }
}

impl From<i32> for ScaleInput {
    fn from(n: i32) -> Self { ScaleInput::Number(n as i64) }
}

impl From<u32> for ScaleInput {
    fn from(n: u32) -> Self { ScaleInput::Number(n as i64) }
}

impl From<&str> for ScaleInput {
    fn from(s: &str) -> Self { ScaleInput::Text(s.to_string()) }
}

impl From<String> for ScaleInput {
    fn from(s: String) -> Self { ScaleInput::Text(s) }
}

/// Input-time coercion for a replicas text field: anything that is not an integer
/// collapses to 0.
pub fn coerce_text(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(0)
}
