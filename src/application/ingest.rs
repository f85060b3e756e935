//! Parser collaborator interface for trusted match uploads.

use thiserror::Error;

use crate::domain::matches::MatchRecord;

/// Malformed upload; the message is shown to the uploading client.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ParseInputError {
    pub message: String,
}

impl ParseInputError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Turns raw uploaded markup into match records. Implementations must be pure.
pub trait MatchParser: Send + Sync {
    fn parse(&self, raw: &[u8]) -> Result<Vec<MatchRecord>, ParseInputError>;
}

/// Accepts a JSON array of match records.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMatchParser;

impl MatchParser for JsonMatchParser {
    fn parse(&self, raw: &[u8]) -> Result<Vec<MatchRecord>, ParseInputError> {
        let matches: Vec<MatchRecord> = serde_json::from_slice(raw)
            .map_err(|err| ParseInputError::new(format!("Invalid match JSON: {err}")))?;

        for record in &matches {
            if record.match_number == 0 {
                return Err(ParseInputError::new("match_number must be positive"));
            }
            if record.comp_level.is_elimination() && record.set_number == 0 {
                return Err(ParseInputError::new(
                    "set_number must be positive for elimination matches",
                ));
            }
        }

        Ok(matches)
    }
}
