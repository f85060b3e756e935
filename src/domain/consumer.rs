//! API consumer identifiers (`ident:version:platform`).

use std::fmt::{Display, Formatter};

use serde::Serialize;

use super::error::DomainError;

const FIELD: &str = "X-TBA-App-Id";
const PART_COUNT: usize = 3;

/// Caller-supplied identifier used as a tracking dimension only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ApiConsumerId(String);

impl ApiConsumerId {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        if raw.is_empty() {
            return Err(DomainError::validation(FIELD, "value is empty"));
        }

        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() != PART_COUNT || parts.iter().any(|part| part.is_empty()) {
            return Err(DomainError::validation(
                FIELD,
                "expected three non-empty parts separated by `:`",
            ));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ApiConsumerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_three_non_empty_parts() {
        let id = ApiConsumerId::parse("myapp:1:ios").expect("valid id");
        assert_eq!(id.as_str(), "myapp:1:ios");
    }

    #[test]
    fn rejects_wrong_shapes() {
        for raw in [
            "",
            "myapp",
            "myapp:1",
            "myapp:1:ios:extra",
            ":1:ios",
            "myapp::ios",
            "myapp:1:",
            "::",
        ] {
            assert!(ApiConsumerId::parse(raw).is_err(), "accepted `{raw}`");
        }
    }
}
