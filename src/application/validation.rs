//! Request validation that collects every problem instead of stopping at the
//! first one.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static TEAM_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^frc\d{1,5}$").expect("team key regex"));
static EVENT_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}[a-z0-9]{1,16}$").expect("event key regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Ordered validation failures; empty means the request is well-formed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<FieldError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    /// Human-readable summary joining every message in order.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Named request parameters a validator can inspect.
pub trait ParamSource {
    fn param(&self, name: &str) -> Option<&str>;
}

pub trait Validator<R: ?Sized>: Send + Sync {
    fn check(&self, request: &R) -> Option<FieldError>;
}

impl<R, F> Validator<R> for F
where
    R: ?Sized,
    F: Fn(&R) -> Option<FieldError> + Send + Sync,
{
    fn check(&self, request: &R) -> Option<FieldError> {
        self(request)
    }
}

/// Runs every validator against `request`, in order, without short-circuiting.
pub fn validate<R: ?Sized>(request: &R, validators: &[Box<dyn Validator<R>>]) -> ValidationResult {
    let errors = validators
        .iter()
        .filter_map(|validator| validator.check(request))
        .collect();
    ValidationResult { errors }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    Team,
    Event,
}

impl KeyFormat {
    fn matches(self, value: &str) -> bool {
        match self {
            Self::Team => TEAM_KEY.is_match(value),
            Self::Event => EVENT_KEY.is_match(value),
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Self::Team => "team key",
            Self::Event => "event key",
        }
    }
}

/// Checks that the named parameter is present and shaped like a key.
#[derive(Debug, Clone, Copy)]
pub struct KeyParam {
    field: &'static str,
    format: KeyFormat,
}

impl KeyParam {
    pub fn new(field: &'static str, format: KeyFormat) -> Self {
        Self { field, format }
    }

    pub fn boxed<R: ParamSource + ?Sized>(field: &'static str, format: KeyFormat) -> Box<dyn Validator<R>> {
        Box::new(Self::new(field, format))
    }
}

impl<R: ParamSource + ?Sized> Validator<R> for KeyParam {
    fn check(&self, request: &R) -> Option<FieldError> {
        match request.param(self.field) {
            None => Some(FieldError::new(
                self.field,
                format!("{} is required", self.field),
            )),
            Some(value) if self.format.matches(value) => None,
            Some(value) => Some(FieldError::new(
                self.field,
                format!("{value} is not a valid {}", self.format.noun()),
            )),
        }
    }
}
