use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalyticsErrorCode {
    InvalidHit,
    UnregisteredKey,
    MissingRegistry,
    InvalidArgument,
    Internal,
    Network,
    Multiple,
}

impl AnalyticsErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsErrorCode::InvalidHit => "analytics/invalid-hit",
            AnalyticsErrorCode::UnregisteredKey => "analytics/unregistered-key",
            AnalyticsErrorCode::MissingRegistry => "analytics/missing-registry",
            AnalyticsErrorCode::InvalidArgument => "analytics/invalid-argument",
            AnalyticsErrorCode::Internal => "analytics/internal",
            AnalyticsErrorCode::Network => "analytics/network",
            AnalyticsErrorCode::Multiple => "analytics/multiple",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AnalyticsError {
    pub code: AnalyticsErrorCode,
    message: String,
    causes: Vec<AnalyticsError>,
}

impl AnalyticsError {
    pub fn new(code: AnalyticsErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Individual failures folded into a [`AnalyticsErrorCode::Multiple`] error. Empty for every
    /// other code.
    pub fn causes(&self) -> &[AnalyticsError] {
        &self.causes
    }
}

impl Display for AnalyticsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for AnalyticsError {}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

pub fn invalid_hit(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::InvalidHit, message)
}

pub fn unregistered_key(family: &str, key: impl Display) -> AnalyticsError {
    AnalyticsError::new(
        AnalyticsErrorCode::UnregisteredKey,
        format!("{family} key `{key}` is not registered"),
    )
}

pub fn missing_registry(family: &str) -> AnalyticsError {
    AnalyticsError::new(
        AnalyticsErrorCode::MissingRegistry,
        format!("hit carries custom {family} values but no {family} registry is configured"),
    )
}

pub fn invalid_argument(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Internal, message)
}

pub fn network_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Network, message)
}

/// Folds the failures collected during a fan-out into one error.
///
/// A single failure is returned as-is so decorator chains keep the original code.
pub fn multiple(mut errors: Vec<AnalyticsError>) -> AnalyticsError {
    if errors.len() == 1 {
        if let Some(error) = errors.pop() {
            return error;
        }
    }
    let message = format!(
        "{} clients failed: {}",
        errors.len(),
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    );
    AnalyticsError {
        code: AnalyticsErrorCode::Multiple,
        message,
        causes: errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let err = invalid_hit("event needs at least one field");
        assert_eq!(
            err.to_string(),
            "event needs at least one field (analytics/invalid-hit)"
        );
    }

    #[test]
    fn single_failure_is_not_wrapped() {
        let err = multiple(vec![missing_registry("metric")]);
        assert_eq!(err.code, AnalyticsErrorCode::MissingRegistry);
        assert!(err.causes().is_empty());
    }

    #[test]
    fn several_failures_keep_every_cause() {
        let err = multiple(vec![
            unregistered_key("metric", "score"),
            invalid_hit("item name must not be empty"),
        ]);
        assert_eq!(err.code_str(), "analytics/multiple");
        assert_eq!(err.causes().len(), 2);
        assert_eq!(err.causes()[0].code, AnalyticsErrorCode::UnregisteredKey);
        assert!(err.message().starts_with("2 clients failed"));
    }
}
