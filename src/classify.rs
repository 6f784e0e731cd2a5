//! Coarse error categories for use as a metric dimension.
//!
//! Matching is a case-insensitive keyword search over the error message, so it
//! depends on the wording of the underlying error. It never drives control flow.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Unknown,
    Timeout,
    Connection,
    Authentication,
    Throttling,
    RateLimit,
    GenericError,
}
impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Timeout => "Timeout",
            Self::Connection => "Connection",
            Self::Authentication => "Authentication",
            Self::Throttling => "Throttling",
            Self::RateLimit => "RateLimit",
            Self::GenericError => "GenericError",
        }
    }
}
impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checked in order; the first keyword found wins.
const RULES: &[(&str, ErrorCategory)] = &[
    ("timeout", ErrorCategory::Timeout),
    ("connection", ErrorCategory::Connection),
    ("auth", ErrorCategory::Authentication),
    ("throttle", ErrorCategory::Throttling),
    ("rate", ErrorCategory::RateLimit),
];

/// Categorizes a failure of an instrumented operation. `None` is [`ErrorCategory::Unknown`].
pub fn error_category<E>(err: Option<&E>) -> ErrorCategory
where
    E: fmt::Display + ?Sized,
{
    let Some(err) = err else {
        return ErrorCategory::Unknown;
    };
    let message = err.to_string().to_lowercase();
    RULES
        .iter()
        .find(|(keyword, _)| message.contains(keyword))
        .map(|&(_, category)| category)
        .unwrap_or(ErrorCategory::GenericError)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(message: &str) -> ErrorCategory {
        error_category(Some(message))
    }

    #[test]
    fn keywords_map_to_categories() {
        assert_eq!(classify("connection refused"), ErrorCategory::Connection);
        assert_eq!(classify("auth failed"), ErrorCategory::Authentication);
        assert_eq!(classify("throttle limit exceeded"), ErrorCategory::Throttling);
        assert_eq!(classify("rate limit exceeded"), ErrorCategory::RateLimit);
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(classify("request TIMEOUT occurred"), ErrorCategory::Timeout);
        assert_eq!(classify("AuthorizationError"), ErrorCategory::Authentication);
    }

    #[test]
    fn first_rule_wins() {
        assert_eq!(classify("connection timeout occurred"), ErrorCategory::Timeout);
        assert_eq!(classify("auth rate exceeded"), ErrorCategory::Authentication);
    }

    #[test]
    fn fallbacks() {
        assert_eq!(error_category::<str>(None), ErrorCategory::Unknown);
        assert_eq!(classify("banana"), ErrorCategory::GenericError);
        assert_eq!(classify(""), ErrorCategory::GenericError);
    }

    #[test]
    fn works_with_error_types() {
        let err = anyhow::anyhow!("Connection reset by peer");
        assert_eq!(error_category(Some(&err)), ErrorCategory::Connection);
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "operation timeout");
        assert_eq!(error_category(Some(&io)), ErrorCategory::Timeout);
        assert_eq!(ErrorCategory::RateLimit.to_string(), "RateLimit");
    }
}
