use std::fmt;
use uuid::Uuid;

/// Per-request context threaded explicitly through the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub correlation_id: String,
}

impl RequestContext {
    /// Creates a context with a freshly generated correlation id.
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Uses an incoming `X-Correlation-Id` value, generating one when it is
    /// absent or blank.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(id) if !id.is_empty() => Self {
                correlation_id: id.to_string(),
            },
            _ => Self::new(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header_keeps_provided_id() {
        let ctx = RequestContext::from_header(Some("abc-123"));
        assert_eq!(ctx.correlation_id, "abc-123");
    }

    #[test]
    fn test_from_header_generates_when_missing_or_blank() {
        for value in [None, Some(""), Some("   ")] {
            let ctx = RequestContext::from_header(value);
            assert!(Uuid::parse_str(&ctx.correlation_id).is_ok());
        }
    }
}
