use std::fmt;

/// Configuration or credential problem. The CLI maps this to exit code 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Non-success HTTP response from one of the external services.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub service: &'static str,
    pub status: u16,
    pub body: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} API returned HTTP {} ({})",
            self.service, self.status, self.body
        )
    }
}

impl std::error::Error for ApiError {}

/// Finds a `ConfigError` anywhere in an anyhow chain.
pub fn find_config_error(err: &anyhow::Error) -> Option<&ConfigError> {
    err.chain().find_map(|e| e.downcast_ref::<ConfigError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_api_error_message_carries_status_and_body() {
        let err = ApiError {
            service: "Jira",
            status: 401,
            body: "Unauthorized".into(),
        };
        assert_eq!(err.to_string(), "Jira API returned HTTP 401 (Unauthorized)");
    }

    #[test]
    fn test_config_error_found_through_context() {
        let err: anyhow::Result<()> = Err(ConfigError("no jenkins section".into()).into());
        let err = err.context("loading credentials").unwrap_err();
        let found = find_config_error(&err).expect("config error in chain");
        assert_eq!(found.0, "no jenkins section");
    }
}
