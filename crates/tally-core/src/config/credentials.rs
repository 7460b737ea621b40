use crate::errors::ConfigError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// Per-user credential file, e.g. `~/.tally/credentials.yaml`:
///
/// ```yaml
/// jira:
///   url: https://jira.example.com
///   agile_url: https://jira-ci.example.com   # optional
///   user_name: "111111"
///   user_key: c2VjcmV0                        # base64
/// testrail:
///   url: https://testrail.example.com
///   user_name: qa-bot
///   user_key: c2VjcmV0
/// jenkins:
///   url: https://jenkins.example.com
///   user_name: qa-bot
///   user_key: c2VjcmV0
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub jira: ServiceCredentials,
    #[serde(default)]
    pub testrail: Option<ServiceCredentials>,
    #[serde(default)]
    pub jenkins: Option<ServiceCredentials>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceCredentials {
    pub url: String,
    #[serde(default)]
    pub agile_url: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub user_name: String,
    pub user_key: String,
}

impl ServiceCredentials {
    /// Decodes the base64 `user_key`.
    pub fn secret(&self) -> Result<String, ConfigError> {
        let bytes = STANDARD
            .decode(self.user_key.trim())
            .map_err(|e| ConfigError(format!("user_key for {} is not base64: {}", self.url, e)))?;
        String::from_utf8(bytes)
            .map_err(|_| ConfigError(format!("user_key for {} is not UTF-8", self.url)))
    }
}

impl Credentials {
    pub fn testrail(&self) -> Result<&ServiceCredentials, ConfigError> {
        self.testrail
            .as_ref()
            .ok_or_else(|| ConfigError("credential file has no 'testrail' section".into()))
    }

    pub fn jenkins(&self) -> Result<&ServiceCredentials, ConfigError> {
        self.jenkins
            .as_ref()
            .ok_or_else(|| ConfigError("credential file has no 'jenkins' section".into()))
    }
}

pub fn default_credentials_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".tally").join("credentials.yaml"))
}

pub fn load_credentials(path: &Path) -> Result<Credentials, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError(format!(
            "credential file not found: {}",
            path.display()
        )));
    }
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ConfigError(format!(
            "failed to read credential file {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_yaml::from_str(&raw).map_err(|e| {
        ConfigError(format!(
            "failed to parse credential file {}: {}",
            path.display(),
            e
        ))
    })
}

// user names are often numeric employee ids
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar, found {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
jira:
  url: https://jira.example.com
  user_name: 111111
  user_key: aHVudGVyMg==
jenkins:
  url: https://jenkins.example.com
  user_name: ci
  user_key: Y2ktc2VjcmV0
"#;

    #[test]
    fn test_decodes_secret_and_numeric_user() {
        let creds: Credentials = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(creds.jira.user_name, "111111");
        assert_eq!(creds.jira.secret().unwrap(), "hunter2");
        assert_eq!(creds.jenkins().unwrap().secret().unwrap(), "ci-secret");
    }

    #[test]
    fn test_missing_section_is_config_error() {
        let creds: Credentials = serde_yaml::from_str(SAMPLE).unwrap();
        let err = creds.testrail().unwrap_err();
        assert!(err.0.contains("'testrail'"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_credentials(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(err.0.starts_with("credential file not found"));
    }

    #[test]
    fn test_bad_base64_is_reported() {
        let creds = ServiceCredentials {
            url: "https://x".into(),
            agile_url: None,
            user_name: "u".into(),
            user_key: "%%%".into(),
        };
        assert!(creds.secret().unwrap_err().0.contains("not base64"));
    }

    #[test]
    fn test_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let creds = load_credentials(&path).unwrap();
        assert_eq!(creds.jira.url, "https://jira.example.com");
        assert!(creds.testrail.is_none());
    }
}
