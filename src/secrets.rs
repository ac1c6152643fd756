//! Secret providers and output redaction

use crate::core::SecretError;
use std::collections::HashMap;
use std::fmt;

/// Placeholder written wherever a secret value would appear
pub const REDACTED: &str = "***";

/// An opaque credential value. `Debug` and `Display` never show it.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The actual value, only for handing to a command's environment
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue({})", REDACTED)
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Read-only source of credentials, shared by every job of a run
pub trait SecretProvider: Send + Sync {
    fn get(&self, name: &str) -> Result<SecretValue, SecretError>;
}

/// Secrets read from the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    prefix: String,
}

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `NAME` as `<prefix>NAME`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Process variable holding the secret `name`
    pub fn variable_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl SecretProvider for EnvSecretProvider {
    fn get(&self, name: &str) -> Result<SecretValue, SecretError> {
        std::env::var(self.variable_name(name))
            .map(SecretValue::new)
            .map_err(|_| SecretError::NotFound(name.to_string()))
    }
}

/// In-memory secrets
#[derive(Debug, Clone, Default)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, SecretValue>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), SecretValue::new(value));
        self
    }
}

impl SecretProvider for StaticSecretProvider {
    fn get(&self, name: &str) -> Result<SecretValue, SecretError> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}

/// Masks known secret values in captured text
#[derive(Debug, Default)]
pub struct Redactor {
    values: Vec<SecretValue>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: &SecretValue) {
        if !value.expose().is_empty() && !self.values.contains(value) {
            self.values.push(value.clone());
            // Longest first so a secret containing another is fully masked
            self.values
                .sort_by(|a, b| b.expose().len().cmp(&a.expose().len()));
        }
    }

    pub fn redact(&self, text: &str) -> String {
        self.values
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.expose(), REDACTED))
    }
}
