//! Mailbox configuration from environment variables.

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::message::is_valid_address;

/// IMAP/SMTP mailbox configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Mailbox address; doubles as the login user name.
    pub address: String,
    pub password: SecretString,
    /// Mailbox folder to poll.
    pub folder: String,
    pub poll_secs: u64,
}

impl EmailConfig {
    /// Build config from `MAIL_AGENT_*` environment variables.
    /// Returns `None` if `MAIL_AGENT_IMAP_HOST` is not set (transport disabled).
    pub fn from_env() -> Option<Self> {
        let imap_host = std::env::var("MAIL_AGENT_IMAP_HOST").ok()?;

        let imap_port: u16 = std::env::var("MAIL_AGENT_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let smtp_host = std::env::var("MAIL_AGENT_SMTP_HOST")
            .unwrap_or_else(|_| imap_host.replace("imap", "smtp"));

        let smtp_port: u16 = std::env::var("MAIL_AGENT_SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let address = std::env::var("MAIL_AGENT_ADDRESS").unwrap_or_default();
        let password = SecretString::from(std::env::var("MAIL_AGENT_PASSWORD").unwrap_or_default());

        let folder = std::env::var("MAIL_AGENT_FOLDER").unwrap_or_else(|_| "INBOX".to_string());

        let poll_secs: u64 = std::env::var("MAIL_AGENT_POLL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        Some(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            address,
            password,
            folder,
            poll_secs,
        })
    }

    /// Check the fields `from_env` accepts leniently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.imap_host.is_empty() {
            return Err(ConfigError::MissingEnvVar("MAIL_AGENT_IMAP_HOST".to_string()));
        }
        if self.smtp_host.is_empty() {
            return Err(ConfigError::MissingEnvVar("MAIL_AGENT_SMTP_HOST".to_string()));
        }
        if self.address.is_empty() {
            return Err(ConfigError::MissingEnvVar("MAIL_AGENT_ADDRESS".to_string()));
        }
        if !is_valid_address(&self.address) {
            return Err(ConfigError::InvalidValue {
                key: "MAIL_AGENT_ADDRESS".to_string(),
                message: format!("{:?} is not an email address", self.address),
            });
        }
        if self.poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAIL_AGENT_POLL_SECS".to_string(),
                message: "poll interval must be at least one second".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> EmailConfig {
        EmailConfig {
            imap_host: "imap.example.com".into(),
            imap_port: 993,
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            address: "agent@example.com".into(),
            password: SecretString::from("hunter2".to_string()),
            folder: "INBOX".into(),
            poll_secs: 60,
        }
    }

    #[test]
    fn from_env_returns_none_when_no_host() {
        // SAFETY: This test runs in isolation; no other thread reads
        // MAIL_AGENT_IMAP_HOST concurrently.
        unsafe { std::env::remove_var("MAIL_AGENT_IMAP_HOST") };
        assert!(EmailConfig::from_env().is_none());
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn empty_address_is_missing_var() {
        let mut config = base_config();
        config.address = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingEnvVar(var)) if var == "MAIL_AGENT_ADDRESS"
        ));
    }

    #[test]
    fn malformed_address_is_invalid_value() {
        let mut config = base_config();
        config.address = "not-an-address".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "MAIL_AGENT_ADDRESS"
        ));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let mut config = base_config();
        config.poll_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", base_config());
        assert!(!rendered.contains("hunter2"));
    }
}
