//! SMTP configuration.

use serde::{Deserialize, Serialize};

/// Outgoing mail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// When false, email sends are logged and reported as successful.
    #[serde(default)]
    pub enabled: bool,
    /// SMTP relay host.
    #[serde(default = "default_host")]
    pub smtp_host: String,
    /// SMTP relay port.
    #[serde(default = "default_port")]
    pub smtp_port: u16,
    /// Connect with TLS immediately instead of STARTTLS.
    #[serde(default)]
    pub implicit_tls: bool,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address.
    #[serde(default = "default_from_email")]
    pub from_email: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_host(),
            smtp_port: default_port(),
            implicit_tls: false,
            username: None,
            password: None,
            from_email: default_from_email(),
            from_name: default_from_name(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    587
}

fn default_from_email() -> String {
    "noreply@medinsight.local".to_string()
}

fn default_from_name() -> String {
    "MedInsight+".to_string()
}
