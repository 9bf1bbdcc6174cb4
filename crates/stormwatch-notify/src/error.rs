/// Errors raised by notification channels.
///
/// # Examples
///
/// ```rust
/// use stormwatch_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing smtp_host".to_string());
/// assert!(err.to_string().contains("smtp_host"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or holds an
    /// invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// The recipient string cannot be used by this channel (e.g. a
    /// malformed email address).
    #[error("Notify: invalid recipient '{recipient}': {reason}")]
    InvalidRecipient { recipient: String, reason: String },

    /// SMTP transport failure when sending email.
    #[error("Notify: SMTP error: {0}")]
    Smtp(String),

    /// An HTTP request to the SMS gateway or a webhook endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote endpoint answered with a non-success status.
    #[error("Notify: {service} returned status {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },
}

/// Convenience `Result` alias for channel operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
