//! ODBC connection-string construction.
//!
//! # Security
//! - The full string (with `PWD`) only exists inside a `Zeroizing` buffer
//! - [`ConnectionDescriptor::to_safe_string`] is the only form that is logged

use zeroize::Zeroizing;

use super::credentials::Credentials;

/// What to connect to: a data source name plus optional credentials.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    pub dsn: String,
    pub credentials: Option<Credentials>,
}

impl ConnectionDescriptor {
    /// Descriptor relying on whatever the DSN file stores.
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            credentials: None,
        }
    }

    /// Builder method to attach credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// `DSN=..;UID=..;PWD=..` for the driver manager.
    ///
    /// An empty user name means "use the stored one" and adds nothing.
    pub fn to_connection_string(&self) -> Zeroizing<String> {
        let mut out = Zeroizing::new(format!("DSN={}", quote_value(&self.dsn)));
        if let Some(creds) = &self.credentials
            && !creds.username().is_empty()
        {
            out.push_str(";UID=");
            out.push_str(&quote_value(creds.username()));
            if let Some(password) = creds.password() {
                out.push_str(";PWD=");
                out.push_str(&quote_value(password));
            }
        }
        out
    }

    /// Connection string with the password masked, safe to log or display.
    ///
    /// # Example
    /// ```rust
    /// use odbcadmin_core::security::{ConnectionDescriptor, Credentials};
    ///
    /// let descriptor = ConnectionDescriptor::new("Prod")
    ///     .with_credentials(Credentials::new("dba".into(), Some("secret".into())));
    /// assert_eq!(descriptor.to_safe_string(), "DSN=Prod;UID=dba;PWD=****");
    /// ```
    pub fn to_safe_string(&self) -> String {
        crate::error::redact_connection_string(&self.to_connection_string())
    }
}

/// Brace-quotes a value when it contains characters with meaning in a
/// connection string; a literal `}` is doubled inside the braces.
pub fn quote_value(value: &str) -> String {
    let needs_quoting = value.contains([';', '{', '}'])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if needs_quoting {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}
