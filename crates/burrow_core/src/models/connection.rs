//! Connection profile models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default CockroachDB SQL port.
pub const DEFAULT_PORT: u16 = 26257;

/// Database every cluster ships with.
pub const DEFAULT_DATABASE: &str = "defaultdb";

/// SSL mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// No SSL (insecure local clusters)
    #[default]
    Disable,
    /// Use SSL if available
    Prefer,
    /// Require SSL, accept any certificate
    Require,
    /// Require SSL, verify CA
    VerifyCa,
    /// Require SSL, verify CA and hostname
    VerifyFull,
}

impl SslMode {
    /// Convert to string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }

    /// Parse from string representation. Unknown values fall back to `disable`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prefer" => Self::Prefer,
            "require" => Self::Require,
            "verify-ca" | "verify_ca" => Self::VerifyCa,
            "verify-full" | "verify_full" => Self::VerifyFull,
            _ => Self::Disable,
        }
    }

    /// Whether a connection with this mode can be made without a TLS connector.
    pub fn allows_plaintext(&self) -> bool {
        matches!(self, Self::Disable | Self::Prefer)
    }
}

/// Additional connection options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Connection timeout in seconds
    pub connect_timeout_secs: u32,
    /// Statement timeout in seconds (None = server default)
    pub statement_timeout_secs: Option<u32>,
    /// Application name reported to the server
    pub application_name: String,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            statement_timeout_secs: None,
            application_name: "burrow".to_string(),
        }
    }
}

/// A saved connection target.
///
/// The password is only ever held in memory: it is skipped by serde and never
/// written to local storage or to logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Unique identifier
    pub id: Uuid,
    /// Display name (1-255 chars)
    pub name: String,
    /// Server hostname or IP
    pub host: String,
    /// Server port
    pub port: u16,
    /// Default database for the profile
    pub database: String,
    /// Login user
    pub user: String,
    /// Password for this process only
    #[serde(skip)]
    pub password: Option<String>,
    /// SSL configuration
    pub ssl_mode: SslMode,
    /// Additional options
    pub options: ConnectionOptions,
}

impl ConnectionProfile {
    /// Create a profile with CockroachDB defaults for the remaining fields.
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_string(),
            user: "root".to_string(),
            password: None,
            ssl_mode: SslMode::default(),
            options: ConnectionOptions::default(),
        }
    }

    /// Create a builder for complex configurations.
    pub fn builder() -> ConnectionProfileBuilder {
        ConnectionProfileBuilder::default()
    }

    /// Return a copy carrying the given password.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Validate the profile.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() || self.name.len() > 255 {
            return Err("Name must be 1-255 characters".to_string());
        }
        if self.host.is_empty() {
            return Err("Host is required".to_string());
        }
        if self.port == 0 {
            return Err("Port must be non-zero".to_string());
        }
        if self.database.is_empty() || self.database.len() > 63 {
            return Err("Database name must be 1-63 characters".to_string());
        }
        if self.user.is_empty() {
            return Err("User is required".to_string());
        }
        Ok(())
    }

    /// Get the display connection string (without password).
    pub fn display_url(&self) -> String {
        format!("postgresql://{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

impl std::fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssl_mode", &self.ssl_mode)
            .field("options", &self.options)
            .finish()
    }
}

/// Builder for ConnectionProfile.
#[derive(Debug, Default)]
pub struct ConnectionProfileBuilder {
    name: Option<String>,
    host: Option<String>,
    port: u16,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
    ssl_mode: SslMode,
    options: ConnectionOptions,
}

impl ConnectionProfileBuilder {
    /// Set the profile name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the default database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the user.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the password (kept in memory only).
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the SSL mode.
    pub fn ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout_secs(mut self, secs: u32) -> Self {
        self.options.connect_timeout_secs = secs;
        self
    }

    /// Set the statement timeout.
    pub fn statement_timeout_secs(mut self, secs: u32) -> Self {
        self.options.statement_timeout_secs = Some(secs);
        self
    }

    /// Build the profile.
    pub fn build(self) -> Result<ConnectionProfile, String> {
        let profile = ConnectionProfile {
            id: Uuid::new_v4(),
            name: self.name.ok_or("Name is required")?,
            host: self.host.unwrap_or_else(|| "localhost".to_string()),
            port: if self.port == 0 { DEFAULT_PORT } else { self.port },
            database: self.database.unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            user: self.user.unwrap_or_else(|| "root".to_string()),
            password: self.password,
            ssl_mode: self.ssl_mode,
            options: self.options,
        };
        profile.validate()?;
        Ok(profile)
    }
}
