//! Error types for burrow.
//!
//! Every failure in the core maps onto one taxonomy label (see [`BurrowError::label`]):
//! connectivity, catalog query, DDL unavailable, execution. Degraded DDL text embeds
//! that label so callers can tell failure categories apart without an exception.

use thiserror::Error;

/// Main error type for burrow.
#[derive(Debug, Error)]
pub enum BurrowError {
    /// Connection open failed or the connection was lost.
    #[error("Connection error: {message}")]
    Connection {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authentication failed.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
    },

    /// Statement error reported by the server, before a boundary re-tags it.
    #[error("{message}")]
    Query {
        /// Server error message.
        message: String,
        /// Additional detail from the server.
        detail: Option<String>,
        /// Server hint.
        hint: Option<String>,
        /// Position in the statement (1-indexed).
        position: Option<usize>,
        /// SQLSTATE code (e.g., "42P01").
        code: Option<String>,
    },

    /// A catalog listing or metadata query failed.
    #[error("Catalog query failed: {message}")]
    Catalog {
        /// Server or decoding error message.
        message: String,
        /// Server hint.
        hint: Option<String>,
        /// SQLSTATE code, when the server reported one.
        code: Option<String>,
    },

    /// The server cannot produce a definition for this object kind.
    #[error("DDL unavailable: {message}")]
    DdlUnavailable {
        /// Human-readable error message.
        message: String,
    },

    /// A write statement failed and was rolled back.
    #[error("Execution failed: {message}")]
    Execution {
        /// Server error message.
        message: String,
        /// Additional detail from the server.
        detail: Option<String>,
        /// Server hint.
        hint: Option<String>,
        /// Position in the statement (1-indexed).
        position: Option<usize>,
        /// SQLSTATE code.
        code: Option<String>,
    },

    /// An identifier failed the allow-list check and cannot be interpolated.
    #[error("Invalid identifier: {identifier:?}")]
    InvalidIdentifier {
        /// The rejected identifier.
        identifier: String,
    },

    /// Caller-supplied input is unusable (e.g. a view body that is not a SELECT).
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Human-readable error message.
        message: String,
    },

    /// Local SQLite storage error.
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// Unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl BurrowError {
    // ========== Constructors ==========

    /// Create a new connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Create a new connection error with source.
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            hint: Some("Check username and password".to_string()),
        }
    }

    /// Create a statement error with full server details.
    pub fn query(
        message: impl Into<String>,
        detail: Option<String>,
        hint: Option<String>,
        position: Option<usize>,
        code: Option<String>,
    ) -> Self {
        Self::Query { message: message.into(), detail, hint, position, code }
    }

    /// Create a catalog error that did not come from the server (e.g. a row shape mismatch).
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog { message: message.into(), hint: None, code: None }
    }

    /// Create a DDL-unavailable error.
    pub fn ddl_unavailable(message: impl Into<String>) -> Self {
        Self::DdlUnavailable { message: message.into() }
    }

    /// Create an invalid identifier error.
    pub fn invalid_identifier(identifier: impl Into<String>) -> Self {
        Self::InvalidIdentifier { identifier: identifier.into() }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into() }
    }

    /// Create a new storage error.
    pub fn storage(message: impl Into<String>, hint: Option<&str>) -> Self {
        Self::Storage { message: message.into(), hint: hint.map(String::from), source: None }
    }

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    // ========== Boundary re-tagging ==========

    /// Re-tag a statement error raised by a catalog query.
    ///
    /// Connectivity errors pass through untouched.
    pub fn into_catalog(self) -> Self {
        match self {
            Self::Query { message, hint, code, .. } => Self::Catalog { message, hint, code },
            other => other,
        }
    }

    /// Re-tag a statement error raised by a dispatched write.
    pub fn into_execution(self) -> Self {
        match self {
            Self::Query { message, detail, hint, position, code } => {
                Self::Execution { message, detail, hint, position, code }
            }
            other => other,
        }
    }

    // ========== Methods ==========

    /// Check if this error means the connection itself is unusable.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Authentication { .. })
    }

    /// Taxonomy label, used as the prefix of degraded DDL text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connection { .. } | Self::Authentication { .. } => "ConnectivityError",
            Self::Query { .. } => "QueryError",
            Self::Catalog { .. } => "CatalogQueryError",
            Self::DdlUnavailable { .. } => "DDLUnavailable",
            Self::Execution { .. } => "ExecutionError",
            Self::InvalidIdentifier { .. } | Self::InvalidInput { .. } => "InvalidInput",
            Self::Storage { .. } => "StorageError",
            Self::Config { .. } => "ConfigError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Get actionable hint for the user.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Connection { .. } => Some("Check that the database server is running"),
            Self::Authentication { hint, .. } => hint.as_deref(),
            Self::Query { hint, .. } => hint.as_deref(),
            Self::Catalog { hint, .. } => hint.as_deref(),
            Self::DdlUnavailable { .. } => None,
            Self::Execution { hint, .. } => hint.as_deref(),
            Self::InvalidIdentifier { .. } => {
                Some("Use letters, digits and underscores, not starting with a digit")
            }
            Self::InvalidInput { .. } => None,
            Self::Storage { hint, .. } => hint.as_deref(),
            Self::Config { .. } => None,
            Self::Internal { .. } => Some("Please report this issue"),
        }
    }

    /// Get the SQLSTATE code (if applicable).
    pub fn pg_code(&self) -> Option<&str> {
        match self {
            Self::Query { code, .. } | Self::Catalog { code, .. } | Self::Execution { code, .. } => {
                code.as_deref()
            }
            _ => None,
        }
    }

    /// Render as a single-line SQL comment carrying the taxonomy label.
    pub fn to_comment(&self) -> String {
        let text = self.to_string().replace('\n', " ");
        format!("-- [{}] {}", self.label(), text)
    }

    /// Convert to user-displayable error info.
    pub fn to_error_info(&self) -> ErrorInfo {
        let message = self.to_string();
        let hint = self.hint().map(String::from);

        let technical_detail = match self {
            Self::Query { detail, code, position, .. }
            | Self::Execution { detail, code, position, .. } => {
                let mut parts = Vec::new();
                if let Some(code) = code {
                    parts.push(format!("Code: {code}"));
                }
                if let Some(pos) = position {
                    parts.push(format!("Position: {pos}"));
                }
                if let Some(detail) = detail {
                    parts.push(format!("Detail: {detail}"));
                }
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
            Self::Catalog { code: Some(code), .. } => Some(format!("Code: {code}")),
            _ => None,
        };

        ErrorInfo { error_type: self.label().to_string(), message, hint, technical_detail }
    }
}

/// User-displayable error information.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Taxonomy label (e.g., "CatalogQueryError").
    pub error_type: String,
    /// User-friendly message.
    pub message: String,
    /// Actionable suggestion.
    pub hint: Option<String>,
    /// Technical detail for "Show Details" expansion.
    pub technical_detail: Option<String>,
}

// ========== Error Conversions ==========

/// Convert from tokio_postgres::Error to BurrowError.
impl From<tokio_postgres::Error> for BurrowError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let message = db_err.message().to_string();
            let detail = db_err.detail().map(String::from);
            let hint = db_err.hint().map(String::from);
            let position = db_err.position().and_then(|p| match p {
                tokio_postgres::error::ErrorPosition::Original(pos) => Some(*pos as usize),
                tokio_postgres::error::ErrorPosition::Internal { .. } => None,
            });
            let code_str = db_err.code().code();
            let code = Some(code_str.to_string());

            match code_str {
                "28P01" => {
                    return BurrowError::Authentication {
                        message,
                        hint: Some("Invalid password - check your credentials".to_string()),
                    }
                }
                "28000" => {
                    return BurrowError::Authentication {
                        message,
                        hint: Some(
                            "Authentication failed - check username and permissions".to_string(),
                        ),
                    }
                }
                _ if code_str.starts_with("08") => {
                    return BurrowError::Connection { message, source: Some(Box::new(err)) }
                }
                _ => return BurrowError::Query { message, detail, hint, position, code },
            }
        }

        if err.is_closed() {
            return BurrowError::Connection {
                message: "Connection closed".to_string(),
                source: Some(Box::new(err)),
            };
        }

        BurrowError::Connection { message: err.to_string(), source: Some(Box::new(err)) }
    }
}

/// Convert from rusqlite::Error to BurrowError.
impl From<rusqlite::Error> for BurrowError {
    fn from(err: rusqlite::Error) -> Self {
        BurrowError::Storage {
            message: err.to_string(),
            hint: Some("The local database may be corrupted".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Convert from std::io::Error to BurrowError.
impl From<std::io::Error> for BurrowError {
    fn from(err: std::io::Error) -> Self {
        BurrowError::Storage {
            message: err.to_string(),
            hint: Some("Check file permissions and disk space".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Convert from serde_json::Error to BurrowError.
impl From<serde_json::Error> for BurrowError {
    fn from(err: serde_json::Error) -> Self {
        BurrowError::Storage {
            message: format!("JSON error: {err}"),
            hint: Some("Data may be corrupted".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn undefined_table() -> BurrowError {
        BurrowError::query(
            "relation \"nope\" does not exist",
            None,
            Some("check the schema".to_string()),
            Some(15),
            Some("42P01".to_string()),
        )
    }

    #[test]
    fn test_into_catalog_keeps_message_and_code() {
        let err = undefined_table().into_catalog();
        assert!(matches!(err, BurrowError::Catalog { .. }));
        assert_eq!(err.pg_code(), Some("42P01"));
        assert_eq!(err.label(), "CatalogQueryError");
        assert_eq!(err.to_string(), "Catalog query failed: relation \"nope\" does not exist");
    }

    #[test]
    fn test_into_execution_keeps_position() {
        let err = undefined_table().into_execution();
        assert_eq!(err.label(), "ExecutionError");
        let info = err.to_error_info();
        let detail = info.technical_detail.unwrap();
        assert!(detail.contains("Code: 42P01"));
        assert!(detail.contains("Position: 15"));
    }

    #[test]
    fn test_retagging_leaves_connectivity_errors_alone() {
        let err = BurrowError::connection("refused").into_catalog();
        assert!(err.is_connectivity());
        assert_eq!(err.label(), "ConnectivityError");
    }

    #[test]
    fn test_to_comment_is_single_line() {
        let err = BurrowError::ddl_unavailable("no SHOW CREATE FUNCTION\nin this version");
        let comment = err.to_comment();
        assert!(comment.starts_with("-- [DDLUnavailable] "));
        assert!(!comment.contains('\n'));
    }
}
