//! Database connections over the PostgreSQL wire protocol.
//!
//! Provides:
//! - `SqlClient`, the statement-level seam every other service talks to
//! - `Connector`, which opens one unpooled connection per call
//! - `PgClient` / `PgConnector`, the tokio-postgres implementations
//!
//! Connections are never pooled: the browser opens a short-lived one per expansion
//! and the session holds exactly one for the active database.

use crate::error::BurrowError;
use crate::models::{ConnectionProfile, ResultSet, Row, Value};

use async_trait::async_trait;
use bytes::BytesMut;
use postgres_types::{FromSql, IsNull, Kind, ToSql, Type};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_postgres::{NoTls, SimpleQueryMessage};

/// Statement-level access to one open connection.
#[async_trait]
pub trait SqlClient: Send + Sync {
    /// Database this client is connected to.
    fn database(&self) -> &str;

    /// Run a statement and collect its column names and rows.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet, BurrowError>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, BurrowError>;

    /// Run parameterless statement text, discarding any output.
    async fn batch(&self, sql: &str) -> Result<(), BurrowError>;

    /// Open an explicit transaction.
    async fn begin(&self) -> Result<(), BurrowError> {
        self.batch("BEGIN").await
    }

    /// Commit the open transaction.
    async fn commit(&self) -> Result<(), BurrowError> {
        self.batch("COMMIT").await
    }

    /// Roll back the open transaction.
    async fn rollback(&self) -> Result<(), BurrowError> {
        self.batch("ROLLBACK").await
    }

    /// Release the connection.
    async fn close(self: Box<Self>) {}
}

/// Opens connections for a profile.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection to `database` using the profile's server and credentials.
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        database: &str,
    ) -> Result<Box<dyn SqlClient>, BurrowError>;
}

/// tokio-postgres connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgConnector;

impl PgConnector {
    /// Open a connection, run `SELECT 1`, and close it again.
    pub async fn test_connection(&self, profile: &ConnectionProfile) -> Result<(), BurrowError> {
        let client = PgClient::connect(profile, &profile.database).await?;
        let result = client
            .batch("SELECT 1")
            .await
            .map_err(|e| BurrowError::connection(format!("Connection validation failed: {e}")));
        Box::new(client).close().await;
        result
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(
        &self,
        profile: &ConnectionProfile,
        database: &str,
    ) -> Result<Box<dyn SqlClient>, BurrowError> {
        Ok(Box::new(PgClient::connect(profile, database).await?))
    }
}

/// One tokio-postgres connection.
pub struct PgClient {
    client: tokio_postgres::Client,
    database: String,
    connection_task: JoinHandle<()>,
}

impl PgClient {
    /// Connect to `database` on the profile's server.
    pub async fn connect(profile: &ConnectionProfile, database: &str) -> Result<Self, BurrowError> {
        if !profile.ssl_mode.allows_plaintext() {
            return Err(BurrowError::config(format!(
                "sslmode={} requires TLS, which this build does not support",
                profile.ssl_mode.as_str()
            )));
        }

        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&profile.host);
        pg_config.port(profile.port);
        pg_config.dbname(database);
        pg_config.user(&profile.user);
        if let Some(password) = &profile.password {
            pg_config.password(password);
        }
        pg_config.application_name(&profile.options.application_name);
        pg_config.connect_timeout(Duration::from_secs(
            profile.options.connect_timeout_secs as u64,
        ));
        pg_config.ssl_mode(match profile.ssl_mode {
            crate::models::SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            _ => tokio_postgres::config::SslMode::Disable,
        });
        if let Some(secs) = profile.options.statement_timeout_secs {
            pg_config.options(&format!("-c statement_timeout={}", secs as u64 * 1000));
        }

        let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
            tracing::error!(
                host = %profile.host,
                port = profile.port,
                database = %database,
                error = %e,
                "Failed to connect"
            );
            BurrowError::from(e)
        })?;

        let task_database = database.to_string();
        let connection_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(database = %task_database, error = %e, "Connection terminated");
            }
        });

        tracing::info!(
            profile = %profile.name,
            host = %profile.host,
            database = %database,
            "Connected"
        );

        Ok(Self { client, database: database.to_string(), connection_task })
    }

    /// Simple-query protocol: every value arrives as server-formatted text.
    async fn simple_query(&self, sql: &str) -> Result<ResultSet, BurrowError> {
        let messages = self.client.simple_query(sql).await?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::new();
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(desc) => {
                    if columns.is_empty() {
                        columns = desc.iter().map(|c| c.name().to_string()).collect();
                    }
                }
                SimpleQueryMessage::Row(row) => {
                    if columns.is_empty() {
                        columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    let values = (0..row.len())
                        .map(|idx| match row.get(idx) {
                            Some(text) => Value::Text(text.to_string()),
                            None => Value::Null,
                        })
                        .collect();
                    rows.push(Row(values));
                }
                _ => {}
            }
        }

        Ok(ResultSet::new(columns, rows))
    }

    /// Extended protocol with typed decoding.
    async fn typed_query(&self, sql: &str, params: &[Value]) -> Result<ResultSet, BurrowError> {
        let statement = self.client.prepare(sql).await?;
        let columns = statement.columns().iter().map(|c| c.name().to_string()).collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let pg_rows = self.client.query(&statement, &param_refs).await?;
        let rows = pg_rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;

        Ok(ResultSet::new(columns, rows))
    }
}

#[async_trait]
impl SqlClient for PgClient {
    fn database(&self) -> &str {
        &self.database
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<ResultSet, BurrowError> {
        if params.is_empty() {
            self.simple_query(sql).await
        } else {
            self.typed_query(sql, params).await
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, BurrowError> {
        let param_refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        self.client.execute(sql, &param_refs).await.map_err(BurrowError::from)
    }

    async fn batch(&self, sql: &str) -> Result<(), BurrowError> {
        self.client.batch_execute(sql).await.map_err(BurrowError::from)
    }

    async fn close(self: Box<Self>) {
        let Self { client, database, connection_task } = *self;
        drop(client);
        if let Err(e) = connection_task.await {
            tracing::warn!(database = %database, error = %e, "Connection task did not shut down cleanly");
        }
        tracing::debug!(database = %database, "Connection closed");
    }
}

// ========== Wire conversions ==========

/// A binary-format cell of a type without a typed arm in `decode_cell`.
struct Fallback(Value);

impl<'a> FromSql<'a> for Fallback {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(fallback_value(ty, raw)))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// NUMERIC as decimal text, enum labels as text, anything else as raw bytes.
///
/// A NUMERIC outside `Decimal`'s range (or NaN) becomes a `<numeric>` marker.
fn fallback_value(ty: &Type, raw: &[u8]) -> Value {
    if *ty == Type::NUMERIC {
        return match Decimal::from_sql(ty, raw) {
            Ok(v) => Value::Text(v.to_string()),
            Err(_) => Value::Text(format!("<{}>", ty.name())),
        };
    }
    match ty.kind() {
        // Enum values travel as their label in both formats.
        Kind::Enum(_) => Value::Text(String::from_utf8_lossy(raw).into_owned()),
        _ => Value::Bytes(raw.to_vec()),
    }
}

fn decode_row(row: &tokio_postgres::Row) -> Result<Row, BurrowError> {
    (0..row.len()).map(|idx| decode_cell(row, idx)).collect::<Result<Vec<_>, _>>().map(Row)
}

fn decode_cell(row: &tokio_postgres::Row, idx: usize) -> Result<Value, BurrowError> {
    let column = &row.columns()[idx];
    let decode_err = |e: tokio_postgres::Error| {
        BurrowError::query(format!("cannot decode column {}: {e}", column.name()), None, None, None, None)
    };

    let value = match *column.type_() {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map_err(decode_err)?.map(Value::Bool),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .map_err(decode_err)?
            .map(|v| Value::Int(v.into())),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .map_err(decode_err)?
            .map(|v| Value::Int(v.into())),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map_err(decode_err)?.map(Value::Int),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)
            .map_err(decode_err)?
            .map(|v| Value::Int(v.into())),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .map_err(decode_err)?
            .map(|v| Value::Float(v.into())),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map_err(decode_err)?.map(Value::Float),
        Type::TEXT | Type::VARCHAR | Type::NAME | Type::BPCHAR | Type::UNKNOWN => {
            row.try_get::<_, Option<String>>(idx).map_err(decode_err)?.map(Value::Text)
        }
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .map_err(decode_err)?
            .map(|v| Value::Text(v.to_string())),
        Type::UUID => row
            .try_get::<_, Option<uuid::Uuid>>(idx)
            .map_err(decode_err)?
            .map(|v| Value::Text(v.to_string())),
        Type::TIMESTAMP => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .map_err(decode_err)?
            .map(|v| Value::Text(v.to_string())),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map_err(decode_err)?
            .map(|v| Value::Text(v.to_rfc3339())),
        Type::DATE => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .map_err(decode_err)?
            .map(|v| Value::Text(v.to_string())),
        Type::TIME => row
            .try_get::<_, Option<chrono::NaiveTime>>(idx)
            .map_err(decode_err)?
            .map(|v| Value::Text(v.to_string())),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx).map_err(decode_err)?.map(Value::Bytes),
        _ => row.try_get::<_, Option<Fallback>>(idx).map_err(decode_err)?.map(|Fallback(v)| v),
    };

    Ok(value.unwrap_or(Value::Null))
}

/// Binds a `Value` to whatever type the prepared statement expects, narrowing
/// integers and parsing text where the target is not textual.
impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::OID => u32::try_from(*v)?.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR | Type::NAME | Type::BPCHAR => {
                    v.to_string().to_sql(ty, out)
                }
                _ => v.to_sql(ty, out),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::TEXT | Type::VARCHAR => v.to_string().to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Text(v) => match *ty {
                Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
                    Value::Int(v.trim().parse::<i64>()?).to_sql(ty, out)
                }
                Type::FLOAT4 | Type::FLOAT8 => Value::Float(v.trim().parse::<f64>()?).to_sql(ty, out),
                Type::BOOL => match v.trim().to_lowercase().as_str() {
                    "t" | "true" | "1" | "yes" | "on" => true.to_sql(ty, out),
                    "f" | "false" | "0" | "no" | "off" => false.to_sql(ty, out),
                    other => Err(format!("invalid boolean literal: {other}").into()),
                },
                Type::JSON | Type::JSONB => {
                    serde_json::from_str::<serde_json::Value>(v)?.to_sql(ty, out)
                }
                _ => v.to_sql(ty, out),
            },
            Value::Bytes(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SslMode;

    #[test]
    fn test_int_narrows_to_int4() {
        let mut out = BytesMut::new();
        Value::Int(7).to_sql(&Type::INT4, &mut out).unwrap();
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_int_out_of_range_for_int2_fails() {
        let mut out = BytesMut::new();
        assert!(Value::Int(100_000).to_sql(&Type::INT2, &mut out).is_err());
    }

    #[test]
    fn test_text_parses_into_int8() {
        let mut out = BytesMut::new();
        Value::Text(" 42 ".into()).to_sql(&Type::INT8, &mut out).unwrap();
        assert_eq!(out.as_ref(), &42i64.to_be_bytes());
    }

    #[test]
    fn test_null_binds_as_null() {
        let mut out = BytesMut::new();
        assert!(matches!(Value::Null.to_sql(&Type::TEXT, &mut out).unwrap(), IsNull::Yes));
    }

    #[test]
    fn test_numeric_cell_decodes_to_decimal_text() {
        let mut raw = BytesMut::new();
        Decimal::new(125, 1).to_sql(&Type::NUMERIC, &mut raw).unwrap();
        assert_eq!(fallback_value(&Type::NUMERIC, &raw), Value::Text("12.5".into()));
    }

    #[test]
    fn test_numeric_nan_becomes_marker() {
        // ndigits=0, weight=0, sign=NaN, dscale=0
        let raw = [0u8, 0, 0, 0, 0xC0, 0, 0, 0];
        assert_eq!(fallback_value(&Type::NUMERIC, &raw), Value::Text("<numeric>".into()));
    }

    #[test]
    fn test_enum_cell_is_its_label() {
        let mood = Type::new(
            "mood".into(),
            100_001,
            Kind::Enum(vec!["happy".into(), "sad".into()]),
            "public".into(),
        );
        assert_eq!(fallback_value(&mood, b"happy"), Value::Text("happy".into()));
    }

    #[test]
    fn test_unhandled_binary_cell_stays_bytes() {
        // INTERVAL: microseconds, days, months
        let raw = [0u8, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 0];
        assert_eq!(fallback_value(&Type::INTERVAL, &raw), Value::Bytes(raw.to_vec()));
        let inet = fallback_value(&Type::INET, &[2, 32, 0, 4, 10, 0, 0, 1]);
        assert_eq!(inet.to_string(), "\\x022000040a000001");
    }

    #[tokio::test]
    async fn test_tls_modes_rejected_before_dialing() {
        let mut profile = ConnectionProfile::new("secure", "127.0.0.1");
        profile.ssl_mode = SslMode::VerifyFull;
        let err = PgClient::connect(&profile, "defaultdb").await.err().unwrap();
        assert!(matches!(err, BurrowError::Config { .. }));
    }
}
