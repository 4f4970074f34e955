//! Data models for burrow.
//!
//! This module contains all core data structures:
//! - `connection` - ConnectionProfile, SslMode, ConnectionOptions
//! - `query` - Value, Row, ResultSet, StatementKind, ResultEnvelope
//! - `schema` - Catalog objects and the typed metadata records

pub mod connection;
pub mod query;
pub mod schema;

pub use connection::{ConnectionOptions, ConnectionProfile, ConnectionProfileBuilder, SslMode};
pub use query::{ResultEnvelope, ResultSet, Row, StatementKind, Value};
pub use schema::{
    ColumnDefaults, ColumnDescriptor, ColumnDetail, DbObject, ForeignKeyDescriptor,
    IndexDescriptor, IndexKind, ObjectKind, SchemaIndex, TableDetails, UniqueConstraintGroup,
};
