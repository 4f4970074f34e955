//! Core of burrow, a catalog browser for CockroachDB and other PostgreSQL-wire databases.
//!
//! - **error**: Error taxonomy shared by every layer
//! - **models**: Profiles, catalog records and statement results
//! - **services**: SQL client seam, catalog queries, metadata, DDL, dispatcher, storage
//! - **session**: The active connection
//! - **browser**: Lazily materialized object tree
//! - **state**: Process-wide state for front ends
//! - **logging**: Structured logging setup

pub mod browser;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use browser::{Children, Node, NodeId, NodeKind, ObjectBrowser, Selection};
pub use error::{BurrowError, ErrorInfo};
pub use models::{
    ColumnDefaults, ColumnDescriptor, ColumnDetail, ConnectionOptions, ConnectionProfile,
    DbObject, ForeignKeyDescriptor, IndexDescriptor, IndexKind, ObjectKind, ResultEnvelope,
    ResultSet, Row, SchemaIndex, SslMode, StatementKind, TableDetails, UniqueConstraintGroup,
    Value,
};
pub use services::{
    Connector, DdlReconstructor, LocalStorage, MetadataRepository, PgConnector, SqlClient,
};
pub use session::Session;
pub use state::BurrowState;
