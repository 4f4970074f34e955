//! Backend services for burrow.
//!
//! This module contains the service layer:
//! - `connection` - SQL client seam and the tokio-postgres implementation
//! - `catalog` - Fixed catalog queries, one per metadata facet
//! - `metadata` - Typed records from catalog rows
//! - `ddl` - Definition text for tables and other objects
//! - `execute` - Read/write statement dispatcher
//! - `builder` - CREATE/DROP statement builders
//! - `ident` - Identifier validation and quoting
//! - `storage` - Local SQLite storage for connection profiles

pub mod builder;
pub mod catalog;
pub mod connection;
pub mod ddl;
pub mod execute;
pub mod ident;
pub mod metadata;
pub mod storage;

pub use builder::{drop_statement, ColumnSpec, TableSpec, ViewSpec};
pub use connection::{Connector, PgClient, PgConnector, SqlClient};
pub use ddl::DdlReconstructor;
pub use metadata::MetadataRepository;
pub use storage::LocalStorage;
