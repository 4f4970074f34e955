//! The active connection.
//!
//! A `Session` owns the one connection used for statement execution and table detail
//! loading. Switching database takes `&mut self`, so it cannot overlap with a statement
//! running on the same session.

use std::sync::Arc;

use crate::error::BurrowError;
use crate::models::{ConnectionProfile, ResultEnvelope, Value};
use crate::services::{execute, Connector, SqlClient};

/// Active connection context for one profile.
pub struct Session {
    profile: ConnectionProfile,
    connector: Arc<dyn Connector>,
    client: Box<dyn SqlClient>,
}

impl Session {
    /// Connect to the profile's default database.
    pub async fn open(
        connector: Arc<dyn Connector>,
        profile: ConnectionProfile,
    ) -> Result<Self, BurrowError> {
        let database = profile.database.clone();
        Self::open_database(connector, profile, &database).await
    }

    /// Connect to a specific database on the profile's server.
    pub async fn open_database(
        connector: Arc<dyn Connector>,
        profile: ConnectionProfile,
        database: &str,
    ) -> Result<Self, BurrowError> {
        let client = connector.connect(&profile, database).await?;
        tracing::info!(profile = %profile.name, database, "Session opened");
        Ok(Self { profile, connector, client })
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    /// Database the session is currently connected to.
    pub fn database(&self) -> &str {
        self.client.database()
    }

    pub fn client(&self) -> &dyn SqlClient {
        self.client.as_ref()
    }

    /// Reconnect to `database`.
    ///
    /// The new connection is opened before the old one is closed, so a failed switch
    /// leaves the session on its previous database. No-op if already connected there.
    pub async fn switch_database(&mut self, database: &str) -> Result<(), BurrowError> {
        if self.client.database() == database {
            return Ok(());
        }

        let client = self.connector.connect(&self.profile, database).await?;
        let previous = std::mem::replace(&mut self.client, client);
        tracing::info!(
            profile = %self.profile.name,
            from = previous.database(),
            to = database,
            "Switched database"
        );
        previous.close().await;
        Ok(())
    }

    /// Dispatch one statement on the active connection.
    pub async fn run(&self, sql: &str, params: &[Value]) -> Result<ResultEnvelope, BurrowError> {
        execute::run(self.client.as_ref(), sql, params).await
    }

    /// Close the active connection.
    pub async fn close(self) {
        tracing::info!(profile = %self.profile.name, database = self.client.database(), "Session closed");
        self.client.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockClient, MockConnector};

    fn fixture() -> (MockConnector, ConnectionProfile) {
        let connector = MockConnector::new(MockClient::new("unused"));
        let profile = ConnectionProfile::builder().name("dev").database("shop").build().unwrap();
        (connector, profile)
    }

    #[tokio::test]
    async fn test_open_uses_profile_database() {
        let (connector, profile) = fixture();
        let session = Session::open(Arc::new(connector.clone()), profile).await.unwrap();
        assert_eq!(session.database(), "shop");
        assert_eq!(connector.connects(), vec!["shop"]);
    }

    #[tokio::test]
    async fn test_switch_opens_new_then_closes_old() {
        let (connector, profile) = fixture();
        let mut session = Session::open(Arc::new(connector.clone()), profile).await.unwrap();

        session.switch_database("shop").await.unwrap();
        assert_eq!(connector.connects(), vec!["shop"]);

        session.switch_database("analytics").await.unwrap();
        assert_eq!(session.database(), "analytics");
        assert_eq!(connector.connects(), vec!["shop", "analytics"]);
        assert_eq!(connector.client().closed(), vec!["shop"]);
    }

    #[tokio::test]
    async fn test_failed_switch_keeps_previous_connection() {
        let (connector, profile) = fixture();
        let mut session = Session::open(Arc::new(connector.clone()), profile).await.unwrap();

        connector.refuse("connection refused");
        let err = session.switch_database("analytics").await.unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(session.database(), "shop");
        assert!(connector.client().closed().is_empty());
    }
}
