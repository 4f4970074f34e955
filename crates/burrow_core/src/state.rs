//! Process-wide application state.
//!
//! Holds the data directory, profile storage, the connector used for every database
//! connection, and the tokio runtime the synchronous front end drives async work on.

use crate::browser::ObjectBrowser;
use crate::error::BurrowError;
use crate::models::ConnectionProfile;
use crate::services::{storage, Connector, LocalStorage, PgConnector};
use crate::session::Session;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Central application state.
pub struct BurrowState {
    storage: LocalStorage,
    data_dir: PathBuf,
    connector: Arc<dyn Connector>,
    tokio_runtime: tokio::runtime::Runtime,
}

impl BurrowState {
    /// Create state in the default data directory with the tokio-postgres connector.
    pub fn new() -> Result<Self, BurrowError> {
        Self::with_data_dir(storage::default_data_dir())
    }

    /// Create state with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Result<Self, BurrowError> {
        Self::with_connector(data_dir, Arc::new(PgConnector))
    }

    /// Create state with a custom data directory and connector.
    pub fn with_connector(
        data_dir: PathBuf,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, BurrowError> {
        storage::init_data_dir(&data_dir)?;

        let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| BurrowError::internal(format!("Failed to create tokio runtime: {e}")))?;

        let storage = LocalStorage::open(data_dir.clone())?;

        tracing::info!(data_dir = %data_dir.display(), "BurrowState initialized");

        Ok(Self { storage, data_dir, connector, tokio_runtime })
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    /// Open a session for a profile and record it as recently used.
    ///
    /// Connects to `database`, or to the profile's own database when `None`.
    pub async fn open_session(
        &self,
        profile: ConnectionProfile,
        database: Option<&str>,
    ) -> Result<Session, BurrowError> {
        let id = profile.id;
        let session = match database {
            Some(database) => Session::open_database(self.connector(), profile, database).await?,
            None => Session::open(self.connector(), profile).await?,
        };
        if let Err(e) = self.storage.touch_profile(id) {
            tracing::warn!(profile_id = %id, error = %e, "Failed to record profile use");
        }
        Ok(session)
    }

    /// A browser over every saved profile, each carrying `password`.
    pub fn browser(&self, password: Option<&str>) -> Result<ObjectBrowser, BurrowError> {
        let profiles = self
            .storage
            .load_all_profiles()?
            .into_iter()
            .map(|p| p.with_password(password.map(String::from)))
            .collect();
        Ok(ObjectBrowser::new(self.connector(), profiles))
    }

    // ========== Runtime ==========

    /// Block the current thread until `future` completes.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.tokio_runtime.block_on(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockClient, MockConnector};
    use tempfile::TempDir;

    fn fixture() -> (TempDir, MockConnector, BurrowState) {
        let dir = TempDir::new().unwrap();
        let connector = MockConnector::new(MockClient::new("unused"));
        let state =
            BurrowState::with_connector(dir.path().to_path_buf(), Arc::new(connector.clone()))
                .unwrap();
        for name in ["alpha", "beta"] {
            let profile = ConnectionProfile::builder().name(name).database("shop").build().unwrap();
            state.storage().save_profile(&profile).unwrap();
        }
        (dir, connector, state)
    }

    fn names(state: &BurrowState) -> Vec<String> {
        state.storage().load_all_profiles().unwrap().into_iter().map(|p| p.name).collect()
    }

    #[test]
    fn test_open_session_marks_profile_used() {
        let (_dir, connector, state) = fixture();
        assert_eq!(names(&state), vec!["alpha", "beta"]);

        let beta = state.storage().load_profile_by_name("beta").unwrap().unwrap();
        let session = state.block_on(state.open_session(beta, Some("analytics"))).unwrap();
        assert_eq!(session.database(), "analytics");
        state.block_on(session.close());

        assert_eq!(connector.connects(), vec!["analytics"]);
        assert_eq!(names(&state), vec!["beta", "alpha"]);
    }

    #[test]
    fn test_open_session_defaults_to_profile_database() {
        let (_dir, connector, state) = fixture();
        let alpha = state.storage().load_profile_by_name("alpha").unwrap().unwrap();
        let session = state.block_on(state.open_session(alpha, None)).unwrap();
        assert_eq!(session.database(), "shop");
        assert_eq!(connector.connects(), vec!["shop"]);
    }

    #[test]
    fn test_browser_carries_password_to_every_root() {
        let (_dir, _connector, state) = fixture();
        let browser = state.browser(Some("s3cret")).unwrap();
        assert_eq!(browser.roots().len(), 2);
        for id in browser.roots() {
            let node = browser.node(*id).unwrap();
            assert_eq!(node.kind.profile().password.as_deref(), Some("s3cret"));
        }
        assert!(browser.find_root("beta").is_some());
    }
}
