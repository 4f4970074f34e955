//! Lazy object browser.
//!
//! The tree is materialized one level at a time. Every container node starts with a
//! placeholder child; expanding it replaces the placeholder with real children using a
//! single catalog call over a short-lived connection to the node's database.
//!
//! ```text
//! connection ─ database ─ schema ─ Tables    ─ table
//!                                  Views     ─ view
//!                                  Indexes   ─ index (with owning table)
//!                                  Functions ─ function
//!                                  Sequences ─ sequence
//!                                  Types     ─ type
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::BurrowError;
use crate::models::{ConnectionProfile, DbObject, ObjectKind, TableDetails};
use crate::services::{Connector, DdlReconstructor, MetadataRepository, SqlClient};
use crate::session::Session;

/// Handle of a node in the browser arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// What a node represents, with exactly the context needed to expand or select it.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A saved profile.
    Connection { profile: Arc<ConnectionProfile> },
    /// A database on the profile's server.
    Database { profile: Arc<ConnectionProfile>, database: String },
    /// A schema inside a database.
    Schema { profile: Arc<ConnectionProfile>, database: String, schema: String },
    /// Grouping folder for one object kind.
    Folder { profile: Arc<ConnectionProfile>, database: String, schema: String, kind: ObjectKind },
    /// A table, view, function, sequence or type.
    Object { profile: Arc<ConnectionProfile>, database: String, object: DbObject },
    /// An index, which also needs its owning table.
    Index { profile: Arc<ConnectionProfile>, database: String, object: DbObject, table: String },
}

impl NodeKind {
    /// Whether nodes of this kind can be expanded.
    pub fn is_container(&self) -> bool {
        !matches!(self, Self::Object { .. } | Self::Index { .. })
    }

    pub fn profile(&self) -> &Arc<ConnectionProfile> {
        match self {
            Self::Connection { profile }
            | Self::Database { profile, .. }
            | Self::Schema { profile, .. }
            | Self::Folder { profile, .. }
            | Self::Object { profile, .. }
            | Self::Index { profile, .. } => profile,
        }
    }

    /// Database the node lives in; `None` for connection nodes.
    pub fn database(&self) -> Option<&str> {
        match self {
            Self::Connection { .. } => None,
            Self::Database { database, .. }
            | Self::Schema { database, .. }
            | Self::Folder { database, .. }
            | Self::Object { database, .. }
            | Self::Index { database, .. } => Some(database),
        }
    }
}

/// Load state of a node's children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Children {
    /// Leaf objects never have children.
    Leaf,
    /// Not loaded yet; expanding will load.
    Placeholder,
    /// A load is in flight.
    Loading,
    /// Loaded children, in catalog order.
    Loaded(Vec<NodeId>),
}

/// One tree node.
#[derive(Debug, Clone)]
pub struct Node {
    pub label: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Children,
    pub expanded: bool,
}

/// Result of selecting a node.
#[derive(Debug)]
pub enum Selection {
    /// Full details of a table, loaded on the session.
    Table(Box<TableDetails>),
    /// Definition text of any other leaf.
    Definition { object: DbObject, ddl: String },
    /// A container node; nothing to load.
    Container,
}

/// The object tree for a set of saved profiles.
pub struct ObjectBrowser {
    connector: Arc<dyn Connector>,
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
    next_id: usize,
}

impl ObjectBrowser {
    /// Build a tree with one connection node per profile.
    pub fn new(connector: Arc<dyn Connector>, profiles: Vec<ConnectionProfile>) -> Self {
        let mut browser = Self { connector, nodes: HashMap::new(), roots: Vec::new(), next_id: 0 };
        browser.rebuild(profiles);
        browser
    }

    /// Drop the whole tree and start over from `profiles`.
    pub fn rebuild(&mut self, profiles: Vec<ConnectionProfile>) {
        self.nodes.clear();
        self.roots.clear();
        for profile in profiles {
            let label = profile.name.clone();
            let id = self.insert(label, NodeKind::Connection { profile: Arc::new(profile) }, None);
            self.roots.push(id);
        }
        tracing::debug!(roots = self.roots.len(), "Browser rebuilt");
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Loaded children of a node; empty while unloaded.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(&id).map(|n| &n.children) {
            Some(Children::Loaded(ids)) => ids,
            _ => &[],
        }
    }

    /// Loaded child with the given label. `None` for roots lookups; use [`Self::find_root`].
    pub fn find_child(&self, id: NodeId, label: &str) -> Option<NodeId> {
        self.children(id).iter().copied().find(|c| self.nodes.get(c).is_some_and(|n| n.label == label))
    }

    /// Root node for the profile with the given name.
    pub fn find_root(&self, label: &str) -> Option<NodeId> {
        self.roots.iter().copied().find(|c| self.nodes.get(c).is_some_and(|n| n.label == label))
    }

    /// Load a node's children if they are still a placeholder.
    ///
    /// Returns `true` if children were loaded by this call. A node that is already
    /// loaded (or a leaf) is only marked expanded. On failure the placeholder is
    /// restored and the error returned.
    pub async fn expand(&mut self, id: NodeId) -> Result<bool, BurrowError> {
        let node = self.node_mut(id)?;
        if node.children != Children::Placeholder {
            node.expanded = node.children != Children::Leaf;
            return Ok(false);
        }
        node.children = Children::Loading;
        let kind = node.kind.clone();

        tracing::debug!(node = ?id, label = %node.label, "Expanding node");
        match self.load_children(&kind).await {
            Ok(entries) => {
                let ids = entries
                    .into_iter()
                    .map(|(label, child)| self.insert(label, child, Some(id)))
                    .collect();
                let node = self.node_mut(id)?;
                node.children = Children::Loaded(ids);
                node.expanded = true;
                Ok(true)
            }
            Err(e) => {
                tracing::debug!(node = ?id, error = %e, "Expansion failed");
                let node = self.node_mut(id)?;
                node.children = Children::Placeholder;
                node.expanded = false;
                Err(e)
            }
        }
    }

    /// Forget a container's children so the next expansion reloads them.
    pub fn refresh(&mut self, id: NodeId) -> Result<(), BurrowError> {
        let node = self.node_mut(id)?;
        if node.children == Children::Leaf {
            return Ok(());
        }
        let previous = std::mem::replace(&mut node.children, Children::Placeholder);
        node.expanded = false;
        if let Children::Loaded(ids) = previous {
            for child in ids {
                self.remove_subtree(child);
            }
        }
        Ok(())
    }

    /// Mark a node collapsed, keeping its children.
    pub fn collapse(&mut self, id: NodeId) -> Result<(), BurrowError> {
        self.node_mut(id)?.expanded = false;
        Ok(())
    }

    /// Load whatever a selected node displays.
    ///
    /// Selecting a table moves `session` onto the table's database (and profile) first,
    /// so the session's target can change as a side effect. Other leaves are read over
    /// a short-lived connection and always produce displayable text.
    pub async fn select(&self, id: NodeId, session: &mut Session) -> Result<Selection, BurrowError> {
        let node = self.nodes.get(&id).ok_or_else(|| unknown_node(id))?;

        match &node.kind {
            NodeKind::Object { profile, database, object } if object.obj_type == ObjectKind::Table => {
                self.move_session(session, profile, database).await?;
                let details = MetadataRepository::load_table_details(
                    session.client(),
                    &object.schema,
                    &object.name,
                )
                .await?;
                Ok(Selection::Table(Box::new(details)))
            }
            NodeKind::Object { profile, database, object } => {
                let ddl = self.definition(profile, database, object, None).await;
                Ok(Selection::Definition { object: object.clone(), ddl })
            }
            NodeKind::Index { profile, database, object, table } => {
                let ddl = self.definition(profile, database, object, Some(table.as_str())).await;
                Ok(Selection::Definition { object: object.clone(), ddl })
            }
            _ => Ok(Selection::Container),
        }
    }

    // ========== Internals ==========

    fn insert(&mut self, label: String, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let children = if kind.is_container() { Children::Placeholder } else { Children::Leaf };
        self.nodes.insert(id, Node { label, kind, parent, children, expanded: false });
        id
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, BurrowError> {
        self.nodes.get_mut(&id).ok_or_else(|| unknown_node(id))
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            if let Children::Loaded(ids) = node.children {
                for child in ids {
                    self.remove_subtree(child);
                }
            }
        }
    }

    async fn load_children(&self, kind: &NodeKind) -> Result<Vec<(String, NodeKind)>, BurrowError> {
        let (profile, database) = match kind {
            NodeKind::Schema { profile, database, schema } => {
                return Ok(ObjectKind::ALL
                    .iter()
                    .map(|k| {
                        (
                            k.folder_label().to_string(),
                            NodeKind::Folder {
                                profile: Arc::clone(profile),
                                database: database.clone(),
                                schema: schema.clone(),
                                kind: *k,
                            },
                        )
                    })
                    .collect());
            }
            NodeKind::Connection { profile } => (profile, profile.database.as_str()),
            NodeKind::Database { profile, database } | NodeKind::Folder { profile, database, .. } => {
                (profile, database.as_str())
            }
            NodeKind::Object { .. } | NodeKind::Index { .. } => return Ok(Vec::new()),
        };

        let client = self.connector.connect(profile, database).await?;
        let result = list_children(client.as_ref(), kind).await;
        client.close().await;
        result
    }

    async fn move_session(
        &self,
        session: &mut Session,
        profile: &Arc<ConnectionProfile>,
        database: &str,
    ) -> Result<(), BurrowError> {
        if session.profile().id == profile.id {
            return session.switch_database(database).await;
        }

        let next =
            Session::open_database(Arc::clone(&self.connector), profile.as_ref().clone(), database)
                .await?;
        std::mem::replace(session, next).close().await;
        Ok(())
    }

    async fn definition(
        &self,
        profile: &ConnectionProfile,
        database: &str,
        object: &DbObject,
        table: Option<&str>,
    ) -> String {
        let client = match self.connector.connect(profile, database).await {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(object = %object.qualified_name(), error = %e, "DDL connection failed");
                return e.to_comment();
            }
        };
        let ddl = DdlReconstructor::get_object_ddl(client.as_ref(), object, table).await;
        client.close().await;
        ddl
    }
}

async fn list_children(
    client: &dyn SqlClient,
    kind: &NodeKind,
) -> Result<Vec<(String, NodeKind)>, BurrowError> {
    match kind {
        NodeKind::Connection { profile } => {
            let databases = MetadataRepository::list_databases(client).await?;
            Ok(databases
                .into_iter()
                .map(|database| {
                    (database.clone(), NodeKind::Database { profile: Arc::clone(profile), database })
                })
                .collect())
        }
        NodeKind::Database { profile, database } => {
            let schemas = MetadataRepository::list_schemas(client).await?;
            Ok(schemas
                .into_iter()
                .map(|schema| {
                    (
                        schema.clone(),
                        NodeKind::Schema {
                            profile: Arc::clone(profile),
                            database: database.clone(),
                            schema,
                        },
                    )
                })
                .collect())
        }
        NodeKind::Folder { profile, database, schema, kind: ObjectKind::Index } => {
            let indexes = MetadataRepository::list_indexes(client, schema).await?;
            Ok(indexes
                .into_iter()
                .map(|index| {
                    (
                        format!("{}.{}", index.table, index.object.name),
                        NodeKind::Index {
                            profile: Arc::clone(profile),
                            database: database.clone(),
                            object: index.object,
                            table: index.table,
                        },
                    )
                })
                .collect())
        }
        NodeKind::Folder { profile, database, schema, kind } => {
            let objects = match kind {
                ObjectKind::Table => MetadataRepository::list_tables(client, schema).await?,
                ObjectKind::View => MetadataRepository::list_views(client, schema).await?,
                ObjectKind::Function => MetadataRepository::list_functions(client, schema).await?,
                ObjectKind::Sequence => MetadataRepository::list_sequences(client, schema).await?,
                ObjectKind::Type => MetadataRepository::list_types(client, schema).await?,
                ObjectKind::Index => Vec::new(),
            };
            Ok(objects
                .into_iter()
                .map(|object| {
                    (
                        object.name.clone(),
                        NodeKind::Object {
                            profile: Arc::clone(profile),
                            database: database.clone(),
                            object,
                        },
                    )
                })
                .collect())
        }
        NodeKind::Schema { .. } | NodeKind::Object { .. } | NodeKind::Index { .. } => Ok(Vec::new()),
    }
}

fn unknown_node(id: NodeId) -> BurrowError {
    BurrowError::invalid_input(format!("unknown browser node {}", id.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog;
    use crate::testing::{result_set, MockClient, MockConnector};

    fn browser_with(client: MockClient) -> (MockConnector, ObjectBrowser) {
        let connector = MockConnector::new(client);
        let profile = ConnectionProfile::builder().name("local").build().unwrap();
        let browser = ObjectBrowser::new(Arc::new(connector.clone()), vec![profile]);
        (connector, browser)
    }

    #[tokio::test]
    async fn test_roots_start_with_placeholder() {
        let (connector, browser) = browser_with(MockClient::new("defaultdb"));
        let root = browser.roots()[0];
        let node = browser.node(root).unwrap();
        assert_eq!(node.label, "local");
        assert_eq!(node.children, Children::Placeholder);
        assert!(browser.children(root).is_empty());
        assert!(connector.connects().is_empty());
    }

    #[tokio::test]
    async fn test_connection_lists_databases_over_short_lived_connection() {
        let client = MockClient::new("defaultdb").with_result(
            catalog::LIST_DATABASES,
            result_set(&["database_name", "owner"], &[&[Some("defaultdb"), Some("root")], &[Some("shop"), Some("root")]]),
        );
        let (connector, mut browser) = browser_with(client);
        let root = browser.roots()[0];

        assert!(browser.expand(root).await.unwrap());
        assert_eq!(connector.connects(), vec!["defaultdb"]);
        assert_eq!(connector.client().closed(), vec!["defaultdb"]);

        let shop = browser.find_child(root, "shop").unwrap();
        assert!(matches!(browser.node(shop).unwrap().kind, NodeKind::Database { .. }));
        assert_eq!(browser.node(shop).unwrap().parent, Some(root));
    }

    #[tokio::test]
    async fn test_schema_seeds_six_folders_without_connecting() {
        let client = MockClient::new("defaultdb")
            .with_result(catalog::LIST_DATABASES, result_set(&["database_name"], &[&[Some("shop")]]))
            .with_result(catalog::LIST_SCHEMAS, result_set(&["schema_name"], &[&[Some("public")]]));
        let (connector, mut browser) = browser_with(client);
        let root = browser.roots()[0];
        browser.expand(root).await.unwrap();
        let db = browser.find_child(root, "shop").unwrap();
        browser.expand(db).await.unwrap();
        let schema = browser.find_child(db, "public").unwrap();

        browser.expand(schema).await.unwrap();
        let labels: Vec<_> =
            browser.children(schema).iter().map(|c| browser.node(*c).unwrap().label.clone()).collect();
        assert_eq!(labels, vec!["Tables", "Views", "Indexes", "Functions", "Sequences", "Types"]);
        assert_eq!(connector.connects(), vec!["defaultdb", "shop"]);
        for folder in browser.children(schema) {
            assert_eq!(browser.node(*folder).unwrap().children, Children::Placeholder);
        }
    }

    #[tokio::test]
    async fn test_failed_expansion_restores_placeholder() {
        let (connector, mut browser) = browser_with(MockClient::new("defaultdb"));
        let root = browser.roots()[0];
        connector.refuse("connection refused");

        let err = browser.expand(root).await.unwrap_err();
        assert!(err.is_connectivity());
        assert_eq!(browser.node(root).unwrap().children, Children::Placeholder);
        assert!(!browser.node(root).unwrap().expanded);
    }

    #[tokio::test]
    async fn test_catalog_failure_closes_connection() {
        let client = MockClient::new("defaultdb").with_failure(
            catalog::LIST_DATABASES,
            "permission denied",
            Some("42501"),
        );
        let (connector, mut browser) = browser_with(client);
        let root = browser.roots()[0];

        let err = browser.expand(root).await.unwrap_err();
        assert_eq!(err.label(), "CatalogQueryError");
        assert_eq!(connector.client().closed(), vec!["defaultdb"]);
    }

    #[tokio::test]
    async fn test_refresh_reloads() {
        let client = MockClient::new("defaultdb")
            .with_result(catalog::LIST_DATABASES, result_set(&["database_name"], &[&[Some("shop")]]));
        let (connector, mut browser) = browser_with(client);
        let root = browser.roots()[0];

        browser.expand(root).await.unwrap();
        let old_child = browser.children(root)[0];
        browser.refresh(root).unwrap();
        assert!(browser.node(old_child).is_none());
        assert_eq!(browser.node(root).unwrap().children, Children::Placeholder);

        assert!(browser.expand(root).await.unwrap());
        assert_eq!(connector.client().count(catalog::LIST_DATABASES), 2);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_roots() {
        let (_connector, mut browser) = browser_with(MockClient::new("defaultdb"));
        browser.rebuild(vec![
            ConnectionProfile::new("a", "h1"),
            ConnectionProfile::new("b", "h2"),
        ]);
        assert_eq!(browser.roots().len(), 2);
        assert!(browser.find_root("b").is_some());
        assert!(browser.find_root("local").is_none());
    }
}
