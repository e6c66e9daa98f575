use mongodb::bson::Document;

use crate::database::mongodb::models::{CollectionInfo, IndexInfo, Role};
use crate::prelude::*;
use crate::schema::{CollectionSpec, IndexSpec, UserSpec};

/// Result of a single creation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    AlreadyExists,
}

/// Administrative operations on the application database.
#[async_trait]
pub trait Admin: Sync {
    /// Creates the user in the application database, with the role scoped to that database.
    async fn create_user(&self, user: &UserSpec) -> Result<Outcome>;

    async fn create_collection(&self, collection: &CollectionSpec) -> Result<Outcome>;

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<Outcome>;

    /// Returns `None` for a missing user.
    async fn user_roles(&self, username: &str) -> Result<Option<Vec<Role>>>;

    /// Returns `None` for a missing collection.
    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Lists the user collections, `system.*` excluded.
    async fn collection_names(&self) -> Result<Vec<String>>;

    /// Lists the indexes, or nothing if the collection does not exist.
    async fn indexes(&self, collection: &str) -> Result<Vec<IndexInfo>>;

    /// Explains a `find` with the query planner verbosity.
    async fn explain_find(&self, collection: &str, filter: Document, sort: Document)
        -> Result<Document>;
}
