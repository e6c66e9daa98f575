use mongodb::bson::{doc, from_document, Document};
use mongodb::options::{CreateCollectionOptions, IndexOptions, TimeseriesGranularity, TimeseriesOptions};
use mongodb::{Client, Database, IndexModel};

use crate::prelude::*;
use crate::schema::{CollectionSpec, IndexSpec, UserSpec};

pub mod errors;
pub mod models;
pub mod traits;

use self::models::{BuildInfo, CollectionInfo, CursorResponse, IndexInfo, Role, UsersInfo};
use self::traits::{Admin, Outcome};

/// Time-series collections appeared in 5.0.
const MIN_MAJOR_VERSION: u32 = 5;

/// Administrative connection bound to the application database.
pub struct MongoAdmin {
    database: Database,
}

/// Connects to the server and resolves the administrative and the application namespaces.
#[instrument(level = "debug", skip_all, fields(database = database_name))]
pub async fn open(uri: &str, database_name: &str) -> Result<MongoAdmin> {
    info!("connecting…");
    let client = Client::with_uri_str(uri)
        .await
        .context("failed to parse the specified MongoDB URI")?;

    let admin = client.database("admin");
    admin
        .run_command(doc! { "ping": 1 }, None)
        .await
        .context("failed to connect to the MongoDB server")?;
    let build_info: BuildInfo = from_document(
        admin
            .run_command(doc! { "buildInfo": 1 }, None)
            .await
            .context("failed to retrieve the server build info")?,
    )?;
    match build_info.major_version() {
        Some(major_version) if major_version >= MIN_MAJOR_VERSION => {}
        _ => bail!(
            "MongoDB {} does not support time-series collections, {}.0+ is required",
            build_info.version,
            MIN_MAJOR_VERSION,
        ),
    }

    info!(version = build_info.version.as_str(), "connected");
    Ok(MongoAdmin {
        database: client.database(database_name),
    })
}

impl MongoAdmin {
    async fn first_batch<T: serde::de::DeserializeOwned>(&self, command: Document) -> Result<Vec<T>> {
        let response = self.database.run_command(command, None).await?;
        Ok(from_document::<CursorResponse<T>>(response)?.cursor.first_batch)
    }
}

#[async_trait]
impl Admin for MongoAdmin {
    #[instrument(skip_all, fields(user = user.name.as_str()))]
    async fn create_user(&self, user: &UserSpec) -> Result<Outcome> {
        let command = doc! {
            "createUser": user.name.as_str(),
            "pwd": user.password.expose(),
            "roles": [{ "role": user.role.as_str(), "db": self.database.name() }],
        };
        match self.database.run_command(command, None).await {
            Ok(_) => Ok(Outcome::Created),
            Err(error) if errors::is_user_already_exists(&error) => Ok(Outcome::AlreadyExists),
            Err(error) => Err(error).context("`createUser` failed"),
        }
    }

    #[instrument(skip_all, fields(collection = collection.name.as_str()))]
    async fn create_collection(&self, collection: &CollectionSpec) -> Result<Outcome> {
        let options = collection.timeseries.as_ref().map(|timeseries| {
            let timeseries = TimeseriesOptions::builder()
                .time_field(timeseries.time_field.clone())
                .meta_field(Some(timeseries.meta_field.clone()))
                .granularity(Some(TimeseriesGranularity::from(timeseries.granularity)))
                .build();
            CreateCollectionOptions::builder()
                .timeseries(timeseries)
                .build()
        });
        match self
            .database
            .create_collection(&collection.name, options)
            .await
        {
            Ok(_) => Ok(Outcome::Created),
            Err(error) if errors::is_namespace_exists(&error) => Ok(Outcome::AlreadyExists),
            Err(error) => Err(error).context("`create` failed"),
        }
    }

    #[instrument(skip_all, fields(collection = collection, index = %index.name()))]
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<Outcome> {
        let existing = self.indexes(collection).await?;
        if existing
            .iter()
            .any(|info| index.matches(&info.keys, info.unique))
        {
            return Ok(Outcome::AlreadyExists);
        }

        let options = index
            .unique
            .then(|| IndexOptions::builder().unique(true).build());
        let model = IndexModel::builder()
            .keys(index.keys.clone())
            .options(options)
            .build();
        self.database
            .collection::<Document>(collection)
            .create_index(model, None)
            .await
            .context("`createIndexes` failed")?;
        Ok(Outcome::Created)
    }

    async fn user_roles(&self, username: &str) -> Result<Option<Vec<Role>>> {
        let response = self
            .database
            .run_command(doc! { "usersInfo": username }, None)
            .await
            .context("`usersInfo` failed")?;
        let users_info: UsersInfo = from_document(response)?;
        Ok(users_info
            .users
            .into_iter()
            .find(|user| user.user == username)
            .map(|user| user.roles))
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let infos = self
            .first_batch::<CollectionInfo>(doc! { "listCollections": 1, "filter": { "name": name } })
            .await
            .context("`listCollections` failed")?;
        Ok(infos.into_iter().next())
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        let names = self
            .database
            .list_collection_names(None)
            .await
            .context("failed to list the collections")?;
        Ok(names
            .into_iter()
            .filter(|name| !name.starts_with("system."))
            .collect())
    }

    async fn indexes(&self, collection: &str) -> Result<Vec<IndexInfo>> {
        match self.database.run_command(doc! { "listIndexes": collection }, None).await {
            Ok(response) => Ok(from_document::<CursorResponse<IndexInfo>>(response)?
                .cursor
                .first_batch),
            Err(error) if errors::is_namespace_not_found(&error) => Ok(Vec::new()),
            Err(error) => {
                Err(error).with_context(|| format!("failed to list the indexes of `{}`", collection))
            }
        }
    }

    async fn explain_find(
        &self,
        collection: &str,
        filter: Document,
        sort: Document,
    ) -> Result<Document> {
        let command = doc! {
            "explain": { "find": collection, "filter": filter, "sort": sort },
            "verbosity": "queryPlanner",
        };
        self.database
            .run_command(command, None)
            .await
            .with_context(|| format!("failed to explain the query on `{}`", collection))
    }
}
