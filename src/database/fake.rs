//! In-memory stand-in for the server, mimicking its administrative behaviour.

use std::collections::BTreeMap;
use std::sync::Mutex;

use mongodb::bson::{doc, Document};

use crate::database::mongodb::models::CollectionOptions;
use crate::database::{Admin, CollectionInfo, IndexInfo, Outcome, Role, TimeseriesInfo};
use crate::prelude::*;
use crate::schema::{CollectionSpec, IndexSpec, UserSpec};

#[derive(Default)]
pub struct FakeAdmin {
    database: String,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    users: BTreeMap<String, Vec<Role>>,
    collections: BTreeMap<String, FakeCollection>,

    /// Creation calls, in order.
    calls: Vec<String>,

    /// Object name to fail the creation of.
    fail_on: Option<String>,
}

#[derive(Clone)]
struct FakeCollection {
    timeseries: Option<TimeseriesInfo>,
    indexes: Vec<IndexInfo>,
}

impl FakeCollection {
    fn plain() -> Self {
        Self {
            timeseries: None,
            indexes: vec![IndexInfo {
                name: "_id_".to_string(),
                keys: doc! { "_id": 1 },
                unique: false,
            }],
        }
    }
}

impl FakeAdmin {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            ..Default::default()
        }
    }

    pub fn fail_on(self, name: &str) -> Self {
        self.state.lock().unwrap().fail_on = Some(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn n_collections(&self) -> usize {
        self.state.lock().unwrap().collections.len()
    }

    pub fn n_user_indexes(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .collections
            .values()
            .flat_map(|collection| collection.indexes.iter())
            .filter(|index| index.name != "_id_")
            .count()
    }

    pub fn set_roles(&self, username: &str, roles: Vec<Role>) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(username.to_string(), roles);
    }

    pub fn set_timeseries(&self, collection: &str, timeseries: Option<TimeseriesInfo>) {
        if let Some(collection) = self.state.lock().unwrap().collections.get_mut(collection) {
            collection.timeseries = timeseries;
        }
    }

    pub fn drop_index(&self, collection: &str, name: &str) {
        if let Some(collection) = self.state.lock().unwrap().collections.get_mut(collection) {
            collection.indexes.retain(|index| index.name != name);
        }
    }

    pub fn add_index(&self, collection: &str, index: IndexInfo) {
        if let Some(collection) = self.state.lock().unwrap().collections.get_mut(collection) {
            collection.indexes.push(index);
        }
    }

    pub fn add_collection(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .collections
            .insert(name.to_string(), FakeCollection::plain());
    }

    fn record(&self, state: &mut State, call: String, name: &str) -> Result {
        state.calls.push(call);
        match state.fail_on {
            Some(ref fail_on) if fail_on == name => Err(anyhow!("injected failure on `{}`", name)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Admin for FakeAdmin {
    async fn create_user(&self, user: &UserSpec) -> Result<Outcome> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("createUser {}", user.name), &user.name)?;
        if state.users.contains_key(&user.name) {
            return Ok(Outcome::AlreadyExists);
        }
        let roles = vec![Role {
            role: user.role.clone(),
            db: self.database.clone(),
        }];
        state.users.insert(user.name.clone(), roles);
        Ok(Outcome::Created)
    }

    async fn create_collection(&self, collection: &CollectionSpec) -> Result<Outcome> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, format!("create {}", collection.name), &collection.name)?;
        if state.collections.contains_key(&collection.name) {
            return Ok(Outcome::AlreadyExists);
        }
        let created = match collection.timeseries {
            Some(ref timeseries) => FakeCollection {
                timeseries: Some(TimeseriesInfo {
                    time_field: timeseries.time_field.clone(),
                    meta_field: Some(timeseries.meta_field.clone()),
                    granularity: Some(timeseries.granularity.as_str().to_string()),
                }),
                indexes: Vec::new(),
            },
            None => FakeCollection::plain(),
        };
        state.collections.insert(collection.name.clone(), created);
        Ok(Outcome::Created)
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<Outcome> {
        let mut state = self.state.lock().unwrap();
        let name = index.name();
        self.record(&mut state, format!("createIndex {}.{}", collection, name), &name)?;
        let indexes = &mut state
            .collections
            .entry(collection.to_string())
            .or_insert_with(FakeCollection::plain)
            .indexes;
        if indexes.iter().any(|info| index.matches(&info.keys, info.unique)) {
            return Ok(Outcome::AlreadyExists);
        }
        if indexes.iter().any(|info| info.name == name) {
            bail!("index `{}` already exists with different options", name);
        }
        indexes.push(IndexInfo {
            name,
            keys: index.keys.clone(),
            unique: index.unique,
        });
        Ok(Outcome::Created)
    }

    async fn user_roles(&self, username: &str) -> Result<Option<Vec<Role>>> {
        Ok(self.state.lock().unwrap().users.get(username).cloned())
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state.collections.get(name).map(|collection| CollectionInfo {
            name: name.to_string(),
            kind: (if collection.timeseries.is_some() { "timeseries" } else { "collection" })
                .to_string(),
            options: CollectionOptions {
                timeseries: collection.timeseries.clone(),
            },
        }))
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().collections.keys().cloned().collect())
    }

    async fn indexes(&self, collection: &str) -> Result<Vec<IndexInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .collections
            .get(collection)
            .map(|collection| collection.indexes.clone())
            .unwrap_or_default())
    }

    /// Plans an index scan when an index is prefixed by the filter and the sort keys.
    async fn explain_find(
        &self,
        collection: &str,
        filter: Document,
        sort: Document,
    ) -> Result<Document> {
        let state = self.state.lock().unwrap();
        let wanted = filter.keys().chain(sort.keys()).collect::<Vec<_>>();
        let is_covered = state.collections.get(collection).map_or(false, |collection| {
            collection
                .indexes
                .iter()
                .any(|index| index.keys.keys().take(wanted.len()).eq(wanted.iter().copied()))
        });
        let winning_plan = if is_covered {
            doc! { "stage": "FETCH", "inputStage": { "stage": "IXSCAN" } }
        } else {
            doc! { "stage": "SORT", "inputStage": { "stage": "COLLSCAN" } }
        };
        Ok(doc! { "queryPlanner": { "winningPlan": winning_plan }, "ok": 1.0 })
    }
}
