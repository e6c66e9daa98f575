//! Administrative command responses.

use std::fmt::{self, Display, Formatter};

use mongodb::bson::Document;
use serde::Deserialize;

/// Cursor-returning command response, such as `listCollections` or `listIndexes`.
#[derive(Deserialize, Debug)]
pub struct CursorResponse<T> {
    pub cursor: Cursor<T>,
}

#[derive(Deserialize, Debug)]
pub struct Cursor<T> {
    #[serde(rename = "firstBatch")]
    pub first_batch: Vec<T>,
}

#[derive(Deserialize, Debug)]
pub struct UsersInfo {
    #[serde(default)]
    pub users: Vec<UserInfo>,
}

#[derive(Deserialize, Debug)]
pub struct UserInfo {
    pub user: String,

    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub role: String,
    pub db: String,
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}@{}", self.role, self.db)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub name: String,

    /// `collection`, `timeseries` or `view`.
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub options: CollectionOptions,
}

impl CollectionInfo {
    pub fn timeseries(&self) -> Option<&TimeseriesInfo> {
        self.options.timeseries.as_ref()
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CollectionOptions {
    pub timeseries: Option<TimeseriesInfo>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesInfo {
    pub time_field: String,

    #[serde(default)]
    pub meta_field: Option<String>,

    #[serde(default)]
    pub granularity: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub name: String,

    #[serde(rename = "key")]
    pub keys: Document,

    #[serde(default)]
    pub unique: bool,
}

#[derive(Deserialize, Debug)]
pub struct BuildInfo {
    pub version: String,
}

impl BuildInfo {
    pub fn major_version(&self) -> Option<u32> {
        self.version.split('.').next()?.parse().ok()
    }
}
