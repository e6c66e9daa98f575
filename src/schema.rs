//! Declarative layout of the application database: the user, the collections and their indexes.

use std::fmt::{self, Debug, Display, Formatter};

use clap::ValueEnum;
use itertools::Itertools;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::TimeseriesGranularity;

use crate::database::{Role, TimeseriesInfo};
use crate::opts::SchemaOpts;

pub const TIME_FIELD: &str = "ts";
pub const META_FIELD: &str = "meta";

pub const RAW_FIRES: &str = "raw_fires";
pub const RAW_WEATHER: &str = "raw_weather";
pub const REF_MUNICIPIOS: &str = "ref_municipios";

pub const READ_WRITE_ROLE: &str = "readWrite";

/// Expected interval between measurements sharing the same metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Granularity {
    Seconds,
    Minutes,
    Hours,
}

impl Granularity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
        }
    }
}

impl From<Granularity> for TimeseriesGranularity {
    fn from(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Seconds => Self::Seconds,
            Granularity::Minutes => Self::Minutes,
            Granularity::Hours => Self::Hours,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timeseries {
    pub time_field: String,
    pub meta_field: String,
    pub granularity: Granularity,
}

impl Timeseries {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            time_field: TIME_FIELD.to_string(),
            meta_field: META_FIELD.to_string(),
            granularity,
        }
    }

    /// Checks the configuration reported by the server.
    pub fn matches(&self, info: &TimeseriesInfo) -> bool {
        info.time_field == self.time_field
            && info.meta_field.as_deref() == Some(self.meta_field.as_str())
            && info.granularity.as_deref() == Some(self.granularity.as_str())
    }
}

impl Display for Timeseries {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "`{}` / `{}` / `{}`",
            self.time_field,
            self.meta_field,
            self.granularity.as_str(),
        )
    }
}

impl Display for TimeseriesInfo {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "`{}` / `{}` / `{}`",
            self.time_field,
            self.meta_field.as_deref().unwrap_or("-"),
            self.granularity.as_deref().unwrap_or("-"),
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndexSpec {
    /// Ordered key pattern, field to direction.
    pub keys: Document,

    pub unique: bool,
}

impl IndexSpec {
    pub fn new(keys: Document) -> Self {
        Self { keys, unique: false }
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Name the server assigns to the index by default.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, direction)| format!("{}_{}", field, format_direction(direction)))
            .join("_")
    }

    pub fn is_compound(&self) -> bool {
        self.keys.len() > 1
    }

    /// Checks an existing index against this one: same keys in the same order and
    /// the same uniqueness.
    pub fn matches(&self, keys: &Document, unique: bool) -> bool {
        self.unique == unique
            && self.keys.len() == keys.len()
            && self.keys.iter().zip(keys.iter()).all(
                |((expected_field, expected_direction), (field, direction))| {
                    expected_field == field
                        && normalize_direction(expected_direction) == normalize_direction(direction)
                },
            )
    }
}

/// Numeric directions may come back as `Int32`, `Int64` or `Double`
/// depending on the client that created the index.
fn normalize_direction(direction: &Bson) -> Bson {
    match *direction {
        Bson::Int32(value) => Bson::Int64(value.into()),
        Bson::Double(value) if value.fract() == 0.0 => Bson::Int64(value as i64),
        ref other => other.clone(),
    }
}

fn format_direction(direction: &Bson) -> String {
    match normalize_direction(direction) {
        Bson::Int64(value) => value.to_string(),
        Bson::String(value) => value,
        other => other.to_string(),
    }
}

#[derive(Clone, Debug)]
pub struct CollectionSpec {
    pub name: String,
    pub timeseries: Option<Timeseries>,
    pub indexes: Vec<IndexSpec>,
}

/// Secret that never shows up in the logs.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for Password {
    fn from(password: String) -> Self {
        Self(password)
    }
}

impl Debug for Password {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("***")
    }
}

#[derive(Clone, Debug)]
pub struct UserSpec {
    pub name: String,
    pub password: Password,

    /// Role granted on the application database, and nowhere else.
    pub role: String,
}

impl UserSpec {
    /// Checks that the user holds exactly the one role, scoped to the database.
    pub fn has_only_role(&self, roles: &[Role], database: &str) -> bool {
        matches!(roles, [role] if role.role == self.role && role.db == database)
    }
}

#[derive(Clone, Debug)]
pub struct Schema {
    pub database: String,
    pub user: UserSpec,
    pub collections: Vec<CollectionSpec>,
}

impl Schema {
    /// Builds the wildfire & weather layout.
    pub fn new(
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<Password>,
        granularity: Granularity,
    ) -> Self {
        let timeseries = Timeseries::new(granularity);
        Self {
            database: database.into(),
            user: UserSpec {
                name: username.into(),
                password: password.into(),
                role: READ_WRITE_ROLE.to_string(),
            },
            collections: vec![
                CollectionSpec {
                    name: RAW_FIRES.to_string(),
                    timeseries: Some(timeseries.clone()),
                    indexes: vec![
                        IndexSpec::new(doc! { "meta.uf": 1, TIME_FIELD: -1 }),
                        IndexSpec::new(doc! { TIME_FIELD: -1 }),
                    ],
                },
                CollectionSpec {
                    name: RAW_WEATHER.to_string(),
                    timeseries: Some(timeseries),
                    indexes: vec![
                        IndexSpec::new(doc! { "meta.municipio_ibge": 1, TIME_FIELD: -1 }),
                        IndexSpec::new(doc! { TIME_FIELD: -1 }),
                    ],
                },
                CollectionSpec {
                    name: REF_MUNICIPIOS.to_string(),
                    timeseries: None,
                    indexes: vec![IndexSpec::new(doc! { "codigo_ibge": 1 }).unique()],
                },
            ],
        }
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections
            .iter()
            .find(|collection| collection.name == name)
    }

    pub fn n_indexes(&self) -> usize {
        self.collections
            .iter()
            .map(|collection| collection.indexes.len())
            .sum()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new("fires", "etl_user", "etl_pass".to_string(), Granularity::Hours)
    }
}

impl From<SchemaOpts> for Schema {
    fn from(opts: SchemaOpts) -> Self {
        Self::new(opts.database, opts.user, opts.password, opts.granularity)
    }
}
