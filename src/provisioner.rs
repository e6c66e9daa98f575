//! Ordered provisioning of the application database.

use std::fmt::{self, Display, Formatter};

use clap::ValueEnum;
use itertools::Itertools;
use tokio::time::timeout;

use crate::database::{Admin, Outcome};
use crate::helpers::tracing::format_elapsed;
use crate::opts::Opts;
use crate::prelude::*;
use crate::schema::{CollectionSpec, IndexSpec, Schema, UserSpec};

/// How to treat the objects which already exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Already existing objects are skipped.
    Idempotent,

    /// Any already existing object aborts the run.
    Strict,
}

pub enum Step<'a> {
    CreateUser(&'a UserSpec),
    CreateCollection(&'a CollectionSpec),
    CreateIndex {
        collection: &'a str,
        index: &'a IndexSpec,
    },
}

impl Display for Step<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateUser(user) => write!(formatter, "create user `{}`", user.name),
            Self::CreateCollection(collection) => {
                write!(formatter, "create collection `{}`", collection.name)
            }
            Self::CreateIndex { collection, index } => {
                write!(formatter, "create index `{}` on `{}`", index.name(), collection)
            }
        }
    }
}

impl Step<'_> {
    async fn execute<A: Admin + ?Sized>(&self, admin: &A) -> Result<Outcome> {
        match *self {
            Self::CreateUser(user) => admin.create_user(user).await,
            Self::CreateCollection(collection) => admin.create_collection(collection).await,
            Self::CreateIndex { collection, index } => admin.create_index(collection, index).await,
        }
    }

    /// Fails unless the already existing object is the one this step would have created.
    async fn check_existing<A: Admin + ?Sized>(&self, admin: &A, database: &str) -> Result {
        match *self {
            Self::CreateUser(user) => {
                let roles = admin.user_roles(&user.name).await?.unwrap_or_default();
                if !user.has_only_role(&roles, database) {
                    bail!(
                        "user `{}` exists with roles [{}], expected exactly `{}@{}`",
                        user.name,
                        roles.iter().join(", "),
                        user.role,
                        database,
                    );
                }
            }
            Self::CreateCollection(collection) => {
                let info = admin
                    .collection_info(&collection.name)
                    .await?
                    .ok_or_else(|| anyhow!("collection `{}` is not listed", collection.name))?;
                match (&collection.timeseries, info.timeseries()) {
                    (Some(expected), Some(actual)) if !expected.matches(actual) => bail!(
                        "collection `{}` exists as time-series on {}, expected {}",
                        collection.name,
                        actual,
                        expected,
                    ),
                    (Some(_), None) => bail!(
                        "collection `{}` exists but is not a time-series collection",
                        collection.name,
                    ),
                    (None, Some(_)) => bail!(
                        "collection `{}` exists but is a time-series collection",
                        collection.name,
                    ),
                    _ => {}
                }
            }
            // Indexes are matched by the keys and uniqueness before creating them.
            Self::CreateIndex { .. } => {}
        }
        Ok(())
    }
}

/// Lists the steps: the user first, then the collections, then their indexes.
pub fn plan(schema: &Schema) -> Vec<Step<'_>> {
    let collections = schema.collections.iter().map(Step::CreateCollection);
    let indexes = schema.collections.iter().flat_map(|collection| {
        collection.indexes.iter().map(move |index| Step::CreateIndex {
            collection: &collection.name,
            index,
        })
    });
    std::iter::once(Step::CreateUser(&schema.user))
        .chain(collections)
        .chain(indexes)
        .collect()
}

#[derive(Default, Debug)]
pub struct Report {
    /// Step description and its outcome, in the execution order.
    pub steps: Vec<(String, Outcome)>,
}

impl Report {
    pub fn n_created(&self) -> usize {
        self.count(Outcome::Created)
    }

    pub fn n_existing(&self) -> usize {
        self.count(Outcome::AlreadyExists)
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.steps
            .iter()
            .filter(|(_, step_outcome)| *step_outcome == outcome)
            .count()
    }
}

/// Executes the steps one by one, stopping at the first failure.
#[instrument(skip_all, fields(database = schema.database.as_str(), ?mode))]
pub async fn provision<A: Admin + ?Sized>(
    admin: &A,
    schema: &Schema,
    mode: Mode,
    step_timeout: StdDuration,
) -> Result<Report> {
    let mut report = Report::default();
    for step in plan(schema) {
        debug!(%step, "executing…");
        let outcome = timeout(step_timeout, step.execute(admin))
            .await
            .with_context(|| format!("timed out to {}", step))?
            .with_context(|| format!("failed to {}", step))?;
        match (outcome, mode) {
            (Outcome::Created, _) => info!(%step, "done"),
            (Outcome::AlreadyExists, Mode::Idempotent) => {
                timeout(step_timeout, step.check_existing(admin, &schema.database))
                    .await
                    .with_context(|| format!("timed out to {}", step))?
                    .with_context(|| format!("failed to {}", step))?;
                info!(%step, "already exists, skipped");
            }
            (Outcome::AlreadyExists, Mode::Strict) => {
                bail!("failed to {}: already exists", step);
            }
        }
        report.steps.push((step.to_string(), outcome));
    }
    Ok(report)
}

/// Connects and provisions the database.
pub async fn run(opts: Opts) -> Result {
    let start_instant = Instant::now();
    let schema = Schema::from(opts.schema);
    let admin = crate::database::mongodb::open(&opts.connection.uri, &schema.database).await?;
    let report = provision(&admin, &schema, opts.mode, opts.step_timeout).await?;
    info!(
        database = schema.database.as_str(),
        user = schema.user.name.as_str(),
        n_collections = schema.collections.len(),
        n_indexes = schema.n_indexes(),
        n_created = report.n_created(),
        n_existing = report.n_existing(),
        elapsed = format_elapsed(start_instant).as_str(),
        "bootstrap completed: database, user and collections are ready",
    );
    Ok(())
}
