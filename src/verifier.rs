//! Read-only check of a provisioned database.

use itertools::Itertools;
use mongodb::bson::{doc, Bson, Document};

use crate::database::{Admin, CollectionInfo};
use crate::opts::Opts;
use crate::prelude::*;
use crate::schema::{CollectionSpec, IndexSpec, Schema};

#[derive(Default, Debug)]
pub struct Findings {
    /// Deviations from the schema.
    pub problems: Vec<String>,

    /// Extra objects which do not contradict the schema.
    pub warnings: Vec<String>,
}

impl Findings {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

#[instrument(skip_all, fields(database = schema.database.as_str()))]
pub async fn verify<A: Admin + ?Sized>(admin: &A, schema: &Schema) -> Result<Findings> {
    let mut findings = Findings::default();

    match admin.user_roles(&schema.user.name).await? {
        None => findings
            .problems
            .push(format!("user `{}` does not exist", schema.user.name)),
        Some(roles) if !schema.user.has_only_role(&roles, &schema.database) => {
            findings.problems.push(format!(
                "user `{}` has roles [{}], expected exactly `{}@{}`",
                schema.user.name,
                roles.iter().join(", "),
                schema.user.role,
                schema.database,
            ))
        }
        Some(_) => {}
    }

    for collection in &schema.collections {
        match admin.collection_info(&collection.name).await? {
            Some(info) => {
                check_timeseries(collection, &info, &mut findings);
                check_indexes(admin, collection, &mut findings).await?;
            }
            None => findings
                .problems
                .push(format!("collection `{}` does not exist", collection.name)),
        }
    }

    for name in admin.collection_names().await? {
        if schema.collection(&name).is_none() {
            findings
                .warnings
                .push(format!("unexpected collection `{}`", name));
        }
    }

    Ok(findings)
}

fn check_timeseries(collection: &CollectionSpec, info: &CollectionInfo, findings: &mut Findings) {
    match (&collection.timeseries, info.timeseries()) {
        (Some(expected), Some(actual)) if !expected.matches(actual) => {
            findings.problems.push(format!(
                "collection `{}` is time-series on {}, expected {}",
                collection.name, actual, expected,
            ))
        }
        (Some(_), None) => findings
            .problems
            .push(format!("collection `{}` is not a time-series collection", collection.name)),
        (None, Some(_)) => findings
            .problems
            .push(format!("collection `{}` is unexpectedly a time-series collection", collection.name)),
        _ => {}
    }
}

async fn check_indexes<A: Admin + ?Sized>(
    admin: &A,
    collection: &CollectionSpec,
    findings: &mut Findings,
) -> Result {
    let existing = admin.indexes(&collection.name).await?;

    for index in &collection.indexes {
        if !existing.iter().any(|info| index.matches(&info.keys, info.unique)) {
            findings.problems.push(format!(
                "index `{}` is missing on `{}`",
                index.name(),
                collection.name,
            ));
        } else if index.is_compound() {
            let (filter, sort) = sample_query(index);
            let explanation = admin.explain_find(&collection.name, filter, sort).await?;
            let stages = winning_stages(&explanation);
            debug!(collection = collection.name.as_str(), index = %index.name(), ?stages);
            if !stages.iter().any(|stage| stage == "IXSCAN")
                || stages.iter().any(|stage| stage == "COLLSCAN")
            {
                findings.problems.push(format!(
                    "queries on `{}` are not served by `{}`: [{}]",
                    collection.name,
                    index.name(),
                    stages.join(", "),
                ));
            }
        }
    }

    for info in &existing {
        if info.name != "_id_"
            && !collection
                .indexes
                .iter()
                .any(|index| index.matches(&info.keys, info.unique))
        {
            findings.warnings.push(format!(
                "unexpected index `{}` on `{}`",
                info.name, collection.name,
            ));
        }
    }

    Ok(())
}

/// Equality on the leading key and the sort on the rest, the pattern a compound index serves.
fn sample_query(index: &IndexSpec) -> (Document, Document) {
    let mut keys = index.keys.iter();
    let filter = keys
        .next()
        .map(|(field, _)| doc! { field: Bson::Null })
        .unwrap_or_default();
    let sort = keys
        .map(|(field, direction)| (field.clone(), direction.clone()))
        .collect();
    (filter, sort)
}

/// Collects the stage names of the winning plans, wherever the explain output nests them.
fn winning_stages(explanation: &Document) -> Vec<String> {
    fn collect_plans(document: &Document, stages: &mut Vec<String>) {
        for (key, value) in document {
            if key == "winningPlan" {
                collect_stages(value, stages);
            } else {
                walk(value, &mut |document| collect_plans(document, stages));
            }
        }
    }

    fn collect_stages(value: &Bson, stages: &mut Vec<String>) {
        walk(value, &mut |document| {
            if let Ok(stage) = document.get_str("stage") {
                stages.push(stage.to_string());
            }
            for (_, value) in document {
                collect_stages(value, stages);
            }
        });
    }

    fn walk(value: &Bson, visit: &mut dyn FnMut(&Document)) {
        match value {
            Bson::Document(document) => visit(document),
            Bson::Array(array) => {
                for item in array {
                    walk(item, visit);
                }
            }
            _ => {}
        }
    }

    let mut stages = Vec::new();
    collect_plans(explanation, &mut stages);
    stages
}

/// Connects and verifies the database, failing on any problem.
pub async fn run(opts: Opts) -> Result {
    let schema = Schema::from(opts.schema);
    let admin = crate::database::mongodb::open(&opts.connection.uri, &schema.database).await?;
    let findings = verify(&admin, &schema).await?;
    for warning in &findings.warnings {
        warn!("{}", warning);
    }
    for problem in &findings.problems {
        error!("{}", problem);
    }
    if !findings.is_ok() {
        bail!("verification failed with {} problem(s)", findings.problems.len());
    }
    info!(database = schema.database.as_str(), "the database matches the schema");
    Ok(())
}
