pub mod mongodb;

#[cfg(test)]
pub mod fake;

pub use self::mongodb::models::{CollectionInfo, IndexInfo, Role, TimeseriesInfo};
pub use self::mongodb::traits::{Admin, Outcome};
