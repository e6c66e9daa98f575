//! CLI options.

use clap::{Args, Parser};

use crate::prelude::*;
use crate::provisioner::Mode;
use crate::schema::Granularity;

mod parsers;

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Opts {
    /// Sentry DSN
    #[arg(long, env = "FIRES_BOOTSTRAP_SENTRY_DSN")]
    pub sentry_dsn: Option<String>,

    /// Performance traces sample rate for Sentry
    #[arg(
        long,
        default_value = "0",
        env = "FIRES_BOOTSTRAP_TRACES_SAMPLE_RATE",
        value_parser = parsers::sample_rate,
    )]
    pub traces_sample_rate: f32,

    #[command(flatten)]
    pub connection: ConnectionOpts,

    #[command(flatten)]
    pub schema: SchemaOpts,

    /// How to treat the objects which already exist
    #[arg(long, value_enum, default_value = "idempotent", env = "FIRES_BOOTSTRAP_MODE")]
    pub mode: Mode,

    /// Timeout of every single administrative call
    #[arg(
        long,
        default_value = "30s",
        env = "FIRES_BOOTSTRAP_STEP_TIMEOUT",
        value_parser = humantime::parse_duration,
    )]
    pub step_timeout: StdDuration,

    #[command(subcommand)]
    pub subcommand: Option<Subcommand>,
}

#[derive(clap::Subcommand, Clone, Copy, PartialEq, Eq)]
pub enum Subcommand {
    /// Creates the user, the collections and the indexes (default)
    Provision,

    /// Checks the database against the expected layout without changing anything
    Verify,
}

#[derive(Args)]
pub struct ConnectionOpts {
    /// MongoDB URI with the administrative privileges
    #[arg(
        long,
        default_value = "mongodb://localhost:27017",
        env = "FIRES_BOOTSTRAP_MONGODB_URI",
        hide_env_values = true
    )]
    pub uri: String,
}

#[derive(Args)]
pub struct SchemaOpts {
    /// Application database name
    #[arg(long, default_value = "fires", env = "FIRES_DATABASE", value_parser = parsers::non_empty)]
    pub database: String,

    /// Application user name
    #[arg(long, default_value = "etl_user", env = "FIRES_ETL_USER", value_parser = parsers::non_empty)]
    pub user: String,

    /// Application user password
    #[arg(
        long,
        default_value = "etl_pass",
        env = "FIRES_ETL_PASSWORD",
        hide_env_values = true,
        hide_default_value = true,
        value_parser = parsers::non_empty,
    )]
    pub password: String,

    /// Granularity of the time-series collections
    #[arg(long, value_enum, default_value = "hours", env = "FIRES_GRANULARITY")]
    pub granularity: Granularity,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_ok() {
        Opts::command().debug_assert();
    }

    #[test]
    fn defaults_ok() -> Result {
        let opts = Opts::try_parse_from(["fires-bootstrap"])?;
        assert!(opts.subcommand.is_none());
        assert_eq!(opts.mode, Mode::Idempotent);
        assert_eq!(opts.step_timeout, StdDuration::from_secs(30));
        assert_eq!(opts.schema.database, "fires");
        assert_eq!(opts.schema.user, "etl_user");
        assert_eq!(opts.schema.granularity, Granularity::Hours);
        Ok(())
    }

    #[test]
    fn verify_strict_ok() -> Result {
        let opts = Opts::try_parse_from([
            "fires-bootstrap",
            "--mode",
            "strict",
            "--step-timeout",
            "1m",
            "--granularity",
            "minutes",
            "verify",
        ])?;
        assert!(matches!(opts.subcommand, Some(Subcommand::Verify)));
        assert_eq!(opts.mode, Mode::Strict);
        assert_eq!(opts.step_timeout, StdDuration::from_secs(60));
        assert_eq!(opts.schema.granularity, Granularity::Minutes);
        Ok(())
    }

    #[test]
    fn empty_database_name_fails() {
        assert!(Opts::try_parse_from(["fires-bootstrap", "--database", ""]).is_err());
    }
}
