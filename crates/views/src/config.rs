//! Process configuration, read from the environment at cold start.
use clap::Parser;

use crate::{Error, Result};

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(author, version, about)]
pub struct Config {
    /// Name of the DynamoDB table holding the counter record.
    #[arg(long, env = "TABLE_NAME", value_parser = clap::builder::NonEmptyStringValueParser::new())]
    pub table_name: String,

    /// Use strongly consistent reads when fetching the counter.
    #[arg(
        long,
        env = "CONSISTENT_READ",
        default_value_t = false,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new(),
    )]
    pub consistent_read: bool,
}

impl Config {
    /// Reads the configuration from environment variables only.
    ///
    /// Lambda passes no arguments, so this ignores the process arguments.
    pub fn from_env() -> Result<Self> {
        Self::from_args([clap::crate_name!()])
    }

    /// Parses the configuration from `args`, falling back to environment
    /// variables for anything not given.
    pub fn from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::try_parse_from(args).map_err(|e| Error::Config {
            msg: e.render().to_string(),
        })?;
        log::debug!("{config:?}");
        Ok(config)
    }
}
