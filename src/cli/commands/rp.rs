//! Relying-party arguments for the credential engine.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_RP_ID: &str = "rp-id";
pub const ARG_RP_NAME: &str = "rp-name";
pub const ARG_RP_ORIGIN: &str = "rp-origin";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RP_ID)
                .long("rp-id")
                .help("Relying-party id (DNS label, e.g. example.com)")
                .env("SESAMO_RP_ID")
                .required(true),
        )
        .arg(
            Arg::new(ARG_RP_NAME)
                .long("rp-name")
                .help("Relying-party display name")
                .env("SESAMO_RP_NAME")
                .required(true),
        )
        .arg(
            Arg::new(ARG_RP_ORIGIN)
                .long("rp-origin")
                .help("Expected origin for collected client data")
                .env("SESAMO_RP_ORIGIN")
                .required(true),
        )
}

#[derive(Clone, Debug)]
pub struct Options {
    pub id: String,
    pub name: String,
    pub origin: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            id: matches
                .get_one::<String>(ARG_RP_ID)
                .cloned()
                .context("missing required argument: --rp-id")?,
            name: matches
                .get_one::<String>(ARG_RP_NAME)
                .cloned()
                .context("missing required argument: --rp-name")?,
            origin: matches
                .get_one::<String>(ARG_RP_ORIGIN)
                .cloned()
                .context("missing required argument: --rp-origin")?,
        })
    }
}
