//! Command-line argument dispatch.
//!
//! Parses validated CLI arguments and maps them to the appropriate action.

use anyhow::{Context, Result};
use secrecy::SecretString;

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DSN, ARG_KEYED_HASH_KEY, ARG_OTP_TTL_MINUTES, rp};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let keyed_hash_key = matches
        .get_one::<String>(ARG_KEYED_HASH_KEY)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --keyed-hash-key")?;
    let otp_ttl_minutes = matches
        .get_one::<i64>(ARG_OTP_TTL_MINUTES)
        .copied()
        .unwrap_or(15);

    let rp_opts = rp::Options::parse(matches)?;

    Ok(Action::Server(Args {
        dsn,
        keyed_hash_key,
        otp_ttl_minutes,
        rp_id: rp_opts.id,
        rp_name: rp_opts.name,
        rp_origin: rp_opts.origin,
    }))
}
