//! Server action: connect the store, wire the services, run until shutdown.
//!
//! The transport that mounts these services is deployed separately; this
//! action owns process lifecycle, migrations and dependency wiring.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::auth::{AuthConfig, AuthService};
use crate::bus::OutboxProducer;
use crate::client::ClientAuthenticator;
use crate::hasher::{KeyedHasher, MemoryHardHasher};
use crate::otp::OtpService;
use crate::session::SessionManager;
use crate::store::{PgStore, Store};
use crate::webauthn::{CredentialService, RelyingParty};

pub struct Args {
    pub dsn: String,
    pub keyed_hash_key: SecretString,
    pub otp_ttl_minutes: i64,
    pub rp_id: String,
    pub rp_name: String,
    pub rp_origin: String,
}

/// Assembled service set, shared with the transport.
pub struct Services {
    pub clients: ClientAuthenticator,
    pub auth: AuthService,
    pub sessions: SessionManager,
    pub credentials: CredentialService,
}

/// Wire the concrete services over a shared store and hasher pair.
///
/// # Errors
/// Returns an error if the keyed-hash key is malformed.
pub fn build_services(store: Arc<dyn Store>, args: &Args) -> Result<Services> {
    let keyed = KeyedHasher::from_hex(args.keyed_hash_key.expose_secret())
        .context("invalid --keyed-hash-key")?;
    let memory_hard = MemoryHardHasher::default();

    let producer = Arc::new(crate::bus::LogProducer);
    build_services_with_producer(store, args, keyed, memory_hard, producer)
}

fn build_services_with_producer(
    store: Arc<dyn Store>,
    args: &Args,
    keyed: KeyedHasher,
    memory_hard: MemoryHardHasher,
    producer: Arc<dyn crate::bus::Producer>,
) -> Result<Services> {
    let otp = OtpService::new(Arc::clone(&store), keyed, memory_hard.clone());
    let sessions = SessionManager::new(Arc::clone(&store));
    let auth = AuthService::new(
        Arc::clone(&store),
        otp,
        SessionManager::new(Arc::clone(&store)),
        producer,
        AuthConfig::default().with_otp_ttl_minutes(args.otp_ttl_minutes),
    );
    let clients = ClientAuthenticator::new(Arc::clone(&store), memory_hard);
    let credentials = CredentialService::new(
        store,
        RelyingParty {
            id: args.rp_id.clone(),
            name: args.rp_name.clone(),
            origin: args.rp_origin.clone(),
        },
    );

    Ok(Services {
        clients,
        auth,
        sessions,
        credentials,
    })
}

/// Connect, migrate, wire and park until shutdown.
///
/// # Errors
/// Returns an error if the pool cannot connect, migrations fail, or the
/// configuration is invalid.
pub async fn handle(args: Args) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&args.dsn)
        .await
        .context("failed to connect to the database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
    let keyed = KeyedHasher::from_hex(args.keyed_hash_key.expose_secret())
        .context("invalid --keyed-hash-key")?;
    let producer = Arc::new(OutboxProducer::new(pool));
    let services = build_services_with_producer(
        Arc::clone(&store),
        &args,
        keyed,
        MemoryHardHasher::default(),
        producer,
    )?;
    // Keep the service set alive for the mounting transport.
    let _services = services;

    info!(rp_id = %args.rp_id, "core services ready");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    Ok(())
}
