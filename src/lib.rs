//! Backup approval relay — library crate.
//!
//! Two components share one process:
//! - [`relay::StatusRelay`] stores the backup agent's latest status snapshot
//!   and seeds the pending queue from the first one.
//! - [`ledger::ApprovalLedger`] owns the pending queue and the bounded
//!   decision history that human approvers act on.
//!
//! Both sit on a [`store::KvStore`] with no multi-key transactions; see
//! [`store::cell`] for how sequence updates avoid lost writes.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod relay;
pub mod store;

use std::sync::Arc;

use config::{Config, StoreBackend};
use ledger::ApprovalLedger;
use middleware::identity::{AgentSecret, DenyAll, IdentityResolver, TrustedHeaderResolver};
use middleware::oidc::AccessTokenResolver;
use middleware::rbac::ApproverAllowList;
use relay::StatusRelay;
use store::{KvStore, MemoryStore, RedisStore};

/// Shared application state passed to handlers.
pub struct AppState {
    pub relay: StatusRelay,
    pub ledger: Arc<ApprovalLedger>,
    pub agent_auth: Arc<dyn IdentityResolver>,
    pub approver_auth: Arc<dyn IdentityResolver>,
}

/// Store handles for the two namespaces: (status, approvals).
pub type StoreHandles = (Option<Arc<dyn KvStore>>, Option<Arc<dyn KvStore>>);

pub async fn open_stores(cfg: &Config) -> anyhow::Result<StoreHandles> {
    match cfg.store {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory store (state is lost on restart)");
            let status: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
            let approvals: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
            Ok((Some(status), Some(approvals)))
        }
        StoreBackend::Redis => {
            tracing::info!("Connecting to Redis...");
            let redis = RedisStore::connect(&cfg.redis_url, cfg.status_prefix.clone()).await?;
            let approvals: Arc<dyn KvStore> =
                Arc::new(redis.with_prefix(cfg.approvals_prefix.clone()));
            let status: Arc<dyn KvStore> = Arc::new(redis);
            Ok((Some(status), Some(approvals)))
        }
        StoreBackend::None => {
            tracing::warn!("No store configured, running in best-effort mode");
            Ok((None, None))
        }
    }
}

/// Pick the approver identity source from configuration.
/// Signed tokens win over the trusted header; with neither, nobody gets in.
pub fn approver_resolver(cfg: &Config) -> anyhow::Result<Arc<dyn IdentityResolver>> {
    let issuer = cfg.access_issuer.as_deref();
    let audience = cfg.access_audience.as_deref();

    if let Some(pem) = cfg.access_jwt_public_key.as_deref() {
        return Ok(Arc::new(AccessTokenResolver::rs256_pem(pem, issuer, audience)?));
    }
    if let Some(secret) = cfg.access_jwt_secret.as_deref() {
        return Ok(Arc::new(AccessTokenResolver::hs256(secret, issuer, audience)));
    }
    if let Some(header) = cfg.trusted_email_header.as_deref() {
        tracing::warn!(header = %header, "approver identity taken from a trusted header");
        return Ok(Arc::new(TrustedHeaderResolver::new(header)?));
    }
    tracing::warn!("no approver identity source configured, approval endpoints will reject all callers");
    Ok(Arc::new(DenyAll))
}

impl AppState {
    /// Wire components from explicit dependencies.
    pub fn new(
        stores: StoreHandles,
        approvers: ApproverAllowList,
        agent_auth: Arc<dyn IdentityResolver>,
        approver_auth: Arc<dyn IdentityResolver>,
    ) -> Self {
        let (status_store, approvals_store) = stores;
        let ledger = Arc::new(ApprovalLedger::new(approvals_store, approvers));
        let relay = StatusRelay::new(status_store, ledger.clone());
        Self {
            relay,
            ledger,
            agent_auth,
            approver_auth,
        }
    }

    pub async fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let stores = open_stores(cfg).await?;
        Ok(Self::new(
            stores,
            cfg.approvers.clone(),
            Arc::new(AgentSecret::new(cfg.agent_secret.clone())),
            approver_resolver(cfg)?,
        ))
    }
}
