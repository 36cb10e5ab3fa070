use std::str::FromStr;

use crate::middleware::rbac::ApproverAllowList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process map; state is lost on restart.
    Memory,
    Redis,
    /// No store at all: decisions are validated and echoed, never kept.
    None,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            "none" => Ok(StoreBackend::None),
            other => anyhow::bail!("unknown RELAY_STORE '{}', expected memory|redis|none", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreBackend,
    pub redis_url: String,
    /// Key prefix for the status relay's namespace.
    pub status_prefix: String,
    /// Key prefix for the approval ledger's namespace.
    pub approvals_prefix: String,
    /// Bearer secret the backup agent must present. Unset = pushes rejected.
    pub agent_secret: Option<String>,
    /// Emails allowed to record decisions (RELAY_APPROVERS, comma-separated).
    pub approvers: ApproverAllowList,
    pub access_jwt_secret: Option<String>,
    pub access_jwt_public_key: Option<String>,
    pub access_issuer: Option<String>,
    pub access_audience: Option<String>,
    /// Development only: take the approver email from this header as-is.
    pub trusted_email_header: Option<String>,
    pub production: bool,
}

impl Config {
    /// Refuses backends whose state lives only inside this process.
    pub fn require_shared_store(&self) -> anyhow::Result<()> {
        if self.store != StoreBackend::Redis {
            anyhow::bail!(
                "this command needs RELAY_STORE=redis; the {:?} store is private to this process",
                self.store
            );
        }
        Ok(())
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a Config from any key lookup; `load` passes the process env.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let production = get("RELAY_ENV")
        .or_else(|| get("RUST_ENV"))
        .map(|v| v == "production")
        .unwrap_or(false);

    let store = match get("RELAY_STORE") {
        Some(v) => v.parse()?,
        None => StoreBackend::Memory,
    };

    let cfg = Config {
        port: get("RELAY_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8787),
        store,
        redis_url: get("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
        status_prefix: get("RELAY_STATUS_PREFIX").unwrap_or_else(|| "status:".into()),
        approvals_prefix: get("RELAY_APPROVALS_PREFIX").unwrap_or_else(|| "approvals:".into()),
        agent_secret: get("RELAY_AGENT_SECRET"),
        approvers: ApproverAllowList::from_csv(&get("RELAY_APPROVERS").unwrap_or_default()),
        access_jwt_secret: get("RELAY_ACCESS_JWT_SECRET"),
        access_jwt_public_key: get("RELAY_ACCESS_JWT_PUBLIC_KEY"),
        access_issuer: get("RELAY_ACCESS_ISSUER"),
        access_audience: get("RELAY_ACCESS_AUDIENCE"),
        trusted_email_header: get("RELAY_TRUSTED_EMAIL_HEADER"),
        production,
    };

    if cfg.production {
        if cfg.store != StoreBackend::Redis {
            anyhow::bail!("RELAY_STORE must be 'redis' in production; state would not survive a restart");
        }
        if cfg.trusted_email_header.is_some() {
            anyhow::bail!("RELAY_TRUSTED_EMAIL_HEADER is a development setting and is refused in production");
        }
    }
    if cfg.agent_secret.is_none() {
        tracing::warn!("RELAY_AGENT_SECRET is not set, every status push will be rejected");
    }
    if cfg.approvers.is_empty() {
        tracing::warn!("RELAY_APPROVERS is empty, every decision will be forbidden");
    }

    Ok(cfg)
}
