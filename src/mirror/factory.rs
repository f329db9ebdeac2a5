//! Wiring of a mirror stage from configuration

use crate::config::{Config, ConfigManager, NodeRole};
use crate::error::{MirrorError, MirrorResult};
use crate::mirror::stage::{MirrorStage, StageSettings};
use crate::resolver::FileEntryResolver;
use crate::serials::SerialTable;
use crate::store::{MemoryStore, TransactionStore};
use crate::upstream::{HttpFetch, SimpleIndexProxy, UreqFetcher};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Create the stage described by `config`
///
/// Loads the serial snapshot, seeding it from upstream on first start.
/// Only a master can be created here: its store is a fresh in-process
/// [`MemoryStore`]. A replica needs a store fed by the master's
/// replication stream and must be built with [`create_stage_with`].
pub async fn create_stage(config: &Config) -> MirrorResult<MirrorStage> {
    if config.mirror.role == NodeRole::Replica {
        config.mirror.simple_index_url()?;
        return Err(MirrorError::ConfigInvalid {
            path: PathBuf::from("mirror.role"),
            reason: "a replica needs a replicated transaction store, which this \
                     command does not have; use a master configuration"
                .to_string(),
        });
    }
    let http: Arc<dyn HttpFetch> = Arc::new(UreqFetcher::new(config.mirror.request_timeout()));
    create_stage_with(config, http, Arc::new(MemoryStore::new())).await
}

/// Create the stage described by `config` on top of `http` and `store`
///
/// On a replica, `store` must receive the master's commits, or lookups
/// of changed pages wait for a serial that never arrives.
pub async fn create_stage_with(
    config: &Config,
    http: Arc<dyn HttpFetch>,
    store: Arc<dyn TransactionStore>,
) -> MirrorResult<MirrorStage> {
    let settings = StageSettings {
        role: config.mirror.role,
        simple_url: config.mirror.simple_index_url()?,
        cache_expiry: config.mirror.cache_expiry(),
        replica_wait_timeout: config.mirror.replica_wait_timeout(),
    };
    info!(
        "starting {} stage on {}",
        settings.role, settings.simple_url
    );

    let serials = SerialTable::load(ConfigManager::serials_path(config)).await?;
    let proxy = SimpleIndexProxy::new(settings.simple_url.clone(), Arc::clone(&http));
    serials
        .bootstrap_if_empty(&proxy, store.as_ref(), settings.role)
        .await?;

    Ok(MirrorStage::new(
        settings,
        http,
        store,
        Arc::new(FileEntryResolver),
        Arc::new(serials),
    ))
}
