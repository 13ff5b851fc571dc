//! Wiring shared by every command: config, Deribit client, persisted desk.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use gex_desk_core::{ConfigLoader, DeskConfig};
use gex_desk_deribit::{DeribitClient, DeribitClientConfig};
use gex_desk_options_manager::{JsonLedgerStore, PaperDesk};

pub type Desk = PaperDesk<Arc<DeribitClient>>;

pub struct DeskContext {
    pub config: DeskConfig,
    pub config_path: PathBuf,
    pub profile: Option<String>,
    pub client: Arc<DeribitClient>,
    pub desk: Desk,
}

impl DeskContext {
    pub fn build(config_path: &str, profile: Option<&str>) -> Result<Self> {
        let config = ConfigLoader::load_from_with_profile(config_path, profile).with_context(|| {
            match profile {
                Some(profile) => format!("failed to load config from {config_path} ({profile})"),
                None => format!("failed to load config from {config_path}"),
            }
        })?;

        tracing::debug!(
            config = config_path,
            profile = profile.unwrap_or("-"),
            store = %config.ledger.store_path,
            deribit = %config.deribit.base_url,
            "Loaded configuration"
        );

        let client = Arc::new(DeribitClient::new(DeribitClientConfig::from(
            &config.deribit,
        ))?);
        let store = JsonLedgerStore::new(&config.ledger.store_path);
        let desk = PaperDesk::with_store(Arc::clone(&client), &config, store)
            .with_context(|| format!("failed to open ledger {}", config.ledger.store_path))?;

        Ok(Self {
            config,
            config_path: PathBuf::from(config_path),
            profile: profile.map(str::to_string),
            client,
            desk,
        })
    }
}
