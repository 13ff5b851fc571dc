use crate::config::DeskConfig;
use crate::config_loader::ConfigLoader;
use anyhow::Result;
use notify::{Event, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// Broadcasts a fresh [`DeskConfig`] whenever the config file is modified.
///
/// The desk service applies exit-policy changes from it without a restart.
pub struct ConfigWatcher {
    tx: watch::Sender<DeskConfig>,
    profile: Option<String>,
}

impl ConfigWatcher {
    /// Creates a new configuration watcher with an initial configuration.
    ///
    /// Returns a tuple of the watcher and a receiver for configuration updates.
    #[must_use]
    pub fn new(initial_config: DeskConfig) -> (Self, watch::Receiver<DeskConfig>) {
        let (tx, rx) = watch::channel(initial_config);
        (Self { tx, profile: None }, rx)
    }

    /// Reloads with the profile overlay the process started with.
    #[must_use]
    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile;
        self
    }

    /// Watches the configuration file for changes and broadcasts updates.
    ///
    /// # Errors
    ///
    /// Returns an error if file watching cannot be initiated or if the watcher task fails.
    pub async fn watch(&self, config_path: impl AsRef<Path>) -> Result<()> {
        let tx = self.tx.clone();
        let config_path: PathBuf = config_path.as_ref().to_path_buf();
        let profile = self.profile.clone();
        let overlay = profile
            .as_deref()
            .map(|p| ConfigLoader::profile_path(&config_path, p))
            .filter(|p| p.exists());

        tokio::task::spawn_blocking(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            })?;

            watcher.watch(&config_path, RecursiveMode::NonRecursive)?;
            if let Some(overlay) = &overlay {
                watcher.watch(overlay, RecursiveMode::NonRecursive)?;
            }

            for event in notify_rx {
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    continue;
                }
                match reload(&config_path, profile.as_deref()) {
                    Ok(new_config) => {
                        publish(&tx, new_config);
                    }
                    Err(e) => {
                        tracing::error!(
                            path = %config_path.display(),
                            error = %e,
                            "Config reload failed, keeping previous settings"
                        );
                    }
                }
            }

            Ok::<_, anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}

fn reload(config_path: &Path, profile: Option<&str>) -> Result<DeskConfig> {
    ConfigLoader::load_from_with_profile(config_path, profile)
}

/// Sends `config` only when it differs from the current value.
///
/// Editors often emit several modify events per save; receivers should see
/// one update.
fn publish(tx: &watch::Sender<DeskConfig>, config: DeskConfig) -> bool {
    let changed = tx.send_if_modified(|current| {
        if *current == config {
            return false;
        }
        *current = config;
        true
    });
    if changed {
        let policy = tx.borrow().exit_policy.clone();
        tracing::info!(
            take_profit = %policy.take_profit_usd,
            stop_loss = %policy.stop_loss_usd,
            auto = policy.auto_enabled,
            "Config reloaded"
        );
    }
    changed
}
