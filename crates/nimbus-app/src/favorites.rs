//! Serialized favorites writes.
//!
//! Toggles flip the flag in state right away and queue a command here. One
//! worker drains the queue, so store writes land in toggle order.

use std::sync::Arc;

use nimbus_storage::FavoritePlace;
use tokio::sync::mpsc;

use crate::orchestrator::Shared;

#[derive(Debug)]
pub(crate) enum FavoriteCommand {
    Add { favorite: FavoritePlace, epoch: u64 },
    Remove { name: String, epoch: u64 },
    /// Resolve membership of a newly shown place.
    Check { name: String, epoch: u64 },
}

pub(crate) async fn run_worker(
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<FavoriteCommand>,
) {
    let mut closing = false;
    loop {
        let command = tokio::select! {
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
            // Stop accepting commands but flush the ones already queued.
            _ = shared.shutdown.cancelled(), if !closing => {
                commands.close();
                closing = true;
                continue;
            }
        };

        match command {
            FavoriteCommand::Add { favorite, epoch } => {
                if let Err(e) = shared.deps.favorites.upsert(&favorite).await {
                    tracing::warn!("Failed to save favorite {}: {}", favorite.name, e);
                    reconcile(&shared, &favorite.name, epoch).await;
                }
            }
            FavoriteCommand::Remove { name, epoch } => {
                if let Err(e) = shared.deps.favorites.delete(&name).await {
                    tracing::warn!("Failed to remove favorite {}: {}", name, e);
                    reconcile(&shared, &name, epoch).await;
                }
            }
            FavoriteCommand::Check { name, epoch } => reconcile(&shared, &name, epoch).await,
        }
    }
    tracing::debug!("Favorites worker stopped");
}

/// Set the flag from what the store actually holds.
async fn reconcile(shared: &Shared, name: &str, epoch: u64) {
    match shared.deps.favorites.exists(name).await {
        Ok(exists) => shared.apply_favorite_flag(name, epoch, exists),
        Err(e) => tracing::warn!("Failed to check favorite {}: {}", name, e),
    }
}
