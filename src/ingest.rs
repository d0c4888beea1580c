use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::constants::MAX_PENDING_ATTEMPTS;
use crate::decode::build_dataset;
use crate::grid::ForecastGrid;
use crate::knmi::{fetch_dataset_payload, latest_available_filename, reference_time_from_filename};
use crate::notify::notify_loop;
use crate::types::{AppState, ForecastDataset, ForecastDatasetInfo, PendingIngest};

pub async fn spawn_background_workers(state: AppState) -> Result<()> {
    let Some(api_key) = state.cfg.knmi_api_key.clone() else {
        warn!("KNMI_API_KEY is not set; forecast acquisition is disabled.");
        return Ok(());
    };

    let worker_state = state.clone();
    tokio::spawn(async move {
        ingest_scheduler_loop(worker_state, api_key).await;
    });

    let poll_state = state.clone();
    tokio::spawn(async move {
        poll_loop(poll_state).await;
    });

    if let Some(notify_key) = state.cfg.knmi_notify_key.clone() {
        let notify_state = state.clone();
        tokio::spawn(async move {
            if let Err(error) = notify_loop(notify_state, notify_key).await {
                error!("KNMI notification loop exited: {error:#}");
            }
        });
    } else {
        warn!("KNMI_NOTIFY_KEY is not set; relying only on periodic polling.");
    }

    Ok(())
}

pub fn on_new_dataset(grid: &ForecastGrid, dataset: Arc<ForecastDataset>) {
    let filename = dataset.info().filename.clone();
    match grid.replace(dataset) {
        Some(previous) => info!(
            "Forecast dataset {} replaced {}",
            filename,
            previous.info().filename
        ),
        None => info!("Forecast dataset {} installed", filename),
    }
}

async fn poll_loop(state: AppState) {
    loop {
        let filename = latest_available_filename(Utc::now());
        enqueue_filename(&state, &filename).await;
        sleep(state.cfg.poll_interval).await;
    }
}

pub async fn enqueue_filename(state: &AppState, filename: &str) -> bool {
    let Some(reference_time) = reference_time_from_filename(filename) else {
        warn!("Ignoring unrecognised dataset filename {filename}");
        return false;
    };

    if !is_newer_than_installed(&state.grid, reference_time) {
        return false;
    }

    // Lock order is pending, then in_flight, as in take_due_filename.
    let mut pending = state.pending.lock().await;
    if state.in_flight.lock().await.contains(filename) {
        return false;
    }

    pending
        .entry(filename.to_string())
        .and_modify(|entry| {
            entry.next_attempt_at = Instant::now();
        })
        .or_insert(PendingIngest {
            attempts: 0,
            next_attempt_at: Instant::now(),
        });
    true
}

fn is_newer_than_installed(grid: &ForecastGrid, reference_time: DateTime<Utc>) -> bool {
    match grid.current_snapshot() {
        Ok(current) => reference_time > current.info().reference_time,
        Err(_) => true,
    }
}

// Drops entries overtaken by the installed dataset before picking.
async fn take_due_filename(state: &AppState) -> Option<(String, PendingIngest)> {
    let now = Instant::now();
    let mut pending = state.pending.lock().await;

    pending.retain(|filename, _| {
        reference_time_from_filename(filename)
            .is_some_and(|reference_time| is_newer_than_installed(&state.grid, reference_time))
    });

    let selected = pending
        .iter()
        .filter(|(_, entry)| entry.next_attempt_at <= now)
        .map(|(filename, _)| filename.clone())
        .max()?;

    let entry = pending.remove(&selected)?;
    state.in_flight.lock().await.insert(selected.clone());
    Some((selected, entry))
}

async fn ingest_scheduler_loop(state: AppState, api_key: String) {
    loop {
        let Some((filename, pending_entry)) = take_due_filename(&state).await else {
            sleep(Duration::from_secs(2)).await;
            continue;
        };

        let outcome = ingest_filename(&state, &api_key, &filename).await;
        state.in_flight.lock().await.remove(&filename);

        match outcome {
            Ok(dataset) => {
                if is_newer_than_installed(&state.grid, dataset.info().reference_time) {
                    on_new_dataset(&state.grid, dataset);
                } else {
                    info!("Discarding {filename}; a newer dataset is already installed");
                }
            }
            Err(error) => {
                warn!(
                    "Ingest of {} failed (attempt {}): {error:#}",
                    filename,
                    pending_entry.attempts + 1
                );

                if pending_entry.attempts + 1 < MAX_PENDING_ATTEMPTS {
                    let mut pending = state.pending.lock().await;
                    pending.insert(
                        filename,
                        PendingIngest {
                            attempts: pending_entry.attempts + 1,
                            next_attempt_at: Instant::now() + state.cfg.pending_retry_delay,
                        },
                    );
                }
            }
        }
    }
}

async fn ingest_filename(
    state: &AppState,
    api_key: &str,
    filename: &str,
) -> Result<Arc<ForecastDataset>> {
    let reference_time = reference_time_from_filename(filename)
        .ok_or_else(|| anyhow!("Invalid dataset filename: {filename}"))?;

    info!("Fetching forecast dataset {filename}");
    let payload =
        fetch_dataset_payload(&state.http, &state.cfg.knmi_api_base_url, api_key, filename)
            .await?;

    let decoder = state.decoder.clone();
    let frames = tokio::task::spawn_blocking(move || decoder.decode_frames(&payload))
        .await
        .context("Join error while decoding dataset")??;

    let info = ForecastDatasetInfo {
        filename: filename.to_string(),
        reference_time,
    };
    let dataset =
        build_dataset(info, frames).with_context(|| format!("Dataset {filename} rejected"))?;
    Ok(Arc::new(dataset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::testdata::patterned_dataset;

    #[tokio::test]
    async fn enqueue_skips_datasets_not_newer_than_installed() {
        let state = AppState::for_tests();
        on_new_dataset(&state.grid, Arc::new(patterned_dataset("RAD_NL25_PCP_FM_202405141205.h5")));

        assert!(!enqueue_filename(&state, "RAD_NL25_PCP_FM_202405141200.h5").await);
        assert!(!enqueue_filename(&state, "RAD_NL25_PCP_FM_202405141205.h5").await);
        assert!(enqueue_filename(&state, "RAD_NL25_PCP_FM_202405141210.h5").await);
        assert_eq!(state.pending.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn enqueue_ignores_unrecognised_names() {
        let state = AppState::for_tests();
        assert!(!enqueue_filename(&state, "latest.h5").await);
        assert!(state.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn scheduler_takes_newest_due_filename_first() {
        let state = AppState::for_tests();
        enqueue_filename(&state, "RAD_NL25_PCP_FM_202405141210.h5").await;
        enqueue_filename(&state, "RAD_NL25_PCP_FM_202405141220.h5").await;
        enqueue_filename(&state, "RAD_NL25_PCP_FM_202405141215.h5").await;

        let (first, entry) = take_due_filename(&state).await.unwrap();
        assert_eq!(first, "RAD_NL25_PCP_FM_202405141220.h5");
        assert_eq!(entry.attempts, 0);
        assert_eq!(state.pending.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn scheduler_waits_for_retry_delay() {
        let state = AppState::for_tests();
        state.pending.lock().await.insert(
            "RAD_NL25_PCP_FM_202405141210.h5".to_string(),
            PendingIngest {
                attempts: 1,
                next_attempt_at: Instant::now() + Duration::from_secs(60),
            },
        );
        assert!(take_due_filename(&state).await.is_none());
    }

    #[tokio::test]
    async fn enqueue_skips_dataset_being_downloaded() {
        let state = AppState::for_tests();
        enqueue_filename(&state, "RAD_NL25_PCP_FM_202405141210.h5").await;

        let (taken, _) = take_due_filename(&state).await.unwrap();
        assert!(state.in_flight.lock().await.contains(&taken));

        assert!(!enqueue_filename(&state, "RAD_NL25_PCP_FM_202405141210.h5").await);
        assert!(state.pending.lock().await.is_empty());

        state.in_flight.lock().await.remove(&taken);
        assert!(enqueue_filename(&state, "RAD_NL25_PCP_FM_202405141210.h5").await);
    }

    #[tokio::test]
    async fn scheduler_drops_pending_entries_overtaken_by_installed_dataset() {
        let state = AppState::for_tests();
        enqueue_filename(&state, "RAD_NL25_PCP_FM_202405141200.h5").await;
        enqueue_filename(&state, "RAD_NL25_PCP_FM_202405141210.h5").await;
        state.pending.lock().await.insert(
            "RAD_NL25_PCP_FM_202405141205.h5".to_string(),
            PendingIngest {
                attempts: 2,
                next_attempt_at: Instant::now() + Duration::from_secs(60),
            },
        );

        // 12:05 lands while the entries are still queued.
        on_new_dataset(&state.grid, Arc::new(patterned_dataset("RAD_NL25_PCP_FM_202405141205.h5")));

        let (taken, _) = take_due_filename(&state).await.unwrap();
        assert_eq!(taken, "RAD_NL25_PCP_FM_202405141210.h5");
        assert!(state.pending.lock().await.is_empty());
        assert!(take_due_filename(&state).await.is_none());
    }

    #[test]
    fn on_new_dataset_installs_dataset() {
        let grid = ForecastGrid::new();
        on_new_dataset(&grid, Arc::new(patterned_dataset("first.h5")));
        on_new_dataset(&grid, Arc::new(patterned_dataset("second.h5")));
        assert_eq!(grid.current_snapshot().unwrap().info().filename, "second.h5");
    }
}
