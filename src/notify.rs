use std::time::Duration;

use anyhow::{Context, Result};
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, MqttOptions};
use rumqttc::Transport;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::constants::{
    KNMI_NOTIFY_BROKER_PORT, KNMI_NOTIFY_KEEP_ALIVE_SECONDS, KNMI_NOTIFY_TOPIC,
    KNMI_NOTIFY_USERNAME,
};
use crate::ingest::enqueue_filename;
use crate::types::AppState;

#[derive(Debug, Deserialize)]
struct NotificationEnvelope {
    data: NotificationData,
}

#[derive(Debug, Deserialize)]
struct NotificationData {
    filename: String,
}

pub async fn notify_loop(state: AppState, notify_key: String) -> Result<()> {
    info!(
        "Starting KNMI notification loop for {} as {}",
        state.cfg.knmi_notify_url, state.cfg.knmi_notify_client_id
    );

    let mut options = MqttOptions::new(
        state.cfg.knmi_notify_client_id.clone(),
        state.cfg.knmi_notify_url.clone(),
        KNMI_NOTIFY_BROKER_PORT,
    );
    options
        .set_credentials(KNMI_NOTIFY_USERNAME, notify_key)
        .set_keep_alive(Duration::from_secs(KNMI_NOTIFY_KEEP_ALIVE_SECONDS))
        .set_transport(Transport::wss_with_default_config());

    let (client, mut eventloop) = AsyncClient::new(options, 10);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to KNMI notifications, subscribing to {KNMI_NOTIFY_TOPIC}");
                client
                    .try_subscribe(KNMI_NOTIFY_TOPIC, QoS::AtMostOnce)
                    .context("Failed to queue KNMI notification subscription")?;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_notification(&state, &publish.payload).await;
            }
            Ok(_) => {}
            Err(error) => {
                warn!("KNMI notification connection failed: {error}");
                sleep(state.cfg.notify_reconnect_delay).await;
            }
        }
    }
}

async fn handle_notification(state: &AppState, payload: &[u8]) -> bool {
    let Some(filename) = filename_from_notification(payload) else {
        warn!("Ignoring KNMI notification without a dataset filename");
        return false;
    };

    info!("KNMI announced {filename}");
    enqueue_filename(state, &filename).await
}

fn filename_from_notification(payload: &[u8]) -> Option<String> {
    serde_json::from_slice::<NotificationEnvelope>(payload)
        .ok()
        .map(|envelope| envelope.data.filename)
        .filter(|filename| !filename.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATED_EVENT: &str = r#"{
        "specversion": "1.0",
        "type": "nl.knmi.dataplatform.file.created.v1",
        "source": "https://dataplatform.knmi.nl",
        "id": "8c6bfc14-6c8f-4b9d-a8c5-2c4b1a0b5f21",
        "time": "2024-05-14T12:11:02Z",
        "datacontenttype": "application/json",
        "data": {
            "datasetName": "radar_forecast",
            "datasetVersion": "1.0",
            "filename": "RAD_NL25_PCP_FM_202405141210.h5",
            "url": "https://api.dataplatform.knmi.nl/open-data/v1/datasets/radar_forecast/versions/1.0/files/RAD_NL25_PCP_FM_202405141210.h5/url"
        }
    }"#;

    #[test]
    fn extracts_filename_from_created_event() {
        assert_eq!(
            filename_from_notification(CREATED_EVENT.as_bytes()).as_deref(),
            Some("RAD_NL25_PCP_FM_202405141210.h5")
        );
    }

    #[test]
    fn ignores_malformed_notifications() {
        assert!(filename_from_notification(b"not json").is_none());
        assert!(filename_from_notification(br#"{"data":{}}"#).is_none());
        assert!(filename_from_notification(br#"{"filename":"RAD_NL25_PCP_FM_202405141210.h5"}"#).is_none());
        assert!(filename_from_notification(br#"{"data":{"filename":"  "}}"#).is_none());
    }

    #[tokio::test]
    async fn notification_enqueues_announced_dataset() {
        let state = AppState::for_tests();

        assert!(handle_notification(&state, CREATED_EVENT.as_bytes()).await);
        assert!(state
            .pending
            .lock()
            .await
            .contains_key("RAD_NL25_PCP_FM_202405141210.h5"));
    }

    #[tokio::test]
    async fn malformed_notification_enqueues_nothing() {
        let state = AppState::for_tests();

        assert!(!handle_notification(&state, b"{}").await);
        assert!(state.pending.lock().await.is_empty());
    }
}
