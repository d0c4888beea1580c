use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::constants::{
    KNMI_DATASET_PREFIX, KNMI_DATASET_SUFFIX, KNMI_FILENAME_TIME_FORMAT,
    KNMI_PUBLISH_DELAY_MINUTES,
};
use crate::http_client::{fetch_bytes, fetch_json_authorized};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadUrlResponse {
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    temporary_download_url: Option<String>,
}

pub fn filename_for(reference_time: DateTime<Utc>) -> String {
    format!(
        "{KNMI_DATASET_PREFIX}{}{KNMI_DATASET_SUFFIX}",
        reference_time.format(KNMI_FILENAME_TIME_FORMAT)
    )
}

// Whole five-minute mark at least five minutes back (22:13 -> 22:05).
pub fn latest_available_filename(now: DateTime<Utc>) -> String {
    let lag = KNMI_PUBLISH_DELAY_MINUTES + i64::from(now.minute()) % 5;
    filename_for(now - Duration::minutes(lag))
}

pub fn reference_time_from_filename(filename: &str) -> Option<DateTime<Utc>> {
    let regex = Regex::new(&format!(
        r"^{}(\d{{12}}){}$",
        regex::escape(KNMI_DATASET_PREFIX),
        regex::escape(KNMI_DATASET_SUFFIX)
    ))
    .ok()?;
    let stamp = regex.captures(filename)?.get(1)?.as_str();
    let naive = NaiveDateTime::parse_from_str(stamp, KNMI_FILENAME_TIME_FORMAT).ok()?;
    Some(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

fn download_url_endpoint(base_url: &str, filename: &str) -> String {
    format!("{base_url}/files/{}/url", urlencoding::encode(filename))
}

pub async fn fetch_dataset_payload(
    http: &Client,
    base_url: &str,
    api_key: &str,
    filename: &str,
) -> Result<Vec<u8>> {
    let endpoint = download_url_endpoint(base_url, filename);
    let response: DownloadUrlResponse = fetch_json_authorized(http, &endpoint, api_key)
        .await
        .with_context(|| format!("Fetching {filename} download url failed"))?;

    let download_url = response.temporary_download_url.ok_or_else(|| {
        anyhow!(
            "No temporaryDownloadUrl given for {filename} (contentType={:?}, size={:?})",
            response.content_type,
            response.size
        )
    })?;

    fetch_bytes(http, &download_url)
        .await
        .with_context(|| format!("Fetching {filename} dataset failed"))
}
