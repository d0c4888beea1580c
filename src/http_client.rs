use anyhow::{bail, Context, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::de::DeserializeOwned;

pub async fn fetch_bytes(http: &Client, url: &str) -> Result<Vec<u8>> {
    let response = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request failed for {url}"))?;

    if !response.status().is_success() {
        bail!("Request failed ({}) for {url}", response.status());
    }

    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read body for {url}"))?;
    Ok(bytes.to_vec())
}

pub async fn fetch_json_authorized<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    api_key: &str,
) -> Result<T> {
    let response = http
        .get(url)
        .header(AUTHORIZATION, api_key)
        .send()
        .await
        .with_context(|| format!("Request failed for {url}"))?;

    if !response.status().is_success() {
        bail!("Request failed ({}) for {url}", response.status());
    }

    response
        .json::<T>()
        .await
        .with_context(|| format!("Failed to decode JSON body for {url}"))
}
