use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::constants::{FRAME_COUNT, FRAME_LEN, FRAME_STEP_MINUTES};
use crate::decode::{decoder_for, FrameDecoder};
use crate::error::DatasetError;
use crate::grid::ForecastGrid;
use crate::lookup::ForecastLookupEngine;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub http: Client,
    pub grid: Arc<ForecastGrid>,
    pub engine: ForecastLookupEngine,
    pub decoder: Arc<dyn FrameDecoder>,
    pub pending: Arc<Mutex<HashMap<String, PendingIngest>>>,
    pub in_flight: Arc<Mutex<HashSet<String>>>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, http: Client) -> Self {
        let grid = Arc::new(ForecastGrid::new());
        Self {
            decoder: decoder_for(cfg.dataset_format),
            cfg,
            http,
            engine: ForecastLookupEngine::new(grid.clone()),
            grid,
            pending: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::new(Arc::new(Config::for_tests()), Client::new())
    }
}

#[derive(Clone, Debug)]
pub struct PendingIngest {
    pub attempts: u32,
    pub next_attempt_at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(node: LatLng) -> Self {
        [node.lat, node.lng]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ForecastDatasetInfo {
    pub filename: String,
    #[serde(rename = "datetime")]
    pub reference_time: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ForecastFrame {
    pub time: DateTime<Utc>,
    pub values: Vec<u8>,
}

#[derive(Debug)]
pub struct ForecastDataset {
    info: ForecastDatasetInfo,
    frames: Vec<ForecastFrame>,
}

impl ForecastDataset {
    pub fn new(info: ForecastDatasetInfo, frames: Vec<ForecastFrame>) -> Result<Self, DatasetError> {
        if frames.len() != FRAME_COUNT {
            return Err(DatasetError::FrameCount {
                expected: FRAME_COUNT,
                actual: frames.len(),
            });
        }

        for (index, frame) in frames.iter().enumerate() {
            if frame.values.len() != FRAME_LEN {
                return Err(DatasetError::FrameLength {
                    frame: index,
                    expected: FRAME_LEN,
                    actual: frame.values.len(),
                });
            }
            if frame.time != frame_time(info.reference_time, index) {
                return Err(DatasetError::FrameTime { frame: index });
            }
        }

        Ok(Self { info, frames })
    }

    pub fn info(&self) -> &ForecastDatasetInfo {
        &self.info
    }

    pub fn frames(&self) -> &[ForecastFrame] {
        &self.frames
    }
}

pub fn frame_time(reference_time: DateTime<Utc>, index: usize) -> DateTime<Utc> {
    reference_time + Duration::minutes(FRAME_STEP_MINUTES * index as i64)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ForecastSample {
    pub time: DateTime<Utc>,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PointForecast {
    #[serde(rename = "forecastinfo")]
    pub info: ForecastDatasetInfo,
    #[serde(rename = "data")]
    pub series: Vec<ForecastSample>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteEntry {
    pub node: LatLng,
    pub distance_m: f64,
    pub forecast: PointForecast,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteForecast {
    #[serde(rename = "forecastinfo")]
    pub info: ForecastDatasetInfo,
    #[serde(rename = "data")]
    pub entries: Vec<RouteEntry>,
}

#[cfg(test)]
pub(crate) mod testdata {
    use chrono::TimeZone;

    use super::*;
    use crate::constants::GRID_WIDTH;

    pub fn reference_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, 12, 5, 0).unwrap()
    }

    pub fn info(filename: &str) -> ForecastDatasetInfo {
        ForecastDatasetInfo {
            filename: filename.to_string(),
            reference_time: reference_time(),
        }
    }

    pub fn patterned_value(x: usize, y: usize, frame: usize) -> u8 {
        ((x + 3 * y + 7 * frame) % 256) as u8
    }

    pub fn patterned_frames() -> Vec<ForecastFrame> {
        (0..FRAME_COUNT)
            .map(|frame| ForecastFrame {
                time: frame_time(reference_time(), frame),
                values: (0..FRAME_LEN)
                    .map(|offset| patterned_value(offset % GRID_WIDTH, offset / GRID_WIDTH, frame))
                    .collect(),
            })
            .collect()
    }

    pub fn patterned_dataset(filename: &str) -> ForecastDataset {
        ForecastDataset::new(info(filename), patterned_frames()).unwrap()
    }
}
