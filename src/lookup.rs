use std::sync::Arc;

use crate::error::LookupError;
use crate::geo::haversine_distance_m;
use crate::grid::ForecastGrid;
use crate::indexer::{ensure_bounds, ensure_valid_cell, to_frame_offset};
use crate::interpolate::interpolate_bilinear;
use crate::projection::{project, GridPoint};
use crate::types::{
    ForecastDataset, ForecastSample, LatLng, PointForecast, RouteEntry, RouteForecast,
};

#[derive(Clone, Debug)]
pub struct ForecastLookupEngine {
    grid: Arc<ForecastGrid>,
}

impl ForecastLookupEngine {
    pub fn new(grid: Arc<ForecastGrid>) -> Self {
        Self { grid }
    }

    pub fn point_forecast(
        &self,
        lat: f64,
        lng: f64,
        interpolated: bool,
    ) -> Result<PointForecast, LookupError> {
        let dataset = self.grid.current_snapshot()?;
        forecast_at_grid(&dataset, project(lat, lng), interpolated)
    }

    // Every node is bounds-checked before any is sampled.
    pub fn route_forecast(
        &self,
        nodes: &[LatLng],
        interpolated: bool,
    ) -> Result<RouteForecast, LookupError> {
        let dataset = self.grid.current_snapshot()?;
        let entries = collect_route(nodes, |node| {
            forecast_at_grid(&dataset, project(node.lat, node.lng), interpolated)
        })?;

        Ok(RouteForecast {
            info: dataset.info().clone(),
            entries,
        })
    }
}

fn collect_route<F>(nodes: &[LatLng], mut sample: F) -> Result<Vec<RouteEntry>, LookupError>
where
    F: FnMut(LatLng) -> Result<PointForecast, LookupError>,
{
    ensure_valid_route(nodes)?;

    let mut entries = Vec::with_capacity(nodes.len());
    let mut distance_m = 0.0;
    let mut previous: Option<LatLng> = None;
    for node in nodes {
        if let Some(previous) = previous {
            distance_m += haversine_distance_m(previous, *node);
        }
        previous = Some(*node);

        entries.push(RouteEntry {
            node: *node,
            distance_m,
            forecast: sample(*node)?,
        });
    }
    Ok(entries)
}

// Bounds only; interpolated lookups take fractional coordinates.
fn ensure_valid_route(nodes: &[LatLng]) -> Result<(), LookupError> {
    for (index, node) in nodes.iter().enumerate() {
        let point = project(node.lat, node.lng);
        if ensure_bounds(point.x, point.y).is_err() {
            return Err(LookupError::RouteNodeOutOfBounds {
                index,
                lat: node.lat,
                lng: node.lng,
            });
        }
    }
    Ok(())
}

pub fn forecast_at_grid(
    dataset: &ForecastDataset,
    point: GridPoint,
    interpolated: bool,
) -> Result<PointForecast, LookupError> {
    if interpolated {
        return interpolated_forecast_at(dataset, point.x, point.y);
    }

    let values = cell_values(dataset, point.x.round(), point.y.round())?;
    Ok(build_forecast(dataset, values.into_iter().map(f64::from)))
}

fn interpolated_forecast_at(
    dataset: &ForecastDataset,
    x: f64,
    y: f64,
) -> Result<PointForecast, LookupError> {
    let x0 = x.floor();
    let x1 = x.ceil();
    let y0 = y.floor();
    let y1 = y.ceil();

    let top_left = cell_values(dataset, x0, y1)?;
    let top_right = cell_values(dataset, x1, y1)?;
    let bottom_left = cell_values(dataset, x0, y0)?;
    let bottom_right = cell_values(dataset, x1, y0)?;

    let fx = x - x0;
    let fy = y - y0;
    let values = (0..top_left.len()).map(|frame| {
        interpolate_bilinear(
            f64::from(top_left[frame]),
            f64::from(top_right[frame]),
            f64::from(bottom_left[frame]),
            f64::from(bottom_right[frame]),
            fx,
            fy,
        )
    });

    Ok(build_forecast(dataset, values))
}

fn cell_values(dataset: &ForecastDataset, x: f64, y: f64) -> Result<Vec<u8>, LookupError> {
    let (col, row) = ensure_valid_cell(x, y)?;
    let offset = to_frame_offset(col, row);

    dataset
        .frames()
        .iter()
        .enumerate()
        .map(|(frame, data)| {
            data.values
                .get(offset)
                .copied()
                .ok_or(LookupError::FrameOutOfRange { frame, offset })
        })
        .collect()
}

fn build_forecast(dataset: &ForecastDataset, values: impl Iterator<Item = f64>) -> PointForecast {
    let series = dataset
        .frames()
        .iter()
        .zip(values)
        .map(|(frame, value)| ForecastSample {
            time: frame.time,
            value,
        })
        .collect();

    PointForecast {
        info: dataset.info().clone(),
        series,
    }
}
