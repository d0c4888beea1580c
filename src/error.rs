use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("forecast dataset not ready yet")]
    DatasetNotReady,

    #[error("coordinate pair ({x},{y}) out of bounds")]
    OutOfBounds { x: f64, y: f64 },

    #[error("{values:?} contains non-integer numbers")]
    NonIntegerCoordinate { values: Vec<f64> },

    #[error("route node {index} ({lat} {lng}) is outside of the allowed bounds")]
    RouteNodeOutOfBounds { index: usize, lat: f64, lng: f64 },

    #[error("frame {frame} has no sample at offset {offset}")]
    FrameOutOfRange { frame: usize, offset: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    #[error("expected {expected} frames, got {actual}")]
    FrameCount { expected: usize, actual: usize },

    #[error("frame {frame} holds {actual} samples, expected {expected}")]
    FrameLength {
        frame: usize,
        expected: usize,
        actual: usize,
    },

    #[error("frame {frame} is not spaced at the fixed step from the reference time")]
    FrameTime { frame: usize },
}
