use crate::constants::{GRID_HEIGHT, GRID_WIDTH};
use crate::error::LookupError;

pub fn to_frame_offset(x: usize, y: usize) -> usize {
    y * GRID_WIDTH + x
}

pub fn ensure_bounds(x: f64, y: f64) -> Result<(), LookupError> {
    let inside = (0.0..GRID_WIDTH as f64).contains(&x) && (0.0..GRID_HEIGHT as f64).contains(&y);
    if !inside {
        return Err(LookupError::OutOfBounds { x, y });
    }
    Ok(())
}

pub fn ensure_integral(values: &[f64]) -> Result<(), LookupError> {
    if values.iter().any(|value| value.fract() != 0.0) {
        return Err(LookupError::NonIntegerCoordinate {
            values: values.to_vec(),
        });
    }
    Ok(())
}

pub fn ensure_valid_cell(x: f64, y: f64) -> Result<(usize, usize), LookupError> {
    ensure_bounds(x, y)?;
    ensure_integral(&[x, y])?;
    Ok((x as usize, y as usize))
}
