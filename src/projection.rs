use std::f64::consts::FRAC_PI_2;

use crate::constants::{
    PROJ_CENTRAL_MERIDIAN_DEG, PROJ_LAT_TRUE_SCALE_DEG, PROJ_OFFSET_VERTICAL,
    PROJ_SCALE_HORIZONTAL, PROJ_SCALE_VERTICAL, PROJ_SEMI_MAJOR_KM, PROJ_SEMI_MINOR_KM,
};

const INVERSE_MAX_ITERATIONS: usize = 15;
const INVERSE_TOLERANCE: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
}

fn eccentricity() -> f64 {
    (1.0 - (PROJ_SEMI_MINOR_KM * PROJ_SEMI_MINOR_KM) / (PROJ_SEMI_MAJOR_KM * PROJ_SEMI_MAJOR_KM))
        .sqrt()
}

fn tsfn(phi: f64, sin_phi: f64, e: f64) -> f64 {
    let e_sin = e * sin_phi;
    (0.5 * (FRAC_PI_2 - phi)).tan() / ((1.0 - e_sin) / (1.0 + e_sin)).powf(0.5 * e)
}

fn akm1(e: f64) -> f64 {
    let phits = PROJ_LAT_TRUE_SCALE_DEG.to_radians();
    let sin_phits = phits.sin();
    let e_sin = e * sin_phits;
    phits.cos() / tsfn(phits, sin_phits, e) / (1.0 - e_sin * e_sin).sqrt()
}

pub fn project(lat: f64, lng: f64) -> GridPoint {
    let e = eccentricity();
    let phi = lat.to_radians();
    let lam = (lng - PROJ_CENTRAL_MERIDIAN_DEG).to_radians();

    let rho = PROJ_SEMI_MAJOR_KM * akm1(e) * tsfn(phi, phi.sin(), e);
    let px = rho * lam.sin();
    let py = -rho * lam.cos();

    GridPoint {
        x: px * PROJ_SCALE_HORIZONTAL,
        y: (py + PROJ_OFFSET_VERTICAL) * PROJ_SCALE_VERTICAL,
    }
}

pub fn unproject(x: f64, y: f64) -> (f64, f64) {
    let e = eccentricity();
    let px = x / PROJ_SCALE_HORIZONTAL;
    let py = y / PROJ_SCALE_VERTICAL - PROJ_OFFSET_VERTICAL;

    let rho = px.hypot(py);
    let ts = rho / (PROJ_SEMI_MAJOR_KM * akm1(e));

    let mut phi = FRAC_PI_2 - 2.0 * ts.atan();
    for _ in 0..INVERSE_MAX_ITERATIONS {
        let e_sin = e * phi.sin();
        let next = FRAC_PI_2 - 2.0 * (ts * ((1.0 - e_sin) / (1.0 + e_sin)).powf(0.5 * e)).atan();
        let delta = (next - phi).abs();
        phi = next;
        if delta < INVERSE_TOLERANCE {
            break;
        }
    }

    let lam = px.atan2(-py);
    (phi.to_degrees(), lam.to_degrees() + PROJ_CENTRAL_MERIDIAN_DEG)
}
