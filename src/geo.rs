use crate::constants::EARTH_MEAN_RADIUS_METERS;
use crate::types::LatLng;

pub fn haversine_distance_m(start: LatLng, end: LatLng) -> f64 {
    let d_lat = (end.lat - start.lat).to_radians();
    let d_lng = (end.lng - start.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + (d_lng / 2.0).sin().powi(2) * start.lat.to_radians().cos() * end.lat.to_radians().cos();

    2.0 * EARTH_MEAN_RADIUS_METERS * a.sqrt().asin()
}
