use crate::models::{BoundingBox, TrackedPoint};

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lng1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lng2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in kilometers
#[inline]
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Great-circle distance between two tracked points in kilometers
#[inline]
pub fn point_distance(a: &TrackedPoint, b: &TrackedPoint) -> f64 {
    haversine_distance(a.lat, a.lng, b.lat, b.lng)
}

/// Check if a point is within a bounding box (edges inclusive)
#[inline]
pub fn is_within_bounding_box(lat: f64, lng: f64, bbox: &BoundingBox) -> bool {
    lat >= bbox.min_lat
        && lat <= bbox.max_lat
        && lng >= bbox.min_lng
        && lng <= bbox.max_lng
}
