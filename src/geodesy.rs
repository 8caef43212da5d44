/// A `[longitude, latitude]` pair in degrees.
pub type LonLat = [f64; 2];

/// Mean Earth radius in kilometres (IUGG), the sphere all distances are measured on.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance between two points using the haversine formula.
///
/// Non-finite input propagates as `NaN`; scoring treats that as "no score".
pub fn haversine_km(from: LonLat, to: LonLat) -> f64 {
    let [lon1, lat1] = from;
    let [lon2, lat2] = to;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn is_valid_coord(coord: LonLat) -> bool {
    let [lon, lat] = coord;
    lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat)
}

pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

pub fn std_dev(data: &[f64]) -> Option<f64> {
    match (mean(data), data.len()) {
        (Some(data_mean), count) if count > 0 => {
            let variance = data
                .iter()
                .map(|value| {
                    let diff = data_mean - *value;

                    diff * diff
                })
                .sum::<f64>()
                / count as f64;

            Some(variance.sqrt())
        }
        _ => None,
    }
}
