//! Geographic access analysis.
//!
//! Clusters located access events, measures their dispersion, and flags
//! statistical outlier points. All derived values feed the geographic
//! component of the composite risk score.

use serde::{Deserialize, Serialize};
use vg_connectors::{GeoPoint, VaultSnapshot};

/// Tunable thresholds for the geographic calculator.
#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Two points within this distance belong to the same cluster.
    pub cluster_epsilon_km: f64,
    /// Cluster count above which dispersion risk is added.
    pub cluster_alert_count: usize,
    /// Coordinate-variance spread above which spread risk is added.
    pub spread_alert_threshold: f64,
    /// Located-event count above which flood risk is added.
    pub location_flood_count: usize,
    /// Minimum located events before outlier flagging is meaningful.
    pub baseline_min_points: usize,
    /// A point is an outlier beyond this many standard deviations from
    /// the mean distance to the centroid.
    pub outlier_sigma: f64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            cluster_epsilon_km: 1.0,
            cluster_alert_count: 5,
            spread_alert_threshold: 1.0,
            location_flood_count: 50,
            baseline_min_points: 5,
            outlier_sigma: 2.0,
        }
    }
}

/// Derived geographic metrics for one vault snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoThreatMetrics {
    /// Access events that carried a location.
    pub located_accesses: usize,
    /// Distinct locations after clustering.
    pub unique_locations: usize,
    /// Sum of latitude and longitude variances.
    pub location_spread: f64,
    /// Number of ~1 km clusters.
    pub cluster_count: usize,
    /// Outlier points far from the centroid.
    pub suspicious_locations: Vec<GeoPoint>,
    /// Geographic risk component in `[0, 1]`.
    pub risk_score: f64,
}

/// Runs the geographic calculator over a snapshot.
///
/// A snapshot with no located access events yields all-zero metrics.
pub fn analyze(snapshot: &VaultSnapshot, config: &GeoConfig) -> GeoThreatMetrics {
    let points: Vec<GeoPoint> = snapshot
        .access_records()
        .filter_map(|r| r.location)
        .collect();

    if points.is_empty() {
        return GeoThreatMetrics::default();
    }

    let clusters = cluster_centers(&points, config.cluster_epsilon_km);
    let spread = coordinate_spread(&points);
    let suspicious = outliers(&points, config);

    let mut risk: f64 = 0.0;
    if clusters.len() > config.cluster_alert_count {
        risk += 0.3;
    }
    if spread > config.spread_alert_threshold {
        risk += 0.4;
    }
    if points.len() > config.location_flood_count {
        risk += 0.3;
    }

    GeoThreatMetrics {
        located_accesses: points.len(),
        unique_locations: clusters.len(),
        location_spread: spread,
        cluster_count: clusters.len(),
        suspicious_locations: suspicious,
        risk_score: risk.min(1.0),
    }
}

/// Greedy single-pass clustering: each point joins the first existing center
/// within epsilon, otherwise it becomes a new center.
fn cluster_centers(points: &[GeoPoint], epsilon_km: f64) -> Vec<GeoPoint> {
    let mut centers: Vec<GeoPoint> = Vec::new();
    for point in points {
        let joined = centers
            .iter()
            .any(|c| c.distance_km(point) <= epsilon_km);
        if !joined {
            centers.push(*point);
        }
    }
    centers
}

/// Population variance of latitudes plus population variance of longitudes.
fn coordinate_spread(points: &[GeoPoint]) -> f64 {
    let n = points.len() as f64;
    let mean_lat = points.iter().map(|p| p.latitude).sum::<f64>() / n;
    let mean_lon = points.iter().map(|p| p.longitude).sum::<f64>() / n;
    let var_lat = points
        .iter()
        .map(|p| (p.latitude - mean_lat).powi(2))
        .sum::<f64>()
        / n;
    let var_lon = points
        .iter()
        .map(|p| (p.longitude - mean_lon).powi(2))
        .sum::<f64>()
        / n;
    var_lat + var_lon
}

/// Points further than `outlier_sigma` standard deviations from the mean
/// distance to the centroid. Needs a minimum baseline to be meaningful.
fn outliers(points: &[GeoPoint], config: &GeoConfig) -> Vec<GeoPoint> {
    if points.len() < config.baseline_min_points {
        return Vec::new();
    }

    let n = points.len() as f64;
    let centroid = GeoPoint {
        latitude: points.iter().map(|p| p.latitude).sum::<f64>() / n,
        longitude: points.iter().map(|p| p.longitude).sum::<f64>() / n,
    };

    let distances: Vec<f64> = points.iter().map(|p| centroid.distance_km(p)).collect();
    let mean = distances.iter().sum::<f64>() / n;
    let std_dev =
        (distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n).sqrt();

    if std_dev == 0.0 {
        return Vec::new();
    }

    points
        .iter()
        .zip(distances.iter())
        .filter(|(_, d)| **d > mean + config.outlier_sigma * std_dev)
        .map(|(p, _)| *p)
        .collect()
}
