//! Geospatial filtering.
//!
//! Radius queries run in two phases: a cheap bounding box pushed into the
//! backing query, then an exact great-circle check on every candidate.
//! Explicit boxes only use the first phase.

use crate::filter::SearchFilter;
use crate::types::Metadata;
use log::warn;
use serde::{Deserialize, Serialize};

/// Kilometres per degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.32;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Metadata key holding latitude.
pub const LAT_FIELD: &str = "lat";

/// Metadata key holding longitude.
pub const LON_FIELD: &str = "lon";

/// Latitude limit applied before taking the cosine for longitude spans.
const MAX_LAT_FOR_SPAN: f64 = 89.0;

/// An axis-aligned latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Whether the point lies inside the box (edges included).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Range conditions on the latitude and longitude fields.
    pub fn to_filter(&self) -> SearchFilter {
        SearchFilter::AllOf(vec![
            SearchFilter::range(LAT_FIELD, Some(self.min_lat), Some(self.max_lat)),
            SearchFilter::range(LON_FIELD, Some(self.min_lon), Some(self.max_lon)),
        ])
    }
}

/// Coarse box enclosing a circle of `radius_km` around a point.
///
/// Longitude spans widen with latitude; the latitude is clamped to ±89°
/// so the span stays finite near the poles. No antimeridian wrapping.
pub fn bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEGREE;
    let clamped = lat.clamp(-MAX_LAT_FOR_SPAN, MAX_LAT_FOR_SPAN);
    let lon_delta = radius_km / (KM_PER_DEGREE * clamped.to_radians().cos());

    BoundingBox {
        min_lat: lat - lat_delta,
        max_lat: lat + lat_delta,
        min_lon: lon - lon_delta,
        max_lon: lon + lon_delta,
    }
}

/// Great-circle distance in kilometres (haversine).
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Coordinates stored in document metadata, if both are numeric.
pub fn coordinates(metadata: &Metadata) -> Option<(f64, f64)> {
    let lat = metadata.get(LAT_FIELD)?.as_f64()?;
    let lon = metadata.get(LON_FIELD)?.as_f64()?;
    Some((lat, lon))
}

// ============================================================================
// Queries
// ============================================================================

/// A circle around a centre point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRadius {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: f64,
}

impl GeoRadius {
    /// Validated constructor.
    pub fn new(lat: f64, lon: f64, radius_km: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && radius_km.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon)
            && radius_km > 0.0;
        valid.then_some(Self {
            lat,
            lon,
            radius_km,
        })
    }

    /// Build from optional parts.
    ///
    /// Any missing or invalid part disables geo filtering (returns `None`)
    /// instead of failing the query.
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>, radius_km: Option<f64>) -> Option<Self> {
        match (lat, lon, radius_km) {
            (None, None, None) => None,
            (Some(lat), Some(lon), Some(radius)) => {
                let geo = Self::new(lat, lon, radius);
                if geo.is_none() {
                    warn!("Invalid geo parameters ({lat}, {lon}, {radius} km); geo filter disabled");
                }
                geo
            }
            _ => {
                warn!("Incomplete geo parameters (need lat, lon and radius); geo filter disabled");
                None
            }
        }
    }

    /// Coarse pre-filter box.
    pub fn bounding_box(&self) -> BoundingBox {
        bounding_box(self.lat, self.lon, self.radius_km)
    }

    /// Distance from the centre to a point.
    pub fn distance_to(&self, lat: f64, lon: f64) -> f64 {
        haversine_km(self.lat, self.lon, lat, lon)
    }

    /// Exact check. Documents without coordinates are outside.
    pub fn contains(&self, metadata: &Metadata) -> bool {
        coordinates(metadata).is_some_and(|(lat, lon)| self.distance_to(lat, lon) <= self.radius_km)
    }
}

/// An explicit box where every edge is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lon: Option<f64>,
    pub max_lon: Option<f64>,
}

impl GeoBounds {
    /// Whether no edge is set.
    pub fn is_unbounded(&self) -> bool {
        self.min_lat.is_none()
            && self.max_lat.is_none()
            && self.min_lon.is_none()
            && self.max_lon.is_none()
    }

    /// Range conditions for the edges that are set.
    pub fn to_filter(&self) -> Option<SearchFilter> {
        let mut conditions = Vec::new();
        if self.min_lat.is_some() || self.max_lat.is_some() {
            conditions.push(SearchFilter::range(LAT_FIELD, self.min_lat, self.max_lat));
        }
        if self.min_lon.is_some() || self.max_lon.is_some() {
            conditions.push(SearchFilter::range(LON_FIELD, self.min_lon, self.max_lon));
        }
        SearchFilter::all_of(conditions)
    }
}

impl From<BoundingBox> for GeoBounds {
    fn from(b: BoundingBox) -> Self {
        Self {
            min_lat: Some(b.min_lat),
            max_lat: Some(b.max_lat),
            min_lon: Some(b.min_lon),
            max_lon: Some(b.max_lon),
        }
    }
}

/// A geographic restriction on a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoQuery {
    /// Within a distance of a point.
    Radius(GeoRadius),
    /// Inside an explicit box.
    Box(GeoBounds),
}

impl GeoQuery {
    /// Filter pushed into the backing query.
    pub fn pre_filter(&self) -> Option<SearchFilter> {
        match self {
            Self::Radius(radius) => Some(radius.bounding_box().to_filter()),
            Self::Box(bounds) => bounds.to_filter(),
        }
    }

    /// Whether candidates need an exact check after retrieval.
    pub fn needs_post_check(&self) -> bool {
        matches!(self, Self::Radius(_))
    }

    /// Exact check applied after retrieval.
    pub fn accepts(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Radius(radius) => radius.contains(metadata),
            Self::Box(bounds) => bounds.to_filter().is_none_or(|f| f.matches(metadata)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
