//! Property listings and conversion into indexable documents.

use crate::types::{Document, MetadataValue, SOURCE_FIELD};
use chrono::{DateTime, Utc};
use hearth_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversion into a [`Document`].
///
/// Conversion failures are per item: the indexer logs and skips the item
/// instead of failing its batch.
pub trait IntoDocument {
    /// Convert, or explain why the item cannot be indexed.
    fn into_document(self) -> Result<Document>;
}

impl IntoDocument for Document {
    fn into_document(self) -> Result<Document> {
        if self.id.trim().is_empty() {
            return Err(Error::invalid_data("Document has an empty id"));
        }
        Ok(self)
    }
}

impl IntoDocument for Listing {
    fn into_document(self) -> Result<Document> {
        self.to_document()
    }
}

impl IntoDocument for serde_json::Value {
    fn into_document(self) -> Result<Document> {
        let listing: Listing = serde_json::from_value(self)?;
        listing.into_document()
    }
}

// ============================================================================
// Listing
// ============================================================================

/// Kind of property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    Apartment,
    House,
    Studio,
    Loft,
    Townhouse,
    #[serde(other)]
    Other,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Apartment => "apartment",
            Self::House => "house",
            Self::Studio => "studio",
            Self::Loft => "loft",
            Self::Townhouse => "townhouse",
            Self::Other => "other",
        })
    }
}

/// Kind of listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    #[default]
    Rent,
    Sale,
    Room,
    Sublease,
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rent => "rent",
            Self::Sale => "sale",
            Self::Room => "room",
            Self::Sublease => "sublease",
        })
    }
}

/// How negotiable the asking price is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationRate {
    High,
    Middle,
    Low,
}

impl fmt::Display for NegotiationRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Middle => "middle",
            Self::Low => "low",
        })
    }
}

/// A scraped property listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,

    pub country: Option<String>,
    pub region: Option<String>,
    pub city: String,
    pub district: Option<String>,
    pub neighborhood: Option<String>,
    #[serde(alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(alias = "lon")]
    pub longitude: Option<f64>,

    pub property_type: PropertyType,
    pub listing_type: ListingType,

    pub rooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub area_sqm: Option<f64>,
    pub floor: Option<i32>,
    pub total_floors: Option<i32>,
    pub year_built: Option<i32>,
    #[serde(alias = "energy_rating")]
    pub energy_cert: Option<String>,

    pub price: Option<f64>,
    pub currency: Option<String>,
    pub price_per_sqm: Option<f64>,
    pub negotiation_rate: Option<NegotiationRate>,

    pub has_parking: bool,
    pub has_garden: bool,
    pub has_pool: bool,
    pub has_garage: bool,
    pub has_bike_room: bool,
    pub is_furnished: bool,
    pub pets_allowed: bool,
    pub has_balcony: bool,
    pub has_elevator: bool,

    pub source_url: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Create a listing with the required fields.
    pub fn new(id: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            city: city.into(),
            ..Self::default()
        }
    }

    /// Amenity names for the flags that are set.
    pub fn amenities(&self) -> Vec<&'static str> {
        [
            (self.has_parking, "parking"),
            (self.has_garden, "garden"),
            (self.has_pool, "pool"),
            (self.has_garage, "garage"),
            (self.has_bike_room, "bike room"),
            (self.is_furnished, "furnished"),
            (self.pets_allowed, "pets allowed"),
            (self.has_balcony, "balcony"),
            (self.has_elevator, "elevator"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }

    /// Price per square metre, given or derived from price and area.
    pub fn effective_price_per_sqm(&self) -> Option<f64> {
        self.price_per_sqm.or_else(|| match (self.price, self.area_sqm) {
            (Some(price), Some(area)) if area > 0.0 => Some((price / area * 100.0).round() / 100.0),
            _ => None,
        })
    }

    /// Text that gets embedded and keyword-scored.
    pub fn search_text(&self) -> String {
        let mut text = format!("Property in {}", self.city);
        if let Some(n) = non_empty(&self.neighborhood) {
            text.push_str(&format!(", {n} neighborhood"));
        }
        if let Some(title) = non_empty(&self.title) {
            text.push_str(&format!(". {title}"));
        }

        let count = |v: Option<f64>| {
            v.filter(|x| x.is_finite())
                .map(|x| (x as i64).to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };
        text.push_str(&format!(
            ". {} with {} rooms and {} bathrooms",
            capitalize(&self.property_type.to_string()),
            count(self.rooms),
            count(self.bathrooms)
        ));

        let amount = count(self.price);
        let price = match non_empty(&self.currency) {
            Some(currency) => format!("{amount} {currency}"),
            None => format!("${amount}"),
        };
        text.push_str(&format!(". Listing: {}", capitalize(&self.listing_type.to_string())));
        match self.listing_type {
            ListingType::Sale => text.push_str(&format!(", Price: {price}")),
            _ => text.push_str(&format!(", Monthly rent: {price}")),
        }

        if let Some(area) = self.area_sqm.filter(|a| *a > 0.0) {
            text.push_str(&format!(", area: {area} square meters"));
        }
        match (self.floor, self.total_floors) {
            (Some(floor), Some(total)) => text.push_str(&format!(", floor {floor} of {total}")),
            (Some(floor), None) => text.push_str(&format!(", floor {floor}")),
            _ => {}
        }

        let amenities = self.amenities();
        if amenities.is_empty() {
            text.push_str(". Amenities: no special amenities");
        } else {
            text.push_str(&format!(". Amenities: {}", amenities.join(", ")));
        }

        if let Some(description) = non_empty(&self.description) {
            text.push_str(&format!(". Description: {description}"));
        }
        text
    }

    /// Build the indexable document.
    ///
    /// Listings without an id or a city cannot be indexed.
    pub fn to_document(&self) -> Result<Document> {
        if self.id.trim().is_empty() {
            return Err(Error::invalid_data("Listing has an empty id"));
        }
        if self.city.trim().is_empty() {
            return Err(Error::invalid_data(format!("Listing '{}' has no city", self.id)));
        }

        let text = self.search_text();
        let energy_cert = self
            .energy_cert
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut doc = Document::new(self.id.clone(), text)
            .with_metadata("id", self.id.as_str())
            .with_metadata("city", self.city.as_str())
            .with_metadata("rooms", self.rooms.unwrap_or(0.0))
            .with_metadata("bathrooms", self.bathrooms.unwrap_or(0.0))
            .with_metadata("property_type", self.property_type.to_string())
            .with_metadata("listing_type", self.listing_type.to_string())
            .with_metadata(SOURCE_FIELD, self.source_url.clone().unwrap_or_default())
            .with_metadata("has_parking", self.has_parking)
            .with_metadata("has_garden", self.has_garden)
            .with_metadata("has_pool", self.has_pool)
            .with_metadata("has_garage", self.has_garage)
            .with_metadata("has_bike_room", self.has_bike_room)
            .with_metadata("is_furnished", self.is_furnished)
            .with_metadata("pets_allowed", self.pets_allowed)
            .with_metadata("has_balcony", self.has_balcony)
            .with_metadata("has_elevator", self.has_elevator);

        let optional: [(&str, Option<MetadataValue>); 13] = [
            ("country", non_empty(&self.country).map(Into::into)),
            ("region", non_empty(&self.region).map(Into::into)),
            ("district", non_empty(&self.district).map(Into::into)),
            ("neighborhood", non_empty(&self.neighborhood).map(Into::into)),
            ("currency", non_empty(&self.currency).map(Into::into)),
            ("energy_cert", energy_cert.map(Into::into)),
            ("price", self.price.map(Into::into)),
            ("price_per_sqm", self.effective_price_per_sqm().map(Into::into)),
            ("area_sqm", self.area_sqm.map(Into::into)),
            ("lat", self.latitude.map(Into::into)),
            ("lon", self.longitude.map(Into::into)),
            ("year_built", self.year_built.map(Into::into)),
            (
                "negotiation_rate",
                self.negotiation_rate.map(|r| r.to_string().into()),
            ),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                doc = doc.with_metadata(key, value);
            }
        }
        if let Some(scraped_at) = self.scraped_at {
            doc = doc.with_metadata("scraped_at", scraped_at.to_rfc3339());
        }

        Ok(doc)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Listing {
        Listing {
            title: Some("Sunny two-bedroom".into()),
            neighborhood: Some("Kazimierz".into()),
            rooms: Some(2.0),
            bathrooms: Some(1.0),
            area_sqm: Some(50.0),
            price: Some(3000.0),
            currency: Some("PLN".into()),
            has_garden: true,
            has_balcony: true,
            latitude: Some(50.05),
            longitude: Some(19.94),
            energy_cert: Some(" B ".into()),
            source_url: Some("https://listings.test/1".into()),
            ..Listing::new("krk-1", "Krakow")
        }
    }

    // ------------------------------------------------------------------------
    // Search text tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_search_text_rent() {
        let text = sample().search_text();
        assert!(text.starts_with("Property in Krakow, Kazimierz neighborhood"));
        assert!(text.contains("Apartment with 2 rooms and 1 bathrooms"));
        assert!(text.contains("Listing: Rent, Monthly rent: 3000 PLN"));
        assert!(text.contains("Amenities: garden, balcony"));
    }

    #[test]
    fn test_search_text_sale_without_currency() {
        let listing = Listing {
            listing_type: ListingType::Sale,
            price: Some(450000.0),
            ..Listing::new("x", "Porto")
        };
        let text = listing.search_text();
        assert!(text.contains("Price: $450000"));
        assert!(text.contains("with unknown rooms and unknown bathrooms"));
        assert!(text.contains("no special amenities"));
    }

    // ------------------------------------------------------------------------
    // Conversion tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_to_document_metadata() {
        let doc = sample().to_document().unwrap();
        assert_eq!(doc.id, "krk-1");
        assert_eq!(doc.get("city"), Some(&MetadataValue::from("Krakow")));
        assert_eq!(doc.number("price_per_sqm"), Some(60.0));
        assert_eq!(doc.get("energy_cert"), Some(&MetadataValue::from("B")));
        assert_eq!(doc.get("has_garden"), Some(&MetadataValue::Bool(true)));
        assert_eq!(doc.number("lat"), Some(50.05));
        assert_eq!(doc.source(), Some("https://listings.test/1"));
    }

    #[test]
    fn test_to_document_defaults_rooms() {
        let doc = Listing::new("x", "Riga").to_document().unwrap();
        assert_eq!(doc.number("rooms"), Some(0.0));
        assert_eq!(doc.number("bathrooms"), Some(0.0));
        assert!(doc.get("price").is_none());
        assert!(doc.get("lat").is_none());
    }

    #[test]
    fn test_to_document_rejects_missing_fields() {
        assert!(Listing::new("", "Riga").to_document().is_err());
        assert!(Listing::new("x", "  ").to_document().is_err());
    }

    #[test]
    fn test_into_document_from_json() {
        let value = json!({
            "id": "j-1",
            "city": "Vienna",
            "property_type": "castle",
            "lat": 48.2,
            "has_pool": true,
            "price": 1800
        });
        let doc = value.into_document().unwrap();
        assert_eq!(doc.get("property_type"), Some(&MetadataValue::from("other")));
        assert_eq!(doc.number("lat"), Some(48.2));
    }

    #[test]
    fn test_into_document_from_malformed_json() {
        let err = json!({"id": "j-2", "city": 42}).into_document().unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_document_into_document_checks_id() {
        assert!(Document::new("", "text").into_document().is_err());
        assert!(Document::new("a", "text").into_document().is_ok());
    }
}
