//! County geography: fips identifiers, county risk rows and the boundary registry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Width of a canonical county fips code
pub const FIPS_WIDTH: usize = 5;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FipsError {
    #[error("empty fips code")]
    Empty,
    #[error("fips code contains non-digit characters: {0}")]
    NonDigit(String),
    #[error("fips code longer than {FIPS_WIDTH} digits: {0}")]
    TooLong(String),
}

/// Normalized 5-digit county identifier.
///
/// Every source hands out county ids in its own shape (`6037`, `"06037"`,
/// ` 6037 `). Construction always pads to [`FIPS_WIDTH`] so that map keys and
/// lookups agree regardless of where the id came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fips(String);

impl Fips {
    pub fn parse(raw: &str) -> Result<Self, FipsError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FipsError::Empty);
        }
        if !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(FipsError::NonDigit(trimmed.to_string()));
        }
        if trimmed.len() > FIPS_WIDTH {
            return Err(FipsError::TooLong(trimmed.to_string()));
        }
        Ok(Self(format!("{trimmed:0>width$}", width = FIPS_WIDTH)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Fips {
    type Err = FipsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Fips {
    type Error = FipsError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<Fips> for String {
    fn from(fips: Fips) -> Self {
        fips.0
    }
}

impl fmt::Display for Fips {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Geographic coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Label used when a point comes from a raw map interaction
    pub fn coordinate_label(&self) -> String {
        format!("Lat {:.4}, Lon {:.4}", self.latitude, self.longitude)
    }
}

/// The single coordinate every location-scoped query keys off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalPoint {
    pub point: GeoPoint,
    pub label: String,
}

impl FocalPoint {
    pub fn new(point: GeoPoint, label: impl Into<String>) -> Self {
        Self {
            point,
            label: label.into(),
        }
    }
}

impl Default for FocalPoint {
    fn default() -> Self {
        // Geographic centre of the contiguous US
        Self::new(GeoPoint::new(39.8283, -98.5795), "United States")
    }
}

/// Risk score and metadata for one county
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyRisk {
    pub fips: Fips,
    pub risk: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_abbr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_name: Option<String>,
}

impl CountyRisk {
    /// "Alameda, CA" when names are known, "County 06001" otherwise
    pub fn display_name(&self) -> String {
        match (&self.county, &self.state_abbr) {
            (Some(county), Some(abbr)) => format!("{county}, {abbr}"),
            (Some(county), None) => county.clone(),
            _ => format!("County {}", self.fips),
        }
    }

    /// State abbreviation, falling back to the full state name
    pub fn state(&self) -> Option<&str> {
        self.state_abbr
            .as_deref()
            .or(self.state_name.as_deref())
    }
}

/// Externally sourced county boundary geometry, kept opaque
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeoBoundaries(pub serde_json::Value);

impl GeoBoundaries {
    pub fn feature_count(&self) -> usize {
        self.0
            .get("features")
            .and_then(|f| f.as_array())
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Boundaries plus the two fips-keyed overlays derived from one choropleth load.
///
/// The registry is built in one piece and replaced in one piece.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeoRegistry {
    pub boundaries: GeoBoundaries,
    pub risk_by_fips: HashMap<Fips, f64>,
    pub county_details: HashMap<Fips, CountyRisk>,
}

impl GeoRegistry {
    pub fn assemble(counties: Vec<CountyRisk>, boundaries: GeoBoundaries) -> Self {
        let mut risk_by_fips = HashMap::with_capacity(counties.len());
        let mut county_details = HashMap::with_capacity(counties.len());
        for county in counties {
            risk_by_fips.insert(county.fips.clone(), county.risk);
            county_details.insert(county.fips.clone(), county);
        }
        Self {
            boundaries,
            risk_by_fips,
            county_details,
        }
    }

    /// Risk for a county id in any accepted shape
    pub fn risk_for(&self, raw_fips: &str) -> Option<f64> {
        let fips = Fips::parse(raw_fips).ok()?;
        self.risk_by_fips.get(&fips).copied()
    }

    /// County details for a county id in any accepted shape
    pub fn county(&self, raw_fips: &str) -> Option<&CountyRisk> {
        let fips = Fips::parse(raw_fips).ok()?;
        self.county_details.get(&fips)
    }

    pub fn len(&self) -> usize {
        self.county_details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.county_details.is_empty()
    }
}
