use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use validator::Validate;

use crate::domain::{EmergencyArea, FocalPoint, GeoPoint, RiskSensitivity};

/// API origin used when nothing else is configured
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api/v1";
/// Public US county boundary dataset keyed by fips
pub const DEFAULT_BOUNDARIES_URL: &str =
    "https://raw.githubusercontent.com/plotly/datasets/master/geojson-counties-fips.json";
/// Single env var that overrides the API origin
pub const API_BASE_ENV: &str = "BLACKOUT_API_BASE";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub api: ApiConfig,
    #[validate(nested)]
    pub polling: PollingConfig,
    #[validate(nested)]
    pub session: SessionConfig,
    pub facilities: Vec<EmergencyArea>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
}
impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiConfig {
    #[validate(length(min = 1))]
    pub base_url: String,
    #[validate(length(min = 1))]
    pub boundaries_url: String,
    #[validate(range(min = 1))]
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PollingConfig {
    #[validate(range(min = 1))]
    pub period_seconds: u64,
    pub enabled_on_start: bool,
}

impl PollingConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    pub label: String,
    #[validate(range(min = 0.7, max = 1.3))]
    pub sensitivity: f64,
    pub state_filter: Option<String>,
}

impl SessionConfig {
    pub fn focal_point(&self) -> FocalPoint {
        FocalPoint::new(GeoPoint::new(self.latitude, self.longitude), self.label.clone())
    }

    pub fn sensitivity(&self) -> RiskSensitivity {
        RiskSensitivity::new(self.sensitivity)
    }
}

impl Default for Config {
    fn default() -> Self {
        let focal = FocalPoint::default();
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                request_timeout_secs: 60,
                enable_cors: false,
            },
            api: ApiConfig {
                base_url: DEFAULT_API_BASE.to_string(),
                boundaries_url: DEFAULT_BOUNDARIES_URL.to_string(),
                http_timeout_seconds: 30,
            },
            polling: PollingConfig {
                period_seconds: 300,
                enabled_on_start: false,
            },
            session: SessionConfig {
                latitude: focal.point.latitude,
                longitude: focal.point.longitude,
                label: focal.label,
                sensitivity: RiskSensitivity::DEFAULT,
                state_filter: None,
            },
            facilities: EmergencyArea::defaults(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("BLACKOUT__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let mut cfg: Config = figment.extract()?;
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                cfg.api.base_url = base.trim().to_string();
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FacilityType;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.polling.period(), Duration::from_secs(300));
        assert_eq!(cfg.facilities.len(), 4);
        assert_eq!(cfg.session.focal_point(), FocalPoint::default());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(
            r#"
            [api]
            base_url = "http://risk.internal/api/v1"

            [polling]
            period_seconds = 60
            "#,
        ));
        let cfg = Config::from_figment(figment).unwrap();
        assert_eq!(cfg.polling.period_seconds, 60);
        assert_eq!(cfg.api.http_timeout_seconds, 30);
    }

    #[test]
    fn test_configured_facilities_replace_defaults() {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(
            r#"
            [[facilities]]
            name = "Oakland Emergency Operations Center"
            facility_type = "emergency"
            lat = 37.8044
            lon = -122.2712
            "#,
        ));
        let cfg = Config::from_figment(figment).unwrap();
        assert_eq!(cfg.facilities.len(), 1);
        assert_eq!(cfg.facilities[0].facility_type, FacilityType::Emergency);
    }

    #[test]
    fn test_out_of_range_sensitivity_rejected() {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string("[session]\nsensitivity = 2.0"));
        assert!(Config::from_figment(figment).is_err());
    }
}
