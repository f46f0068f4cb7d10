use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Active weather alerts around the focal point, kept as the service's
/// GeoJSON-like feature collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSet {
    #[serde(default)]
    pub features: Vec<serde_json::Value>,
}

impl AlertSet {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No active alerts near this location.".to_string();
        }
        // Only the first two features are named
        let named = self
            .features
            .iter()
            .take(2)
            .filter_map(|f| f.pointer("/properties/event").and_then(|e| e.as_str()))
            .join(", ");
        format!("Active alerts: {} · {}", self.len(), named)
    }
}
