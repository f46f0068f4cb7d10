use serde::Serialize;

/// Load state of a summary-backed store field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Status<T> {
    NotLoaded,
    Pending,
    Ready(T),
    /// Already-resolved consumer text: service message or the field's fallback
    Failed(String),
}

impl<T> Default for Status<T> {
    fn default() -> Self {
        Status::NotLoaded
    }
}

impl<T> Status<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Status::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn summary(&self, text: &SummaryText, render: impl FnOnce(&T) -> String) -> String {
        match self {
            Status::NotLoaded => text.not_loaded.to_string(),
            Status::Pending => text.pending.to_string(),
            Status::Ready(v) => render(v),
            Status::Failed(msg) => msg.clone(),
        }
    }
}

/// Consumer-facing strings of one summary field
#[derive(Debug, Clone, Copy)]
pub struct SummaryText {
    pub not_loaded: &'static str,
    pub pending: &'static str,
    pub failed: &'static str,
}

pub const FACILITY_RISK_TEXT: SummaryText = SummaryText {
    not_loaded: "Run a risk check to see details.",
    pending: "Checking facility risk...",
    failed: "Risk check failed.",
};

pub const AREA_SUMMARY_TEXT: SummaryText = SummaryText {
    not_loaded: "Select a location to see risk details.",
    pending: "Loading area summary...",
    failed: "Could not load area summary.",
};

pub const ALERTS_TEXT: SummaryText = SummaryText {
    not_loaded: "No alert data loaded yet.",
    pending: "Loading alerts...",
    failed: "Could not load alerts.",
};

pub const ANOMALY_UPLOAD_TEXT: SummaryText = SummaryText {
    not_loaded: "No inverter data loaded yet.",
    pending: "Scoring inverter data...",
    failed: "Could not score inverter data.",
};

pub const ANOMALY_SAMPLE_TEXT: SummaryText = SummaryText {
    not_loaded: "No inverter data loaded yet.",
    pending: "Loading sample data...",
    failed: "Could not load sample data.",
};

pub const MODEL_METRICS_TEXT: SummaryText = SummaryText {
    not_loaded: "Model metrics not loaded yet.",
    pending: "Loading model metrics...",
    failed: "Model metrics unavailable.",
};

pub const GUIDANCE_TEXT: SummaryText = SummaryText {
    not_loaded: "Select a county to get AI guidance.",
    pending: "Generating guidance...",
    failed: "Chat failed.",
};

/// Guidance text while a county is selected but nothing was asked yet
pub const GUIDANCE_PROMPT: &str = "Click 'Ask for guidance' to get guidance for this county.";

pub const TEST_ALERT_TEXT: SummaryText = SummaryText {
    not_loaded: "",
    pending: "Sending alert...",
    failed: "SMS failed.",
};
