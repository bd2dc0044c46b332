//! Task intent heuristics used to bias profile selection.

use serde::Serialize;

/// Coarse task category inferred from an upstream prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Data,
    Network,
    Iot,
    Text,
    Viz,
    System,
}

const DATA_KEYWORDS: &[&str] = &["csv", "xlsx", "analysis", "analyze", "chart", "pandas", "dataframe"];
const NETWORK_KEYWORDS: &[&str] = &["http", "url", "download", "api", "network", "fetch"];
const IOT_KEYWORDS: &[&str] = &["mqtt", "shelly", "sensor", "gpio", "iot"];
const TEXT_KEYWORDS: &[&str] = &["ascii", "text", "string", "markdown"];
const VIZ_KEYWORDS: &[&str] = &["matplotlib", "plot", "image"];
const SYSTEM_KEYWORDS: &[&str] = &["system", "bash", "shell", "os.system"];

impl Intent {
    /// Classify a prompt. Categories are checked in a fixed order; the first hit wins.
    pub fn classify(prompt: &str) -> Self {
        let prompt = prompt.to_lowercase();
        let hit = |keywords: &[&str]| keywords.iter().any(|k| prompt.contains(k));

        if hit(DATA_KEYWORDS) {
            Intent::Data
        } else if hit(NETWORK_KEYWORDS) {
            Intent::Network
        } else if hit(IOT_KEYWORDS) {
            Intent::Iot
        } else if hit(TEXT_KEYWORDS) {
            Intent::Text
        } else if hit(VIZ_KEYWORDS) {
            Intent::Viz
        } else if hit(SYSTEM_KEYWORDS) {
            Intent::System
        } else {
            Intent::Text
        }
    }

    /// Profile name this intent prefers.
    pub fn profile(&self) -> &'static str {
        match self {
            Intent::Data => "analysis",
            Intent::Iot => "iot",
            Intent::Network | Intent::Text | Intent::Viz | Intent::System => "headless",
        }
    }
}
