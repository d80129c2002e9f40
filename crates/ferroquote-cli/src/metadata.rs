use ferroquote_core::{Payload, ProviderId, ProviderMode, UtcDateTime};
use serde::{Deserialize, Serialize};

/// Command metadata emitted alongside every result.
///
/// Field order is fixed to keep JSON output stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub mode: ProviderMode,
    /// Providers that produced the returned data, in output order, deduplicated.
    pub providers: Vec<ProviderId>,
    /// Whether any returned payload was generated rather than fetched.
    pub synthetic: bool,
    pub latency_ms: u64,
    pub generated_at: UtcDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Metadata {
    pub fn new(mode: ProviderMode, latency_ms: u64) -> Self {
        Self {
            mode,
            providers: Vec::new(),
            synthetic: false,
            latency_ms,
            generated_at: UtcDateTime::now(),
            warnings: Vec::new(),
        }
    }

    /// Records where each payload came from.
    pub fn observe<'a>(&mut self, payloads: impl IntoIterator<Item = &'a Payload>) {
        for payload in payloads {
            if !self.providers.contains(&payload.provider) {
                self.providers.push(payload.provider);
            }
            self.synthetic |= payload.is_synthetic;
        }
        if self.synthetic {
            self.push_warning("some data is synthetic; upstream providers were unavailable or not configured");
        }
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}
