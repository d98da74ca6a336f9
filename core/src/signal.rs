// Signal catalogue
//
// The closed set of telemetry signal types that can flow over a graph edge.
// Declaration order is the processing order used by the reconciler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of telemetry carried between two components.
///
/// An edge that carries no signal yet is modelled as `Option<SignalType>::None`
/// on the edge itself, so this enum never needs an "unassigned" member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    /// Discovered scrape targets
    Target,
    PrometheusMetric,
    LokiLog,
    OtelMetric,
    OtelLog,
    OtelTrace,
    PyroscopeProfile,
}

impl SignalType {
    pub const ALL: [SignalType; 7] = [
        SignalType::Target,
        SignalType::PrometheusMetric,
        SignalType::LokiLog,
        SignalType::OtelMetric,
        SignalType::OtelLog,
        SignalType::OtelTrace,
        SignalType::PyroscopeProfile,
    ];

    /// Name used on the wire (`"type"` field of a flow record)
    pub fn wire_name(self) -> &'static str {
        match self {
            SignalType::Target => "target",
            SignalType::PrometheusMetric => "prometheus_metric",
            SignalType::LokiLog => "loki_log",
            SignalType::OtelMetric => "otel_metric",
            SignalType::OtelLog => "otel_log",
            SignalType::OtelTrace => "otel_trace",
            SignalType::PyroscopeProfile => "pyroscope_profile",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.wire_name() == name)
    }

    /// Display color (CSS hex) for edges carrying this signal
    pub fn color(self) -> &'static str {
        match self {
            SignalType::Target => "#8e44ad",
            SignalType::PrometheusMetric => "#e6522c",
            SignalType::LokiLog => "#f2cc0c",
            SignalType::OtelMetric => "#1f77b4",
            SignalType::OtelLog => "#2ca02c",
            SignalType::OtelTrace => "#17becf",
            SignalType::PyroscopeProfile => "#d62728",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}
