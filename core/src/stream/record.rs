// Flow records
//
// One decoded unit of live graph telemetry and the lenient frame parser that
// produces them.

use crate::signal::SignalType;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Traffic observed from one component, optionally towards specific targets
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    #[serde(rename = "componentID")]
    pub component_id: String,
    /// Empty when the producer cannot tell which downstream components received the data
    #[serde(rename = "targetComponentIDs", default)]
    pub target_component_ids: Vec<String>,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub rate: f64,
}

impl FlowRecord {
    pub fn new(component_id: impl Into<String>, signal_type: SignalType, rate: f64) -> Self {
        Self {
            component_id: component_id.into(),
            target_component_ids: Vec::new(),
            signal_type,
            rate,
        }
    }

    pub fn to_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_component_ids = targets.into_iter().map(Into::into).collect();
        self
    }
}

/// Records of one frame, in wire order
pub type FlowBatch = Vec<FlowRecord>;

/// Record as sent by the agent; validated into a `FlowRecord`
#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(rename = "componentID")]
    component_id: String,
    #[serde(rename = "targetComponentIDs", default)]
    target_component_ids: Option<Vec<String>>,
    #[serde(rename = "type")]
    signal_type: String,
    rate: Option<f64>,
    count: Option<f64>,
}

impl WireRecord {
    fn into_record(self, window_seconds: u32) -> Result<FlowRecord, String> {
        let signal_type = SignalType::from_wire(&self.signal_type)
            .ok_or_else(|| format!("unknown signal type {:?}", self.signal_type))?;
        let rate = match (self.rate, self.count) {
            (Some(rate), _) => rate,
            (None, Some(count)) => count / f64::from(window_seconds.max(1)),
            (None, None) => return Err("record carries neither rate nor count".to_string()),
        };
        if !rate.is_finite() || rate < 0.0 {
            return Err(format!("invalid rate {}", rate));
        }
        Ok(FlowRecord {
            component_id: self.component_id,
            target_component_ids: self.target_component_ids.unwrap_or_default(),
            signal_type,
            rate,
        })
    }
}

/// Parse one frame (a JSON array of records).
///
/// A frame that is not a JSON array of objects is an error. Individual records
/// that are well-formed JSON but semantically invalid are dropped and counted.
pub(crate) fn parse_frame(
    text: &str,
    window_seconds: u32,
) -> Result<(FlowBatch, usize), serde_json::Error> {
    let wire: Vec<WireRecord> = serde_json::from_str(text)?;
    let mut dropped = 0;
    let mut batch = Vec::with_capacity(wire.len());
    for record in wire {
        let component_id = record.component_id.clone();
        match record.into_record(window_seconds) {
            Ok(record) => batch.push(record),
            Err(reason) => {
                dropped += 1;
                warn!(target: "stream", component = %component_id, reason = %reason, "Dropping flow record");
            }
        }
    }
    Ok((batch, dropped))
}
