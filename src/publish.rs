//! Topic layout and snapshot payloads.
//!
//! Every topic is `{base}/{device_id}/{suffix}`:
//!
//! | suffix              | direction | payload                         |
//! |---------------------|-----------|---------------------------------|
//! | `data`              | out, retained | flat JSON snapshot          |
//! | `status`            | out, retained | `mqtt_connected` / health   |
//! | `action/<command>`  | in        | command body                    |

use core::fmt::Write;

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::catalog::Catalog;
use crate::decoder::{self, DecodedValue};
use crate::poller::SampleBuffer;

pub const DATA_SUFFIX: &str = "data";
pub const STATUS_SUFFIX: &str = "status";
pub const ACTION_PREFIX: &str = "action/";

/// Published retained to `status` when the broker session comes up.
pub const CONNECTED_MARKER: &[u8] = b"mqtt_connected";

pub type Topic = heapless::String<160>;

#[derive(Debug, Clone)]
pub struct TopicBuilder {
    /// `{base}/{device_id}/`
    prefix: Topic,
}

impl TopicBuilder {
    pub fn new(base: &str, device_id: &str) -> Self {
        let mut prefix = Topic::new();
        // Config caps base at 64 bytes and device ids are short.
        let _ = write!(prefix, "{}/{}/", base.trim_end_matches('/'), device_id);
        Self { prefix }
    }

    pub fn topic(&self, suffix: &str) -> Topic {
        let mut t = self.prefix.clone();
        let _ = t.push_str(suffix);
        t
    }

    /// Subscription filter for every inbound command.
    pub fn action_filter(&self) -> Topic {
        let mut t = self.topic(ACTION_PREFIX);
        let _ = t.push('#');
        t
    }

    /// The command part of an inbound topic, or `None` if the topic is not
    /// one of ours.
    pub fn action_suffix<'t>(&self, topic: &'t str) -> Option<&'t str> {
        topic
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix(ACTION_PREFIX)
    }
}

/// Flat `name → value` map for one completed cycle.
///
/// Failed reads and sentinel values are left out; bitfields contribute one
/// boolean per named bit; debug registers are logged and never published.
pub fn build_snapshot(catalog: &Catalog, samples: &SampleBuffer) -> Map<String, Value> {
    let mut fields = Map::new();
    for (index, spec) in catalog.iter().enumerate() {
        let Some(raw) = samples.get(index) else {
            debug!("Publish: '{}' skipped (read failed)", spec.name);
            continue;
        };
        match decoder::decode(raw, &spec.decode) {
            Ok(DecodedValue::Unsigned(v)) => {
                fields.insert(spec.name.into(), Value::from(v));
            }
            Ok(DecodedValue::Scaled(v)) => {
                fields.insert(spec.name.into(), Value::from(v));
            }
            Ok(DecodedValue::Bits(bits)) => {
                for bit in &bits {
                    fields.insert(bit.name.into(), Value::Bool(bit.set));
                }
            }
            Ok(DecodedValue::Debug { raw, binary }) => {
                debug!("Register '{}': {} (0b{})", spec.name, raw, binary);
            }
            Err(e) => warn!("Publish: '{}' skipped ({})", spec.name, e),
        }
    }
    fields
}

pub fn snapshot_payload(fields: Map<String, Value>) -> Vec<u8> {
    // A map of numbers and bools always serializes.
    serde_json::to_vec(&Value::Object(fields)).unwrap_or_default()
}
