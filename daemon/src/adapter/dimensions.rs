//! Video dimension resolution.
//!
//! Dimensions come from two places: the payload of a play event, or a
//! synchronous query of the player. Queries often return zero right after
//! a bind, so a zero (or unchanged) answer schedules a bounded number of
//! delayed re-queries.

use common::EventParams;
use serde_json::Value;
use std::time::Duration;

const PRIMARY_KEYS: (&str, &str) = ("EVT_WIDTH", "EVT_HEIGHT");
const FALLBACK_KEYS: (&str, &str) = ("EVT_PARAM1", "EVT_PARAM2");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionSettings {
    pub retry_delay: Duration,
    pub max_retries: u32,
}

impl Default for DimensionSettings {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(100),
            max_retries: 10,
        }
    }
}

/// What the adapter should do after a synchronous query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUpdate {
    /// New dimensions; notify the layout and stop retrying
    Changed { width: u32, height: u32 },
    /// Query again after the delay
    Retry(Duration),
    /// Retry budget exhausted
    Exhausted,
}

/// Extract a width/height pair from an event payload.
///
/// Integers are preferred over floats, and the `EVT_WIDTH`/`EVT_HEIGHT`
/// keys over `EVT_PARAM1`/`EVT_PARAM2`. Floats are rounded. Pairs with a
/// zero or negative member are unusable.
pub fn read_payload(params: &EventParams) -> Option<(u32, u32)> {
    read_pair(params, PRIMARY_KEYS, Value::as_i64)
        .or_else(|| read_pair(params, FALLBACK_KEYS, Value::as_i64))
        .or_else(|| read_pair(params, PRIMARY_KEYS, rounded))
        .or_else(|| read_pair(params, FALLBACK_KEYS, rounded))
}

fn rounded(value: &Value) -> Option<i64> {
    value.as_f64().filter(|v| v.is_finite()).map(|v| v.round() as i64)
}

fn read_pair(
    params: &EventParams,
    (width_key, height_key): (&str, &str),
    read: fn(&Value) -> Option<i64>,
) -> Option<(u32, u32)> {
    let width = params.get(width_key).and_then(read)?;
    let height = params.get(height_key).and_then(read)?;
    let width = u32::try_from(width).ok().filter(|w| *w > 0)?;
    let height = u32::try_from(height).ok().filter(|h| *h > 0)?;
    Some((width, height))
}

/// Cached video dimensions plus the retry counter
#[derive(Debug)]
pub struct DimensionResolver {
    width: u32,
    height: u32,
    retries: u32,
    settings: DimensionSettings,
}

impl DimensionResolver {
    pub fn new(settings: DimensionSettings) -> Self {
        Self {
            width: 0,
            height: 0,
            retries: 0,
            settings,
        }
    }

    /// Forget cached dimensions and the retry counter
    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.retries = 0;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Take a pair reported by the engine (payload or resolution change).
    ///
    /// Returns true when it differs from the cache.
    pub fn accept(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || (width, height) == self.size() {
            return false;
        }
        self.width = width;
        self.height = height;
        self.retries = 0;
        true
    }

    /// Take the answer of a synchronous player query
    pub fn on_query(&mut self, width: u32, height: u32) -> SizeUpdate {
        if self.accept(width, height) {
            return SizeUpdate::Changed { width, height };
        }

        if self.retries < self.settings.max_retries {
            self.retries += 1;
            SizeUpdate::Retry(self.settings.retry_delay)
        } else {
            SizeUpdate::Exhausted
        }
    }
}
