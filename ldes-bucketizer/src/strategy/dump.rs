//! Dump strategy
//!
//! Every member maps to the prefix root. With a configured timestamp path
//! the strategy additionally enforces non-decreasing arrival order,
//! rejecting stale members so a downstream time-ordered consumer never sees
//! a regression.

use crate::config::DumpConfig;
use crate::error::Result;
use crate::scope::StrategyScope;
use crate::strategy::member_timestamp;
use ldes_model::Record;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Default, Serialize, Deserialize)]
struct DumpState {
    last_timestamp_ms: Option<i64>,
}

/// Single-bucket fragmentation strategy.
#[derive(Debug)]
pub struct DumpStrategy {
    config: DumpConfig,
    state: DumpState,
}

impl DumpStrategy {
    pub fn new(config: DumpConfig, saved: Option<&str>) -> Result<Self> {
        let state = match saved {
            Some(blob) => serde_json::from_str(blob)?,
            None => DumpState::default(),
        };
        Ok(Self { config, state })
    }

    pub fn bucketize(
        &mut self,
        record: &dyn Record,
        scope: &mut StrategyScope<'_>,
    ) -> Result<Vec<String>> {
        if let Some(path) = &self.config.path {
            if let Some(ts) = member_timestamp(record, path)? {
                let millis = ts.timestamp_millis();
                if self.state.last_timestamp_ms.is_some_and(|last| millis < last) {
                    warn!(
                        member = record.id(),
                        timestamp = %ts,
                        "member is older than the newest accepted member; rejecting"
                    );
                    return Ok(vec![]);
                }
                self.state.last_timestamp_ms = Some(millis);
            }
        }
        Ok(vec![scope.root()])
    }

    pub fn serialize_state(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state)?)
    }
}
