//! Fixed-size sequential paging
//!
//! Members fill page 0 (the prefix root), then `page-1`, `page-2`, ... in
//! arrival order. Whenever a new page opens, the previous page is sealed and
//! linked forward with a plain relation, so readers can walk the chain from
//! the root while only the newest page stays mutable.

use crate::config::PagedConfig;
use crate::error::Result;
use crate::scope::StrategyScope;
use ldes_model::{Record, RelationType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct PagedState {
    count: u64,
}

/// Page-based fragmentation strategy.
#[derive(Debug)]
pub struct PagedStrategy {
    config: PagedConfig,
    state: PagedState,
}

impl PagedStrategy {
    pub fn new(config: PagedConfig, saved: Option<&str>) -> Result<Self> {
        let state = match saved {
            Some(blob) => serde_json::from_str(blob)?,
            None => PagedState::default(),
        };
        Ok(Self { config, state })
    }

    fn page(&mut self, scope: &mut StrategyScope<'_>, index: u64) -> String {
        if index == 0 {
            scope.root()
        } else {
            scope.bucket(&format!("page-{index}"))
        }
    }

    pub fn bucketize(
        &mut self,
        _record: &dyn Record,
        scope: &mut StrategyScope<'_>,
    ) -> Result<Vec<String>> {
        self.state.count += 1;
        let index = self.state.count / self.config.page_size;
        let current = self.page(scope, index);

        // First member of a new page: seal the previous page and link it
        // forward.
        if index > 0 && self.state.count % self.config.page_size == 0 {
            let previous = self.page(scope, index - 1);
            scope.mark_immutable(&previous);
            scope.add_relation(&previous, RelationType::Relation, &current, None, None);
        }

        Ok(vec![current])
    }

    pub fn serialize_state(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state)?)
    }
}
