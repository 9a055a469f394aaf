//! Strategy configuration types
//!
//! Each fragmentation strategy has its own configuration struct; the
//! [`StrategyConfig`] enum ties them together under a `type` tag so a host
//! can deserialize a whole pipeline from JSON:
//!
//! ```json
//! [
//!   { "type": "subject", "path": "ex:sensor" },
//!   { "type": "paged", "pageSize": 250 }
//! ]
//! ```
//!
//! An unknown `type` tag fails deserialization, which makes an unsupported
//! strategy a construction-time error rather than a runtime surprise.

use crate::error::{BucketizerError, Result};
use serde::Deserialize;

/// Ordered pipeline of strategy configurations.
pub type Pipeline = Vec<StrategyConfig>;

/// Configuration for one fragmentation strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StrategyConfig {
    /// Fixed-size sequential pages
    Paged(PagedConfig),
    /// Navigator root always pointing at the newest page
    ReversedPaged(ReversedPagedConfig),
    /// One bucket per distinct attribute value
    Subject(SubjectConfig),
    /// One bucket per wall-clock hour
    Hour(HourConfig),
    /// Everything into the root bucket
    Dump(DumpConfig),
    /// Adaptive size/time-bounded splitting
    Timebased(TimebasedConfig),
    /// 2-D spatial R-tree
    Rtree(RTreeConfig),
    /// Multi-level calendar tree
    TimeBucketTree(TimeBucketTreeConfig),
}

impl StrategyConfig {
    /// Validate the configuration. Called at orchestrator construction so a
    /// bad pipeline fails before any record is processed.
    pub fn validate(&self) -> Result<()> {
        match self {
            StrategyConfig::Paged(c) => c.validate(),
            StrategyConfig::ReversedPaged(c) => c.validate(),
            StrategyConfig::Subject(_) => Ok(()),
            StrategyConfig::Hour(_) => Ok(()),
            StrategyConfig::Dump(_) => Ok(()),
            StrategyConfig::Timebased(c) => c.validate(),
            StrategyConfig::Rtree(c) => c.validate(),
            StrategyConfig::TimeBucketTree(c) => c.validate(),
        }
    }
}

fn default_page_size() -> u64 {
    50
}

/// Configuration for the paged strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedConfig {
    /// Members per page before rolling over to a new page.
    /// Default: 50
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl Default for PagedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

impl PagedConfig {
    /// Set the page size.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(BucketizerError::InvalidConfig(
                "pageSize must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the reversed-paged strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReversedPagedConfig {
    /// Members per page before rolling over to a new page.
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Timestamp attribute path. When set, page back-links carry the
    /// rollover timestamp and stale members are rejected.
    #[serde(default)]
    pub path: Option<String>,

    /// Descriptor emitted with relations; defaults to `path`.
    #[serde(default)]
    pub path_descriptor: Option<String>,
}

impl Default for ReversedPagedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            path: None,
            path_descriptor: None,
        }
    }
}

impl ReversedPagedConfig {
    /// Set the page size.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the timestamp path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Relation path descriptor.
    pub fn descriptor(&self) -> Option<&str> {
        self.path_descriptor.as_deref().or(self.path.as_deref())
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(BucketizerError::InvalidConfig(
                "pageSize must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the subject strategy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectConfig {
    /// Attribute path whose distinct values partition the stream.
    pub path: String,

    /// Descriptor emitted with relations; defaults to `path`.
    #[serde(default)]
    pub path_descriptor: Option<String>,

    /// Optional path yielding a human-readable bucket name per value; when
    /// absent the percent-encoded raw value is used as the key.
    #[serde(default)]
    pub name_path: Option<String>,

    /// Bucket key for members without a value. When absent such members are
    /// skipped with a warning.
    #[serde(default)]
    pub default_name: Option<String>,
}

impl SubjectConfig {
    /// Create a config for the given attribute path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set the name path.
    pub fn with_name_path(mut self, name_path: impl Into<String>) -> Self {
        self.name_path = Some(name_path.into());
        self
    }

    /// Set the default bucket key.
    pub fn with_default_name(mut self, default_name: impl Into<String>) -> Self {
        self.default_name = Some(default_name.into());
        self
    }

    /// Relation path descriptor.
    pub fn descriptor(&self) -> &str {
        self.path_descriptor.as_deref().unwrap_or(&self.path)
    }
}

/// Configuration for the hour strategy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourConfig {
    /// Timestamp attribute path.
    pub path: String,

    /// Descriptor emitted with relations; defaults to `path`.
    #[serde(default)]
    pub path_descriptor: Option<String>,

    /// Link consecutive hour buckets with a symmetric pair of plain
    /// relations instead of comparator bounds.
    #[serde(default)]
    pub unordered_relations: bool,
}

impl HourConfig {
    /// Create a config for the given timestamp path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Use symmetric plain relations between consecutive buckets.
    pub fn with_unordered_relations(mut self) -> Self {
        self.unordered_relations = true;
        self
    }

    /// Relation path descriptor.
    pub fn descriptor(&self) -> &str {
        self.path_descriptor.as_deref().unwrap_or(&self.path)
    }
}

/// Configuration for the dump strategy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpConfig {
    /// Optional timestamp path; when set, members must arrive in
    /// non-decreasing timestamp order and stale ones are rejected.
    #[serde(default)]
    pub path: Option<String>,

    /// Descriptor emitted with relations; defaults to `path`.
    #[serde(default)]
    pub path_descriptor: Option<String>,
}

impl DumpConfig {
    /// Set the timestamp path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

fn default_max_size() -> usize {
    100
}

fn default_k() -> i64 {
    4
}

fn default_min_bucket_span_ms() -> i64 {
    60_000
}

/// Configuration for the adaptive timebased strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimebasedConfig {
    /// Timestamp attribute path.
    pub path: String,

    /// Descriptor emitted with relations; defaults to `path`.
    #[serde(default)]
    pub path_descriptor: Option<String>,

    /// Members per bucket before a split or page rollover.
    /// Default: 100
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Split fan-out: how many equal-span children a full bucket splits
    /// into. Default: 4
    #[serde(default = "default_k")]
    pub k: i64,

    /// Smallest time span (ms) a split may produce; below it a full bucket
    /// rolls over to a same-span sibling page instead.
    /// Default: 60 000 (one minute)
    #[serde(default = "default_min_bucket_span_ms")]
    pub min_bucket_span_ms: i64,
}

impl Default for TimebasedConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            path_descriptor: None,
            max_size: default_max_size(),
            k: default_k(),
            min_bucket_span_ms: default_min_bucket_span_ms(),
        }
    }
}

impl TimebasedConfig {
    /// Create a config for the given timestamp path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set the member capacity per bucket.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the split fan-out.
    pub fn with_k(mut self, k: i64) -> Self {
        self.k = k;
        self
    }

    /// Set the minimum bucket span in milliseconds.
    pub fn with_min_bucket_span_ms(mut self, span: i64) -> Self {
        self.min_bucket_span_ms = span;
        self
    }

    /// Relation path descriptor.
    pub fn descriptor(&self) -> &str {
        self.path_descriptor.as_deref().unwrap_or(&self.path)
    }

    fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(BucketizerError::InvalidConfig(
                "timebased strategy requires a timestamp path".into(),
            ));
        }
        if self.max_size == 0 {
            return Err(BucketizerError::InvalidConfig(
                "maxSize must be at least 1".into(),
            ));
        }
        if self.k < 2 {
            return Err(BucketizerError::InvalidConfig(
                "split fan-out k must be at least 2".into(),
            ));
        }
        if self.min_bucket_span_ms < 1 {
            return Err(BucketizerError::InvalidConfig(
                "minBucketSpanMs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_rtree_page_size() -> usize {
    10
}

/// Configuration for the spatial R-tree strategy.
///
/// Exactly one geometry source must be configured: a WKT-valued path, or a
/// latitude/longitude pair of numeric paths.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTreeConfig {
    /// Path to a WKT geometry literal.
    #[serde(default)]
    pub wkt_path: Option<String>,

    /// Descriptor emitted with WKT containment relations; defaults to
    /// `wktPath`.
    #[serde(default)]
    pub wkt_path_descriptor: Option<String>,

    /// Path to a numeric latitude value.
    #[serde(default)]
    pub lat_path: Option<String>,

    /// Descriptor emitted with latitude bound relations; defaults to
    /// `latPath`.
    #[serde(default)]
    pub lat_path_descriptor: Option<String>,

    /// Path to a numeric longitude value.
    #[serde(default)]
    pub lon_path: Option<String>,

    /// Descriptor emitted with longitude bound relations; defaults to
    /// `lonPath`.
    #[serde(default)]
    pub lon_path_descriptor: Option<String>,

    /// Maximum entries per tree node before a quadratic split.
    /// Default: 10
    #[serde(default = "default_rtree_page_size")]
    pub page_size: usize,
}

impl RTreeConfig {
    /// Create a WKT-sourced config.
    pub fn wkt(path: impl Into<String>) -> Self {
        Self {
            wkt_path: Some(path.into()),
            page_size: default_rtree_page_size(),
            ..Default::default()
        }
    }

    /// Create a latitude/longitude-sourced config.
    pub fn lat_lon(lat_path: impl Into<String>, lon_path: impl Into<String>) -> Self {
        Self {
            lat_path: Some(lat_path.into()),
            lon_path: Some(lon_path.into()),
            page_size: default_rtree_page_size(),
            ..Default::default()
        }
    }

    /// Set the node capacity.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    fn validate(&self) -> Result<()> {
        let has_wkt = self.wkt_path.is_some();
        let has_lat_lon = self.lat_path.is_some() && self.lon_path.is_some();
        if has_wkt == has_lat_lon {
            return Err(BucketizerError::InvalidConfig(
                "rtree strategy requires either wktPath or both latPath and lonPath".into(),
            ));
        }
        if self.page_size < 2 {
            return Err(BucketizerError::InvalidConfig(
                "rtree pageSize must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

/// Calendar units a time-bucket-tree level can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeRange {
    Year,
    Month,
    DayOfMonth,
    Hour,
    Minute,
    Second,
}

/// One level of the calendar tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelConfig {
    /// Calendar units combined into this level's key (e.g. `["year"]`,
    /// `["month"]`).
    pub ranges: Vec<TimeRange>,

    /// How many members a node at this level accepts before the tree
    /// descends into the next level.
    pub amount: u64,
}

/// Configuration for the multi-level calendar tree strategy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucketTreeConfig {
    /// Timestamp attribute path.
    pub path: String,

    /// Descriptor emitted with relations; defaults to `path`.
    #[serde(default)]
    pub path_descriptor: Option<String>,

    /// Ordered calendar levels, coarsest first.
    pub levels: Vec<LevelConfig>,

    /// Grace window (ms) behind the newest member before past sibling
    /// nodes are sealed. Default: 0
    #[serde(default)]
    pub time_buffer_ms: i64,
}

impl TimeBucketTreeConfig {
    /// Create a config for the given timestamp path and levels.
    pub fn new(path: impl Into<String>, levels: Vec<LevelConfig>) -> Self {
        Self {
            path: path.into(),
            path_descriptor: None,
            levels,
            time_buffer_ms: 0,
        }
    }

    /// Set the grace window in milliseconds.
    pub fn with_time_buffer_ms(mut self, buffer: i64) -> Self {
        self.time_buffer_ms = buffer;
        self
    }

    /// Relation path descriptor.
    pub fn descriptor(&self) -> &str {
        self.path_descriptor.as_deref().unwrap_or(&self.path)
    }

    /// Level-nesting validation: each unit may only follow its natural
    /// parent (month after year, day after month, ...), with the flattened
    /// sequence starting at year. Anything else makes node keys ambiguous.
    fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(BucketizerError::InvalidConfig(
                "timeBucketTree strategy requires a timestamp path".into(),
            ));
        }
        if self.levels.is_empty() {
            return Err(BucketizerError::InvalidConfig(
                "timeBucketTree strategy requires at least one level".into(),
            ));
        }
        let mut previous: Option<TimeRange> = None;
        for level in &self.levels {
            if level.ranges.is_empty() {
                return Err(BucketizerError::InvalidConfig(
                    "timeBucketTree level has no ranges".into(),
                ));
            }
            if level.amount == 0 {
                return Err(BucketizerError::InvalidConfig(
                    "timeBucketTree level amount must be at least 1".into(),
                ));
            }
            for range in &level.ranges {
                let allowed = match range {
                    TimeRange::Year => previous.is_none(),
                    TimeRange::Month => previous == Some(TimeRange::Year),
                    TimeRange::DayOfMonth => previous == Some(TimeRange::Month),
                    TimeRange::Hour => previous == Some(TimeRange::DayOfMonth),
                    TimeRange::Minute => previous == Some(TimeRange::Hour),
                    TimeRange::Second => previous == Some(TimeRange::Minute),
                };
                if !allowed {
                    return Err(BucketizerError::InvalidConfig(format!(
                        "level range {:?} may not follow {:?}",
                        range, previous
                    )));
                }
                previous = Some(*range);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_parses_from_json() {
        let json = r#"[
            { "type": "subject", "path": "ex:sensor" },
            { "type": "paged", "pageSize": 250 }
        ]"#;
        let pipeline: Pipeline = serde_json::from_str(json).unwrap();
        assert_eq!(pipeline.len(), 2);
        assert!(matches!(&pipeline[1], StrategyConfig::Paged(c) if c.page_size == 250));
    }

    #[test]
    fn test_unknown_strategy_type_is_rejected() {
        let json = r#"[{ "type": "quantum", "pageSize": 1 }]"#;
        assert!(serde_json::from_str::<Pipeline>(json).is_err());
    }

    #[test]
    fn test_rtree_requires_one_geometry_source() {
        assert!(RTreeConfig::default().validate().is_err());
        assert!(RTreeConfig::wkt("ex:geometry").validate().is_ok());
        assert!(RTreeConfig::lat_lon("ex:lat", "ex:long").validate().is_ok());

        let both = RTreeConfig {
            wkt_path: Some("ex:geometry".into()),
            lat_path: Some("ex:lat".into()),
            lon_path: Some("ex:long".into()),
            page_size: 10,
            ..Default::default()
        };
        assert!(both.validate().is_err());
    }

    #[test]
    fn test_level_nesting_is_validated() {
        let good = TimeBucketTreeConfig::new(
            "ex:time",
            vec![
                LevelConfig {
                    ranges: vec![TimeRange::Year],
                    amount: 10,
                },
                LevelConfig {
                    ranges: vec![TimeRange::Month],
                    amount: 5,
                },
            ],
        );
        assert!(good.validate().is_ok());

        // month without a preceding year is ambiguous
        let bad = TimeBucketTreeConfig::new(
            "ex:time",
            vec![LevelConfig {
                ranges: vec![TimeRange::Month],
                amount: 5,
            }],
        );
        assert!(bad.validate().is_err());

        // hour may not directly follow month
        let skipped = TimeBucketTreeConfig::new(
            "ex:time",
            vec![LevelConfig {
                ranges: vec![TimeRange::Year, TimeRange::Month, TimeRange::Hour],
                amount: 5,
            }],
        );
        assert!(skipped.validate().is_err());
    }

    #[test]
    fn test_timebased_defaults() {
        let config = TimebasedConfig::new("ex:time");
        assert_eq!(config.max_size, 100);
        assert_eq!(config.k, 4);
        assert!(config.validate().is_ok());
        assert!(TimebasedConfig::new("ex:time").with_k(1).validate().is_err());
    }
}
