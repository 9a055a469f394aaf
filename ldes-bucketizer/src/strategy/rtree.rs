//! Spatial R-tree fragmentation
//!
//! Classic R-tree insertion with Guttman's quadratic split. The strategy
//! owns its node tree (an arena keyed by node id) and synchronizes it to the
//! shared bucket graph only at node boundaries: the tree root is the prefix
//! root bucket, every other node is a `node-N` bucket, and members live in
//! leaf-node buckets. Parent → child containment is re-emitted whenever a
//! node's rectangle changes, so the emitted relations always describe the
//! current tree.
//!
//! Geometry sources: a WKT-valued path (bounding box per geometry, CRS
//! detected from the first literal) or a latitude/longitude pair of numeric
//! paths (degenerate point rectangles, four numeric bound relations per
//! edge).

use crate::config::RTreeConfig;
use crate::error::Result;
use crate::scope::StrategyScope;
use geo::BoundingRect;
use geo_types::Geometry;
use ldes_model::{Record, RelationType, RelationValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Key of the node mapped to the prefix root bucket.
const ROOT_KEY: &str = "";

/// Axis-aligned minimum bounding rectangle (x = longitude, y = latitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mbr {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Mbr {
    /// Degenerate rectangle for a point.
    pub fn point(x: f64, y: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Mbr) -> Mbr {
        Mbr {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    /// Area growth needed to cover `other`.
    pub fn enlargement(&self, other: &Mbr) -> f64 {
        self.union(other).area() - self.area()
    }

    pub fn contains(&self, other: &Mbr) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    fn is_point(&self) -> bool {
        self.min_x == self.max_x && self.min_y == self.max_y
    }

    /// WKT rendering: a point for degenerate rectangles, a closed polygon
    /// otherwise, prefixed by the CRS IRI when one is known.
    fn to_wkt(self, crs: Option<&str>) -> String {
        let body = if self.is_point() {
            format!("POINT ({} {})", self.min_x, self.min_y)
        } else {
            format!(
                "POLYGON (({minx} {miny}, {maxx} {miny}, {maxx} {maxy}, {minx} {maxy}, {minx} {miny}))",
                minx = self.min_x,
                miny = self.min_y,
                maxx = self.max_x,
                maxy = self.max_y,
            )
        };
        match crs {
            Some(crs) => format!("{crs} {body}"),
            None => body,
        }
    }
}

/// Child of a tree node: a nested node or a leaf entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum NodeChild {
    /// Nested node, by key
    Node(String),
    /// Leaf entry: one inserted member rectangle
    Entry { member: String, mbr: Mbr },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SpatialNode {
    mbr: Option<Mbr>,
    leaf: bool,
    children: Vec<NodeChild>,
    /// Rebuilt from `children` on load
    #[serde(skip)]
    parent: Option<String>,
}

impl SpatialNode {
    fn empty_leaf() -> Self {
        Self {
            mbr: None,
            leaf: true,
            children: Vec::new(),
            parent: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RTreeState {
    nodes: BTreeMap<String, SpatialNode>,
    next_node: u64,
    /// CRS IRI (`<...>` form) of the first WKT literal seen, if any
    crs: Option<String>,
}

/// Spatial R-tree fragmentation strategy.
#[derive(Debug)]
pub struct RTreeStrategy {
    config: RTreeConfig,
    state: RTreeState,
}

/// Quadratic seed pick + distribution (Guttman). Returns two non-empty
/// groups with their covering rectangles. Ties on wasted area fall to the
/// first pair in iteration order.
fn quadratic_split(items: Vec<(NodeChild, Mbr)>) -> ((Vec<NodeChild>, Mbr), (Vec<NodeChild>, Mbr)) {
    debug_assert!(items.len() >= 2);

    let mut seeds = (0, 1);
    let mut worst = f64::NEG_INFINITY;
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let waste = items[i].1.union(&items[j].1).area() - items[i].1.area() - items[j].1.area();
            if waste > worst {
                worst = waste;
                seeds = (i, j);
            }
        }
    }

    let mut group_a: Vec<NodeChild> = Vec::new();
    let mut group_b: Vec<NodeChild> = Vec::new();
    let mut mbr_a = items[seeds.0].1;
    let mut mbr_b = items[seeds.1].1;
    let mut rest = Vec::new();
    for (index, (child, mbr)) in items.into_iter().enumerate() {
        if index == seeds.0 {
            group_a.push(child);
        } else if index == seeds.1 {
            group_b.push(child);
        } else {
            rest.push((child, mbr));
        }
    }

    while !rest.is_empty() {
        // most decisive entry first: the one whose enlargement difference
        // between the two groups is largest
        let mut pick = 0;
        let mut best_diff = f64::NEG_INFINITY;
        for (index, (_, mbr)) in rest.iter().enumerate() {
            let diff = (mbr_a.enlargement(mbr) - mbr_b.enlargement(mbr)).abs();
            if diff > best_diff {
                best_diff = diff;
                pick = index;
            }
        }
        let (child, mbr) = rest.swap_remove(pick);
        let grow_a = mbr_a.enlargement(&mbr);
        let grow_b = mbr_b.enlargement(&mbr);
        let into_a = match grow_a.partial_cmp(&grow_b) {
            Some(std::cmp::Ordering::Less) => true,
            Some(std::cmp::Ordering::Greater) => false,
            _ => {
                // equal growth: smaller area, then fewer children
                if mbr_a.area() != mbr_b.area() {
                    mbr_a.area() < mbr_b.area()
                } else {
                    group_a.len() <= group_b.len()
                }
            }
        };
        if into_a {
            mbr_a = mbr_a.union(&mbr);
            group_a.push(child);
        } else {
            mbr_b = mbr_b.union(&mbr);
            group_b.push(child);
        }
    }

    ((group_a, mbr_a), (group_b, mbr_b))
}

/// Split a WKT literal of the form `<crs-iri> BODY` into its parts.
fn split_crs(literal: &str) -> (Option<&str>, &str) {
    let trimmed = literal.trim();
    if trimmed.starts_with('<') {
        if let Some(end) = trimmed.find('>') {
            return (Some(&trimmed[..=end]), trimmed[end + 1..].trim_start());
        }
    }
    (None, trimmed)
}

fn parse_wkt(body: &str) -> std::result::Result<Geometry<f64>, String> {
    use std::str::FromStr;
    wkt::Wkt::<f64>::from_str(body)
        .map_err(|e| format!("{e:?}"))
        .and_then(|w| w.try_into().map_err(|e: wkt::conversion::Error| format!("{e:?}")))
}

impl RTreeStrategy {
    pub fn new(config: RTreeConfig, saved: Option<&str>) -> Result<Self> {
        let mut state = match saved {
            Some(blob) => serde_json::from_str::<RTreeState>(blob)?,
            None => RTreeState::default(),
        };

        // parent pointers are not serialized; rebuild them from the children
        let links: Vec<(String, String)> = state
            .nodes
            .iter()
            .flat_map(|(key, node)| {
                node.children.iter().filter_map(|child| match child {
                    NodeChild::Node(child_key) => Some((child_key.clone(), key.clone())),
                    NodeChild::Entry { .. } => None,
                })
            })
            .collect();
        for (child, parent) in links {
            if let Some(node) = state.nodes.get_mut(&child) {
                node.parent = Some(parent);
            }
        }

        Ok(Self { config, state })
    }

    fn alloc_key(&mut self) -> String {
        let key = format!("node-{}", self.state.next_node);
        self.state.next_node += 1;
        key
    }

    fn node_bucket(&self, scope: &mut StrategyScope<'_>, key: &str) -> String {
        if key == ROOT_KEY {
            scope.root()
        } else {
            scope.bucket(key)
        }
    }

    /// Rectangle of a node child, resolved through the arena.
    fn child_mbr(&self, child: &NodeChild) -> Mbr {
        match child {
            NodeChild::Entry { mbr, .. } => *mbr,
            NodeChild::Node(key) => self.state.nodes[key].mbr.unwrap_or(Mbr::point(0.0, 0.0)),
        }
    }

    /// Retract the current containment description of `child_key` and emit a
    /// fresh one for `mbr`.
    fn refresh_relation(
        &self,
        scope: &mut StrategyScope<'_>,
        parent_key: &str,
        child_key: &str,
        mbr: Mbr,
    ) {
        let origin = self.node_bucket(scope, parent_key);
        let target = self.node_bucket(scope, child_key);

        if let Some(wkt_path) = &self.config.wkt_path {
            let descriptor = self
                .config
                .wkt_path_descriptor
                .as_deref()
                .unwrap_or(wkt_path);
            scope.remove_relation(&origin, RelationType::GeospatiallyContains, &target);
            scope.add_relation(
                &origin,
                RelationType::GeospatiallyContains,
                &target,
                Some(RelationValue::Text(mbr.to_wkt(self.state.crs.as_deref()))),
                Some(descriptor),
            );
        } else {
            let lat = self.config.lat_path.as_deref().unwrap_or_default();
            let lon = self.config.lon_path.as_deref().unwrap_or_default();
            let lat_descriptor = self.config.lat_path_descriptor.as_deref().unwrap_or(lat);
            let lon_descriptor = self.config.lon_path_descriptor.as_deref().unwrap_or(lon);
            scope.remove_relation(&origin, RelationType::GreaterThanOrEqualTo, &target);
            scope.remove_relation(&origin, RelationType::LessThanOrEqualTo, &target);
            scope.add_relation(
                &origin,
                RelationType::GreaterThanOrEqualTo,
                &target,
                Some(RelationValue::Number(mbr.min_y)),
                Some(lat_descriptor),
            );
            scope.add_relation(
                &origin,
                RelationType::LessThanOrEqualTo,
                &target,
                Some(RelationValue::Number(mbr.max_y)),
                Some(lat_descriptor),
            );
            scope.add_relation(
                &origin,
                RelationType::GreaterThanOrEqualTo,
                &target,
                Some(RelationValue::Number(mbr.min_x)),
                Some(lon_descriptor),
            );
            scope.add_relation(
                &origin,
                RelationType::LessThanOrEqualTo,
                &target,
                Some(RelationValue::Number(mbr.max_x)),
                Some(lon_descriptor),
            );
        }
    }

    /// One rectangle per configured geometry value of `record`.
    fn extract(&mut self, record: &dyn Record) -> Vec<Mbr> {
        let mut rects = Vec::new();
        if let Some(wkt_path) = &self.config.wkt_path {
            for value in record.values(wkt_path) {
                let (crs, body) = split_crs(&value.value);
                match parse_wkt(body).and_then(|geometry| {
                    geometry
                        .bounding_rect()
                        .ok_or_else(|| "geometry has no extent".to_string())
                }) {
                    Ok(rect) => {
                        if self.state.crs.is_none() {
                            self.state.crs = crs.map(str::to_string);
                        }
                        rects.push(Mbr {
                            min_x: rect.min().x,
                            min_y: rect.min().y,
                            max_x: rect.max().x,
                            max_y: rect.max().y,
                        });
                    }
                    Err(error) => warn!(
                        member = record.id(),
                        error = %error,
                        "dropping malformed geometry"
                    ),
                }
            }
        } else if let (Some(lat_path), Some(lon_path)) =
            (&self.config.lat_path, &self.config.lon_path)
        {
            let lats = record.values(lat_path);
            let lons = record.values(lon_path);
            for (lat, lon) in lats.iter().zip(lons.iter()) {
                match (lat.value.parse::<f64>(), lon.value.parse::<f64>()) {
                    (Ok(lat), Ok(lon)) => rects.push(Mbr::point(lon, lat)),
                    _ => warn!(
                        member = record.id(),
                        lat = %lat.value,
                        lon = %lon.value,
                        "dropping unparseable coordinate pair"
                    ),
                }
            }
        }
        rects
    }

    /// Descend from the root picking, per level, the child needing least
    /// enlargement (ties: smaller area). Returns the chosen leaf key.
    fn choose_leaf(&self, mbr: &Mbr) -> String {
        let mut key = ROOT_KEY.to_string();
        loop {
            let node = &self.state.nodes[&key];
            if node.leaf {
                return key;
            }
            let mut best: Option<(String, f64, f64)> = None;
            for child in &node.children {
                if let NodeChild::Node(child_key) = child {
                    let child_mbr = self.child_mbr(child);
                    let grow = child_mbr.enlargement(mbr);
                    let area = child_mbr.area();
                    let better = match &best {
                        None => true,
                        Some((_, best_grow, best_area)) => {
                            grow < *best_grow || (grow == *best_grow && area < *best_area)
                        }
                    };
                    if better {
                        best = Some((child_key.clone(), grow, area));
                    }
                }
            }
            match best {
                Some((child_key, _, _)) => key = child_key,
                // internal node without node children cannot happen: splits
                // always produce two populated groups
                None => return key,
            }
        }
    }

    /// Recompute rectangles from `start` up to the root, re-emitting the
    /// parent relation of every node whose rectangle changed.
    fn adjust_upward(&mut self, scope: &mut StrategyScope<'_>, start: &str) {
        let mut key = start.to_string();
        loop {
            let node = &self.state.nodes[&key];
            let recomputed = node
                .children
                .iter()
                .map(|child| self.child_mbr(child))
                .reduce(|a, b| a.union(&b));
            let parent = node.parent.clone();
            let changed = recomputed != node.mbr;
            if changed {
                if let Some(node) = self.state.nodes.get_mut(&key) {
                    node.mbr = recomputed;
                }
                if let (Some(parent_key), Some(mbr)) = (&parent, recomputed) {
                    self.refresh_relation(scope, parent_key, &key, mbr);
                }
            }
            match parent {
                Some(parent_key) if changed => key = parent_key,
                _ => break,
            }
        }
    }

    /// Split an overfull node. Returns the parent key to continue the
    /// overflow check at, or `None` at the root.
    fn split(&mut self, scope: &mut StrategyScope<'_>, key: &str) -> Option<String> {
        let node = &self.state.nodes[key];
        let leaf = node.leaf;
        let items: Vec<(NodeChild, Mbr)> = node
            .children
            .iter()
            .map(|child| (child.clone(), self.child_mbr(child)))
            .collect();
        let ((group_a, mbr_a), (group_b, mbr_b)) = quadratic_split(items);
        debug!(
            node = %key,
            left = group_a.len(),
            right = group_b.len(),
            "splitting overfull node"
        );

        if key == ROOT_KEY {
            // the root key is the tree's stable entry point: its two groups
            // become two new children
            let key_a = self.alloc_key();
            let key_b = self.alloc_key();
            for (group_key, group) in [(&key_a, &group_a), (&key_b, &group_b)] {
                self.reparent(scope, ROOT_KEY, group_key, group);
            }
            self.state.nodes.insert(
                key_a.clone(),
                SpatialNode {
                    mbr: Some(mbr_a),
                    leaf,
                    children: group_a,
                    parent: Some(ROOT_KEY.to_string()),
                },
            );
            self.state.nodes.insert(
                key_b.clone(),
                SpatialNode {
                    mbr: Some(mbr_b),
                    leaf,
                    children: group_b,
                    parent: Some(ROOT_KEY.to_string()),
                },
            );
            let root = self.state.nodes.get_mut(ROOT_KEY).expect("root exists");
            root.leaf = false;
            root.mbr = Some(mbr_a.union(&mbr_b));
            root.children = vec![NodeChild::Node(key_a.clone()), NodeChild::Node(key_b.clone())];
            self.refresh_relation(scope, ROOT_KEY, &key_a, mbr_a);
            self.refresh_relation(scope, ROOT_KEY, &key_b, mbr_b);
            None
        } else {
            let parent_key = self.state.nodes[key]
                .parent
                .clone()
                .expect("non-root node has a parent");
            let sibling_key = self.alloc_key();
            self.reparent(scope, key, &sibling_key, &group_b);
            {
                let node = self.state.nodes.get_mut(key).expect("node exists");
                node.children = group_a;
                node.mbr = Some(mbr_a);
            }
            self.state.nodes.insert(
                sibling_key.clone(),
                SpatialNode {
                    mbr: Some(mbr_b),
                    leaf,
                    children: group_b,
                    parent: Some(parent_key.clone()),
                },
            );
            self.state
                .nodes
                .get_mut(&parent_key)
                .expect("parent exists")
                .children
                .push(NodeChild::Node(sibling_key.clone()));
            self.refresh_relation(scope, &parent_key, key, mbr_a);
            self.refresh_relation(scope, &parent_key, &sibling_key, mbr_b);
            Some(parent_key)
        }
    }

    /// Point the node children of `group` at `new_parent`, retracting their
    /// containment relations from `old_parent` and re-emitting them from the
    /// new one.
    fn reparent(
        &mut self,
        scope: &mut StrategyScope<'_>,
        old_parent: &str,
        new_parent: &str,
        group: &[NodeChild],
    ) {
        for child in group {
            if let NodeChild::Node(child_key) = child {
                let child_mbr = self.child_mbr(child);
                let old_origin = self.node_bucket(scope, old_parent);
                let target = self.node_bucket(scope, child_key);
                scope.remove_relation(&old_origin, RelationType::GeospatiallyContains, &target);
                scope.remove_relation(&old_origin, RelationType::GreaterThanOrEqualTo, &target);
                scope.remove_relation(&old_origin, RelationType::LessThanOrEqualTo, &target);
                if let Some(node) = self.state.nodes.get_mut(child_key) {
                    node.parent = Some(new_parent.to_string());
                }
                self.refresh_relation(scope, new_parent, child_key, child_mbr);
            }
        }
    }

    /// Insert one rectangle; returns the leaf node key it landed in.
    fn insert(&mut self, scope: &mut StrategyScope<'_>, member: &str, mbr: Mbr) -> String {
        self.state
            .nodes
            .entry(ROOT_KEY.to_string())
            .or_insert_with(SpatialNode::empty_leaf);

        let leaf_key = self.choose_leaf(&mbr);
        self.state
            .nodes
            .get_mut(&leaf_key)
            .expect("chosen leaf exists")
            .children
            .push(NodeChild::Entry {
                member: member.to_string(),
                mbr,
            });
        self.adjust_upward(scope, &leaf_key);

        let mut overfull = Some(leaf_key.clone());
        while let Some(key) = overfull {
            if self.state.nodes[&key].children.len() > self.config.page_size {
                overfull = self.split(scope, &key);
            } else {
                overfull = None;
            }
        }
        leaf_key
    }

    pub fn bucketize(
        &mut self,
        record: &dyn Record,
        scope: &mut StrategyScope<'_>,
    ) -> Result<Vec<String>> {
        let rects = self.extract(record);
        if rects.is_empty() {
            warn!(
                member = record.id(),
                "member yielded no usable geometry; skipping"
            );
            return Ok(vec![]);
        }

        let mut assigned = Vec::new();
        for mbr in rects {
            let leaf_key = self.insert(scope, record.id(), mbr);
            // the leaf may have split after insertion; find the entry again
            let home = self.leaf_of(record.id(), &mbr).unwrap_or(leaf_key);
            let bucket = self.node_bucket(scope, &home);
            if !assigned.contains(&bucket) {
                assigned.push(bucket);
            }
        }
        Ok(assigned)
    }

    /// The leaf currently holding `(member, mbr)`.
    fn leaf_of(&self, member: &str, mbr: &Mbr) -> Option<String> {
        self.state.nodes.iter().find_map(|(key, node)| {
            let held = node.leaf
                && node.children.iter().any(|child| {
                    matches!(child, NodeChild::Entry { member: m, mbr: r } if m == member && r == mbr)
                });
            held.then(|| key.clone())
        })
    }

    pub fn serialize_state(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state)?)
    }

    #[cfg(test)]
    fn invariant_mbrs_contain_descendants(&self) -> bool {
        self.state.nodes.iter().all(|(_, node)| {
            node.children.iter().all(|child| match (node.mbr, child) {
                (Some(mbr), NodeChild::Entry { mbr: entry, .. }) => mbr.contains(entry),
                (Some(mbr), NodeChild::Node(key)) => self.state.nodes[key]
                    .mbr
                    .map(|child_mbr| mbr.contains(&child_mbr))
                    .unwrap_or(false),
                (None, _) => false,
            })
        })
    }
}
