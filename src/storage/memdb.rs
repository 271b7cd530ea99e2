//! In-memory series index for one bucket.
//!
//! Series get dense ids on first write. Every `key=value` pair of a series
//! (including the `_m` measurement and `_f` field pseudo-tags) has a posting
//! list of series ids, so predicates evaluate as bitmap algebra. Per series we
//! keep the sorted timestamps that were written, which is all a cardinality
//! query needs to test time-range membership.

use super::line_protocol::{SeriesDataType, SeriesPoint};
use crate::proto::{node, Node, Predicate, TimestampRange, TAG_KEY_FIELD, TAG_KEY_MEASUREMENT};
use crate::predicate::{FIELD_IDENT, MEASUREMENT_IDENT};
use crate::{Error, Result};

use regex::Regex;
use roaring::RoaringTreemap;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Default)]
pub struct MemDb {
    series_data: HashMap<u64, SeriesBuffer>,
    series_map: SeriesMap,
}

#[derive(Default)]
struct SeriesBuffer {
    /// Sorted ascending; duplicates collapse.
    times: Vec<i64>,
}

impl SeriesBuffer {
    fn insert(&mut self, time: i64) -> bool {
        match self.times.binary_search(&time) {
            Ok(_) => false,
            Err(pos) => {
                self.times.insert(pos, time);
                true
            }
        }
    }

    fn has_point_in(&self, range: &TimestampRange) -> bool {
        let first = self.times.partition_point(|t| *t < range.start);
        self.times.get(first).is_some_and(|t| *t < range.end)
    }
}

#[derive(Default)]
struct SeriesMap {
    current_size: usize,
    last_id: u64,
    series_key_to_id: HashMap<String, u64>,
    series_id_to_key_and_type: HashMap<u64, (String, SeriesDataType)>,
    tag_keys: BTreeMap<String, BTreeSet<String>>,
    posting_list: HashMap<Vec<u8>, RoaringTreemap>,
    all_series: RoaringTreemap,
}

impl SeriesMap {
    /// The key is held twice: once in each direction of the id map.
    const SERIES_KEY_COPIES: usize = 2;
    /// Rough bytes for the copies of a series id across the maps.
    const SERIES_ID_BYTES: usize = 24;

    fn lookup(&self, key: &str) -> Option<(u64, SeriesDataType)> {
        let id = *self.series_key_to_id.get(key)?;
        self.series_id_to_key_and_type
            .get(&id)
            .map(|(_, data_type)| (id, *data_type))
    }

    fn insert_series(&mut self, point: &SeriesPoint, key: String) -> u64 {
        self.last_id += 1;
        let id = self.last_id;

        self.current_size += key.len() * Self::SERIES_KEY_COPIES + Self::SERIES_ID_BYTES;
        self.series_key_to_id.insert(key.clone(), id);
        self.series_id_to_key_and_type
            .insert(id, (key, point.value.data_type()));
        self.all_series.insert(id);

        for (tag_key, tag_value) in point.key.index_pairs() {
            let list_key = list_key(tag_key, tag_value);
            self.current_size += list_key.len() + tag_key.len() + tag_value.len();
            self.posting_list
                .entry(list_key)
                .or_insert_with(RoaringTreemap::new)
                .insert(id);
            self.tag_keys
                .entry(tag_key.to_string())
                .or_default()
                .insert(tag_value.to_string());
        }

        id
    }

    fn posting_list_for_key_value(&self, key: &str, value: &str) -> RoaringTreemap {
        self.posting_list
            .get(&list_key(key, value))
            .cloned()
            .unwrap_or_default()
    }

    /// Union of the posting lists of every value of `key` accepted by `keep`.
    fn posting_list_for_values<F>(&self, key: &str, mut keep: F) -> RoaringTreemap
    where
        F: FnMut(&str) -> bool,
    {
        let mut ids = RoaringTreemap::new();
        if let Some(values) = self.tag_keys.get(key) {
            for value in values.iter().filter(|v| keep(v.as_str())) {
                if let Some(list) = self.posting_list.get(&list_key(key, value)) {
                    ids |= list;
                }
            }
        }
        ids
    }
}

fn list_key(key: &str, value: &str) -> Vec<u8> {
    let mut list_key = key.as_bytes().to_vec();
    list_key.push(0);
    list_key.extend_from_slice(value.as_bytes());
    list_key
}

/// Outcome of a write into a [`MemDb`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub points: usize,
    pub new_series: usize,
}

impl MemDb {
    pub fn new() -> Self {
        Default::default()
    }

    /// Estimated bytes held by the index.
    pub fn size(&self) -> usize {
        let data: usize = self
            .series_data
            .values()
            .map(|b| b.times.len() * std::mem::size_of::<i64>())
            .sum();
        data + self.series_map.current_size
    }

    pub fn series_count(&self) -> u64 {
        self.series_map.all_series.len()
    }

    /// Write points. The batch is checked for field type conflicts first and
    /// rejected as a whole, so a failed write leaves the index untouched.
    pub fn write(&mut self, points: &[SeriesPoint]) -> Result<WriteStats> {
        let keys: Vec<String> = points.iter().map(|p| p.key.to_key_string()).collect();

        let mut batch_types: HashMap<&str, SeriesDataType> = HashMap::new();
        for (point, key) in points.iter().zip(&keys) {
            let attempted = point.value.data_type();
            let existing = self
                .series_map
                .lookup(key)
                .map(|(_, t)| t)
                .or_else(|| batch_types.get(key.as_str()).copied());
            match existing {
                Some(existing) if existing != attempted => {
                    return Err(Error::FieldTypeConflict {
                        series: key.clone(),
                        existing: existing.as_str(),
                        attempted: attempted.as_str(),
                    });
                }
                Some(_) => {}
                None => {
                    batch_types.insert(key.as_str(), attempted);
                }
            }
        }

        drop(batch_types);

        let mut stats = WriteStats::default();
        for (point, key) in points.iter().zip(keys) {
            let id = match self.series_map.lookup(&key) {
                Some((id, _)) => id,
                None => {
                    stats.new_series += 1;
                    self.series_map.insert_series(point, key)
                }
            };
            if self.series_data.entry(id).or_default().insert(point.time) {
                stats.points += 1;
            }
        }

        Ok(stats)
    }

    /// Count distinct series matching `predicate` with at least one point in
    /// `[range.start, range.end)`. A missing predicate, or one without a
    /// root, matches every series.
    pub fn series_cardinality(
        &self,
        range: &TimestampRange,
        predicate: Option<&Predicate>,
    ) -> Result<u64> {
        let candidates = match predicate.and_then(|p| p.root.as_ref()) {
            Some(root) => evaluate_node(&self.series_map, root)?,
            None => self.series_map.all_series.clone(),
        };

        let count = candidates
            .iter()
            .filter(|id| {
                self.series_data
                    .get(id)
                    .is_some_and(|buffer| buffer.has_point_in(range))
            })
            .count();
        Ok(count as u64)
    }

    pub fn tag_keys(&self) -> impl Iterator<Item = &str> {
        self.series_map.tag_keys.keys().map(String::as_str)
    }

    pub fn tag_values(&self, key: &str) -> impl Iterator<Item = &str> {
        self.series_map
            .tag_keys
            .get(key)
            .into_iter()
            .flat_map(|values| values.iter().map(String::as_str))
    }
}

fn evaluate_node(series_map: &SeriesMap, n: &Node) -> Result<RoaringTreemap> {
    match &n.value {
        Some(node::Value::Logical(op)) => {
            let op = node::Logical::try_from(*op)
                .map_err(|_| Error::Predicate(format!("unknown logical operator {}", op)))?;
            let mut children = n.children.iter();
            let first = children
                .next()
                .ok_or_else(|| Error::Predicate("logical expression has no operands".to_string()))?;
            let mut acc = evaluate_node(series_map, first)?;
            for child in children {
                let ids = evaluate_node(series_map, child)?;
                match op {
                    node::Logical::And => acc &= ids,
                    node::Logical::Or => acc |= ids,
                }
            }
            Ok(acc)
        }
        Some(node::Value::Comparison(op)) => evaluate_comparison(series_map, *op, &n.children),
        None if n.node_type == node::Type::ParenExpression as i32 => match n.children.as_slice() {
            [inner] => evaluate_node(series_map, inner),
            _ => Err(Error::Predicate(
                "parenthesized expression must have exactly one child".to_string(),
            )),
        },
        _ => Err(Error::Predicate(format!(
            "node of type {} is not a boolean expression",
            n.node_type
        ))),
    }
}

fn evaluate_comparison(series_map: &SeriesMap, op: i32, children: &[Node]) -> Result<RoaringTreemap> {
    let op = node::Comparison::try_from(op)
        .map_err(|_| Error::Predicate(format!("unknown comparison operator {}", op)))?;
    let [left, right] = children else {
        return Err(Error::Predicate(
            "comparison must have exactly two operands".to_string(),
        ));
    };

    let key = match &left.value {
        Some(node::Value::TagRefValue(bytes)) => tag_key_name(bytes)?,
        Some(node::Value::FieldRefValue(_)) => {
            return Err(Error::Predicate(
                "comparisons on field values are not supported".to_string(),
            ))
        }
        _ => {
            return Err(Error::Predicate(
                "left side of a comparison must be a tag reference".to_string(),
            ))
        }
    };

    match (op, &right.value) {
        (node::Comparison::Equal, Some(node::Value::StringValue(value))) => {
            Ok(series_map.posting_list_for_key_value(key, value))
        }
        (node::Comparison::NotEqual, Some(node::Value::StringValue(value))) => {
            Ok(&series_map.all_series - &series_map.posting_list_for_key_value(key, value))
        }
        (node::Comparison::StartsWith, Some(node::Value::StringValue(prefix))) => {
            Ok(series_map.posting_list_for_values(key, |v| v.starts_with(prefix.as_str())))
        }
        (node::Comparison::Regex, Some(node::Value::RegexValue(pattern))) => {
            let re = Regex::new(pattern)?;
            Ok(series_map.posting_list_for_values(key, |v| re.is_match(v)))
        }
        (node::Comparison::NotRegex, Some(node::Value::RegexValue(pattern))) => {
            let re = Regex::new(pattern)?;
            let matching = series_map.posting_list_for_values(key, |v| re.is_match(v));
            Ok(&series_map.all_series - &matching)
        }
        (op, _) => Err(Error::Predicate(format!(
            "unsupported comparison {:?} for tag '{}'",
            op, key
        ))),
    }
}

fn tag_key_name(bytes: &[u8]) -> Result<&str> {
    match bytes {
        TAG_KEY_MEASUREMENT => Ok(MEASUREMENT_IDENT),
        TAG_KEY_FIELD => Ok(FIELD_IDENT),
        other => std::str::from_utf8(other)
            .map_err(|_| Error::Predicate("tag key is not valid UTF-8".to_string())),
    }
}
