use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::Serialize;
use tracing::debug;

use telemetry_core::{Clock, MetricMetadata, MetricType, SystemClock, TelemetryError, TelemetryResult};

pub const DEFAULT_CATEGORY: &str = "default";

#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    pub unit: String,
    pub labels: Vec<String>,
    /// Falls back to the registry's default category when `None`.
    pub category: Option<String>,
    pub tags: Vec<String>,
}

/// Partial metadata change; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdate {
    pub description: Option<String>,
    pub unit: Option<String>,
    pub labels: Option<Vec<String>>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Conjunctive filter. Every tag and label listed must be present.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub name: Option<String>,
    pub metric_type: Option<MetricType>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub labels: Vec<String>,
}

impl MetadataFilter {
    fn matches(&self, metadata: &MetricMetadata) -> bool {
        if self.name.as_deref().is_some_and(|name| name != metadata.name) {
            return false;
        }
        if self.metric_type.is_some_and(|t| t != metadata.metric_type) {
            return false;
        }
        if self
            .category
            .as_deref()
            .is_some_and(|category| category != metadata.category)
        {
            return false;
        }
        self.tags.iter().all(|tag| metadata.has_tag(tag))
            && self.labels.iter().all(|label| metadata.has_label(label))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Type,
    Category,
    RegisteredAt,
    LastUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct MetadataQuery {
    pub filter: MetadataFilter,
    pub sort_by: Option<SortField>,
    pub sort_order: SortOrder,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStats {
    pub total_metrics: usize,
    pub by_type: BTreeMap<MetricType, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub total_categories: usize,
    pub total_tags: usize,
}

/// Descriptive metadata for metrics, with category and tag indices.
pub struct MetricRegistry {
    entries: HashMap<String, MetricMetadata>,
    order: Vec<String>,
    by_category: HashMap<String, BTreeSet<String>>,
    by_tag: HashMap<String, BTreeSet<String>>,
    default_category: String,
    clock: Arc<dyn Clock>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            by_category: HashMap::new(),
            by_tag: HashMap::new(),
            default_category: DEFAULT_CATEGORY.to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_default_category(mut self, category: impl Into<String>) -> Self {
        self.default_category = category.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    pub fn register(
        &mut self,
        name: &str,
        metric_type: MetricType,
        description: &str,
        options: RegisterOptions,
    ) -> TelemetryResult<()> {
        if self.entries.contains_key(name) {
            return Err(TelemetryError::duplicate(name));
        }

        let now = self.now();
        let metadata = MetricMetadata {
            name: name.to_string(),
            metric_type,
            description: description.to_string(),
            unit: options.unit,
            labels: options.labels,
            category: options
                .category
                .unwrap_or_else(|| self.default_category.clone()),
            tags: dedup(options.tags),
            registered_at: now,
            last_updated: now,
        };

        self.index(&metadata);
        self.order.push(metadata.name.clone());
        debug!(metric_name = name, category = %metadata.category, "Metadata registered");
        self.entries.insert(metadata.name.clone(), metadata);
        Ok(())
    }

    pub fn update(&mut self, name: &str, update: MetadataUpdate) -> TelemetryResult<()> {
        let now = self.now();
        let mut metadata = self
            .entries
            .remove(name)
            .ok_or_else(|| TelemetryError::not_found(name))?;

        self.unindex(&metadata);
        if let Some(description) = update.description {
            metadata.description = description;
        }
        if let Some(unit) = update.unit {
            metadata.unit = unit;
        }
        if let Some(labels) = update.labels {
            metadata.labels = labels;
        }
        if let Some(category) = update.category {
            metadata.category = category;
        }
        if let Some(tags) = update.tags {
            metadata.tags = dedup(tags);
        }
        metadata.last_updated = now;
        self.index(&metadata);
        self.entries.insert(name.to_string(), metadata);
        Ok(())
    }

    /// Removes `name` from the registry and every index. Returns whether it existed.
    pub fn unregister(&mut self, name: &str) -> bool {
        match self.entries.remove(name) {
            Some(metadata) => {
                self.unindex(&metadata);
                self.order.retain(|n| n != name);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetricMetadata> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All metadata in registration order.
    pub fn get_all(&self) -> Vec<&MetricMetadata> {
        self.order.iter().filter_map(|n| self.entries.get(n)).collect()
    }

    pub fn query(&self, query: &MetadataQuery) -> Vec<MetricMetadata> {
        let mut results: Vec<&MetricMetadata> = self
            .get_all()
            .into_iter()
            .filter(|metadata| query.filter.matches(metadata))
            .collect();

        if let Some(field) = query.sort_by {
            // sort_by is stable, so ties keep registration order
            results.sort_by(|a, b| {
                let ordering = compare_by(field, a, b);
                match query.sort_order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        let page = results.into_iter().skip(query.offset);
        match query.limit {
            Some(limit) => page.take(limit).cloned().collect(),
            None => page.cloned().collect(),
        }
    }

    pub fn get_by_category(&self, category: &str) -> Vec<&MetricMetadata> {
        self.lookup(self.by_category.get(category))
    }

    pub fn get_by_tag(&self, tag: &str) -> Vec<&MetricMetadata> {
        self.lookup(self.by_tag.get(tag))
    }

    pub fn get_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self.by_category.keys().cloned().collect();
        categories.sort();
        categories
    }

    pub fn get_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.by_tag.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Case-insensitive regex match against name or description.
    pub fn search(&self, pattern: &str) -> TelemetryResult<Vec<&MetricMetadata>> {
        let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(self
            .get_all()
            .into_iter()
            .filter(|m| regex.is_match(&m.name) || regex.is_match(&m.description))
            .collect())
    }

    pub fn get_stats(&self) -> RegistryStats {
        let mut by_type = BTreeMap::new();
        let mut by_category = BTreeMap::new();
        for metadata in self.entries.values() {
            *by_type.entry(metadata.metric_type).or_insert(0) += 1;
            *by_category.entry(metadata.category.clone()).or_insert(0) += 1;
        }
        RegistryStats {
            total_metrics: self.entries.len(),
            by_type,
            by_category,
            total_categories: self.by_category.len(),
            total_tags: self.by_tag.len(),
        }
    }

    /// Flat JSON array of every entry, in registration order.
    pub fn to_json(&self) -> TelemetryResult<String> {
        Ok(serde_json::to_string_pretty(&self.get_all())?)
    }

    /// Replaces the registry contents with the entries in `json`.
    pub fn from_json(&mut self, json: &str) -> TelemetryResult<usize> {
        let imported: Vec<MetricMetadata> = serde_json::from_str(json)?;

        let mut seen = BTreeSet::new();
        if let Some(dup) = imported.iter().find(|m| !seen.insert(m.name.as_str())) {
            return Err(TelemetryError::duplicate(dup.name.clone()));
        }

        self.clear();
        let count = imported.len();
        for metadata in imported {
            self.index(&metadata);
            self.order.push(metadata.name.clone());
            self.entries.insert(metadata.name.clone(), metadata);
        }
        debug!(count, "Registry imported");
        Ok(count)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.by_category.clear();
        self.by_tag.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.now_millis()).unwrap_or_else(Utc::now)
    }

    fn lookup(&self, names: Option<&BTreeSet<String>>) -> Vec<&MetricMetadata> {
        match names {
            Some(names) => self
                .order
                .iter()
                .filter(|n| names.contains(*n))
                .filter_map(|n| self.entries.get(n))
                .collect(),
            None => Vec::new(),
        }
    }

    fn index(&mut self, metadata: &MetricMetadata) {
        self.by_category
            .entry(metadata.category.clone())
            .or_default()
            .insert(metadata.name.clone());
        for tag in &metadata.tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(metadata.name.clone());
        }
    }

    fn unindex(&mut self, metadata: &MetricMetadata) {
        remove_from_index(&mut self.by_category, &metadata.category, &metadata.name);
        for tag in &metadata.tags {
            remove_from_index(&mut self.by_tag, tag, &metadata.name);
        }
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_from_index(index: &mut HashMap<String, BTreeSet<String>>, key: &str, name: &str) {
    if let Some(names) = index.get_mut(key) {
        names.remove(name);
        if names.is_empty() {
            index.remove(key);
        }
    }
}

fn compare_by(field: SortField, a: &MetricMetadata, b: &MetricMetadata) -> Ordering {
    match field {
        SortField::Name => a.name.cmp(&b.name),
        SortField::Type => a.metric_type.as_str().cmp(b.metric_type.as_str()),
        SortField::Category => a.category.cmp(&b.category),
        SortField::RegisteredAt => a.registered_at.cmp(&b.registered_at),
        SortField::LastUpdated => a.last_updated.cmp(&b.last_updated),
    }
}

fn dedup(tags: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tags.into_iter().filter(|t| seen.insert(t.clone())).collect()
}
