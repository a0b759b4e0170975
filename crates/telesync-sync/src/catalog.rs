//! Metric catalog
//!
//! Static description of every tracked metric, loaded once from a JSON
//! document shaped as `{"metrics": [...]}`. Only `series` entries are plotted
//! and backfilled; their position among the series entries is the trace
//! index the ordered writer works with.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use telesync_core::MetricId;

use crate::{Result, SyncError};

/// Chart axis a series is drawn against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    Y,
    Y2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Numeric, plotted and backfilled
    Series,
    /// Numeric totalizer, shown as a readout only
    Total,
    /// Boolean state such as a level switch
    Indicator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Numeric,
    Boolean,
}

impl MetricKind {
    pub fn value_kind(&self) -> ValueKind {
        match self {
            MetricKind::Indicator => ValueKind::Boolean,
            MetricKind::Series | MetricKind::Total => ValueKind::Numeric,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: MetricId,
    pub name: String,
    pub kind: MetricKind,
    #[serde(default)]
    pub unit: String,
    /// Only meaningful for series
    #[serde(default)]
    pub axis: Axis,
    /// Display slot the readout is rendered into
    #[serde(default)]
    pub readout: Option<String>,
}

impl Metric {
    pub fn series(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::of_kind(id, name, MetricKind::Series)
    }

    pub fn total(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::of_kind(id, name, MetricKind::Total)
    }

    pub fn indicator(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::of_kind(id, name, MetricKind::Indicator)
    }

    fn of_kind(id: impl Into<String>, name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            id: MetricId::new(id),
            name: name.into(),
            kind,
            unit: String::new(),
            axis: Axis::Y,
            readout: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = axis;
        self
    }

    pub fn is_series(&self) -> bool {
        self.kind == MetricKind::Series
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    metrics: Vec<Metric>,
}

#[derive(Debug, Clone)]
pub struct MetricCatalog {
    metrics: Vec<Metric>,
    /// Positions in `metrics` of the series entries, in catalog order
    series: Vec<usize>,
    by_id: HashMap<MetricId, usize>,
}

impl MetricCatalog {
    pub fn new(metrics: Vec<Metric>) -> Result<Self> {
        if metrics.is_empty() {
            return Err(SyncError::InvalidCatalog("catalog has no metrics".into()));
        }

        let mut seen = HashSet::new();
        for metric in &metrics {
            if metric.id.as_str().trim().is_empty() {
                return Err(SyncError::InvalidCatalog(format!(
                    "metric '{}' has an empty id",
                    metric.name
                )));
            }
            if !seen.insert(metric.id.clone()) {
                return Err(SyncError::InvalidCatalog(format!(
                    "duplicate metric id {}",
                    metric.id
                )));
            }
        }

        let series = metrics
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_series())
            .map(|(pos, _)| pos)
            .collect();
        let by_id = metrics
            .iter()
            .enumerate()
            .map(|(pos, m)| (m.id.clone(), pos))
            .collect();

        Ok(Self {
            metrics,
            series,
            by_id,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let document: CatalogDocument =
            serde_json::from_str(raw).map_err(|e| SyncError::InvalidCatalog(e.to_string()))?;
        Self::new(document.metrics)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SyncError::InvalidCatalog(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn get(&self, id: &MetricId) -> Option<&Metric> {
        self.by_id.get(id).map(|&pos| &self.metrics[pos])
    }

    /// Series entries in trace order
    pub fn series(&self) -> impl Iterator<Item = &Metric> + '_ {
        self.series.iter().map(move |&pos| &self.metrics[pos])
    }

    pub fn series_len(&self) -> usize {
        self.series.len()
    }

    pub fn series_at(&self, index: usize) -> Option<&Metric> {
        self.series.get(index).map(|&pos| &self.metrics[pos])
    }

    /// Trace index of a series metric
    pub fn series_index(&self, id: &MetricId) -> Option<usize> {
        let pos = *self.by_id.get(id)?;
        self.series.iter().position(|&p| p == pos)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLANT: &str = r#"{
        "metrics": [
            {"id": "v1", "name": "Inlet flow", "kind": "series", "unit": "m3/h"},
            {"id": "t1", "name": "Inlet total", "kind": "total", "unit": "m3", "readout": "totalInlet"},
            {"id": "v2", "name": "Tank level", "kind": "series", "axis": "y2", "unit": "m"},
            {"id": "i1", "name": "Tank high", "kind": "indicator"}
        ]
    }"#;

    #[test]
    fn test_series_order_skips_other_kinds() {
        let catalog = MetricCatalog::from_json(PLANT).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.series_len(), 2);

        let names: Vec<_> = catalog.series().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Inlet flow", "Tank level"]);
        assert_eq!(catalog.series_index(&MetricId::new("v2")), Some(1));
        assert_eq!(catalog.series_index(&MetricId::new("t1")), None);
        assert_eq!(catalog.series_at(1).map(|m| m.axis), Some(Axis::Y2));
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let catalog = MetricCatalog::from_json(PLANT).unwrap();
        let indicator = catalog.get(&MetricId::new("i1")).unwrap();
        assert_eq!(indicator.unit, "");
        assert_eq!(indicator.readout, None);
        assert_eq!(indicator.kind.value_kind(), ValueKind::Boolean);
        assert_eq!(
            catalog.get(&MetricId::new("t1")).unwrap().readout.as_deref(),
            Some("totalInlet")
        );
    }

    #[test]
    fn test_rejects_empty_catalog() {
        let result = MetricCatalog::from_json(r#"{"metrics": []}"#);
        assert!(matches!(result, Err(SyncError::InvalidCatalog(_))));
    }

    #[test]
    fn test_rejects_duplicate_and_blank_ids() {
        let dup = MetricCatalog::new(vec![Metric::series("a", "A"), Metric::total("a", "A2")]);
        assert!(matches!(dup, Err(SyncError::InvalidCatalog(_))));

        let blank = MetricCatalog::new(vec![Metric::series("  ", "Blank")]);
        assert!(matches!(blank, Err(SyncError::InvalidCatalog(_))));
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let result = MetricCatalog::from_json(
            r#"{"metrics": [{"id": "x", "name": "X", "kind": "gauge"}]}"#,
        );
        assert!(matches!(result, Err(SyncError::InvalidCatalog(_))));
    }
}
