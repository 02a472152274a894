//! Exported metric series.
//!
//! All series live on an explicitly injected [`Registry`] shared between the
//! scrape task (writes) and the exposition endpoint (reads); the prometheus
//! primitives synchronize access internally. Aggregation semantics per
//! series:
//!
//! - `project_status` / `item_status`: gauges pinned to 1, carrying entity
//!   attributes as labels; re-set every cycle, so series that drop out of the
//!   scrape window keep their last-published labels until restart
//! - `item_occurrences`: histogram of per-window occurrence counts, labeled
//!   minimally to keep cardinality low
//! - `item_total_occurrences`: gauge mirroring the upstream cumulative
//!   count exactly, so restarts and missed cycles cannot introduce drift

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::rollbar::types::{Item, ItemOccurrence, Project};

/// Handles to the exporter's metric series.
#[derive(Debug, Clone)]
pub struct ExporterMetrics {
    project_status: IntGaugeVec,
    item_status: IntGaugeVec,
    item_occurrences: HistogramVec,
    item_total_occurrences: IntGaugeVec,
}

impl ExporterMetrics {
    /// Create all series and register them on `registry`.
    ///
    /// # Errors
    /// Returns `prometheus::Error` if a series name is already registered.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let project_status = IntGaugeVec::new(
            Opts::new("project_status", "Status of a project, value is always 1"),
            &["project_id", "name", "account_id", "status"],
        )?;

        let item_status = IntGaugeVec::new(
            Opts::new("item_status", "Status of an item, value is always 1"),
            &[
                "item_id",
                "title",
                "project_id",
                "counter_id",
                "environment",
                "platform",
                "framework",
                "hash",
                "status",
                "level",
            ],
        )?;

        let item_occurrences = HistogramVec::new(
            HistogramOpts::new(
                "item_occurrences",
                "Histogram of per-cycle item occurrence counts",
            ),
            &["project_id", "item_id"],
        )?;

        let item_total_occurrences = IntGaugeVec::new(
            Opts::new(
                "item_total_occurrences",
                "Cumulative lifetime occurrence count of an item",
            ),
            &["project_id", "item_id"],
        )?;

        registry.register(Box::new(project_status.clone()))?;
        registry.register(Box::new(item_status.clone()))?;
        registry.register(Box::new(item_occurrences.clone()))?;
        registry.register(Box::new(item_total_occurrences.clone()))?;

        Ok(Self {
            project_status,
            item_status,
            item_occurrences,
            item_total_occurrences,
        })
    }

    /// Refresh the status indicator of a project.
    pub fn set_project_status(&self, project: &Project) {
        self.project_status
            .with_label_values(&[
                &project.id.to_string(),
                &project.name,
                &project.account_id.to_string(),
                project.status.as_ref(),
            ])
            .set(1);
    }

    /// Refresh the status indicator of an item.
    pub fn set_item_status(&self, item: &Item) {
        self.item_status
            .with_label_values(&[
                &item.id.to_string(),
                &item.title,
                &item.project_id.to_string(),
                &item.counter_id.to_string(),
                &item.environment,
                &item.platform,
                &item.framework,
                &item.hash,
                &item.status,
                &item.level,
            ])
            .set(1);
    }

    /// Record one observation of an item's per-window occurrence count.
    pub fn observe_occurrences(&self, project_id: i64, occurrence: &ItemOccurrence) {
        self.item_occurrences
            .with_label_values(&[&project_id.to_string(), &occurrence.item_id.to_string()])
            .observe(occurrence.occurrence_count as f64);
    }

    /// Mirror the upstream cumulative occurrence count of an item.
    pub fn set_total_occurrences(&self, project_id: i64, item: &Item) {
        self.item_total_occurrences
            .with_label_values(&[&project_id.to_string(), &item.id.to_string()])
            .set(item.total_occurrences);
    }
}

/// Render all registered series in the Prometheus text exposition format.
///
/// # Errors
/// Returns `prometheus::Error` if encoding fails.
pub fn render(registry: &Registry) -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
