//! Scrape engine.
//!
//! One background task drives the whole pipeline: list projects, publish
//! their status, and for each project that passes the filter resolve a read
//! token, query the occurrence window, and publish item metrics. The
//! [`Scraper`] owns all cross-cycle state (the per-project token cache); a
//! failure anywhere in one project's work aborts only that project for the
//! cycle and evicts its cached token so the next cycle re-resolves from
//! scratch.

use std::collections::HashMap;
use std::time::Duration;

use regex::Regex;
use tokio::time::MissedTickBehavior;

use crate::metrics::ExporterMetrics;
use crate::rollbar::types::{Project, Status};
use crate::rollbar::{ApiError, RollbarClient};

/// Predicate gating which projects get scraped.
///
/// A project qualifies iff it is enabled, its name matches the include
/// pattern and does not match the exclude pattern. Runs before any token
/// resolution or query so filtered projects cost no API calls.
#[derive(Debug, Clone)]
pub struct ProjectFilter {
    include: Regex,
    exclude: Regex,
}

impl ProjectFilter {
    pub fn new(include: Regex, exclude: Regex) -> Self {
        Self { include, exclude }
    }

    /// Whether `project` should be scraped. Skip decisions are logged.
    pub fn allows(&self, project: &Project) -> bool {
        if project.status != Status::Enabled {
            tracing::debug!(
                project_id = project.id,
                project = %project.name,
                "skipping disabled project"
            );
            return false;
        }
        if !self.include.is_match(&project.name) {
            tracing::debug!(
                project_id = project.id,
                project = %project.name,
                pattern = %self.include,
                "skipping project not matching include pattern"
            );
            return false;
        }
        if self.exclude.is_match(&project.name) {
            tracing::debug!(
                project_id = project.id,
                project = %project.name,
                pattern = %self.exclude,
                "skipping project matching exclude pattern"
            );
            return false;
        }
        true
    }
}

/// Drives scrape cycles and owns all cross-cycle state.
///
/// Constructed once at startup; per-project work within a cycle runs
/// strictly sequentially, and nothing here ever terminates the process; a
/// cycle that fails entirely simply waits for the next tick.
pub struct Scraper {
    client: RollbarClient,
    filter: ProjectFilter,
    metrics: ExporterMetrics,
    interval: Duration,
    max_items: i64,
    /// Read token per project id; entries are evicted on any use failure.
    tokens: HashMap<i64, String>,
}

impl Scraper {
    pub fn new(
        client: RollbarClient,
        filter: ProjectFilter,
        metrics: ExporterMetrics,
        interval: Duration,
        max_items: i64,
    ) -> Self {
        Self {
            client,
            filter,
            metrics,
            interval,
            max_items,
            tokens: HashMap::new(),
        }
    }

    /// Run the scrape loop forever: one cycle immediately, then one per
    /// interval tick. Missed ticks are skipped, never queued, so an
    /// overrunning cycle delays the next one instead of piling up.
    pub async fn run(mut self) {
        tracing::info!(interval = ?self.interval, "starting scrape loop");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let started = std::time::Instant::now();
            tracing::info!("scrape cycle starting");
            self.run_cycle().await;
            tracing::info!(elapsed = ?started.elapsed(), "scrape cycle done");
        }
    }

    /// Execute one full scrape cycle over all projects.
    ///
    /// The project status indicator is refreshed for every project the API
    /// returns, before and independent of the filter; only the deeper
    /// token/occurrence/item work is gated.
    pub async fn run_cycle(&mut self) {
        let projects = match self.client.list_projects().await {
            Ok(projects) => projects,
            Err(e) => {
                tracing::error!(error = %e, "listing projects failed, cycle abandoned");
                return;
            }
        };

        for project in &projects {
            self.metrics.set_project_status(project);

            if !self.filter.allows(project) {
                continue;
            }

            if let Err(e) = self.scrape_project(project).await {
                tracing::error!(
                    project_id = project.id,
                    project = %project.name,
                    error = %e,
                    "project scrape failed, evicting cached token"
                );
                self.tokens.remove(&project.id);
            }
        }
    }

    /// Scrape one project: occurrence window, histogram observations, then
    /// item snapshots via one batched lookup.
    async fn scrape_project(&mut self, project: &Project) -> Result<(), ApiError> {
        let token = self.resolve_token(project.id).await?;

        let occurrences = self
            .client
            .item_occurrences(&token, self.interval, self.max_items)
            .await?;

        let mut item_ids: Vec<i64> = Vec::new();
        for occurrence in &occurrences {
            if !item_ids.contains(&occurrence.item_id) {
                item_ids.push(occurrence.item_id);
            }
            self.metrics.observe_occurrences(project.id, occurrence);
        }

        if item_ids.is_empty() {
            tracing::debug!(project_id = project.id, "no occurrences in window");
            return Ok(());
        }

        let items = self.client.list_items_with_ids(&token, &item_ids).await?;
        for item in &items {
            self.metrics.set_item_status(item);
            self.metrics.set_total_occurrences(project.id, item);
        }

        tracing::debug!(
            project_id = project.id,
            occurrences = occurrences.len(),
            items = items.len(),
            "project scraped"
        );
        Ok(())
    }

    /// Resolve a read token for a project, using the cache when possible.
    ///
    /// A cache entry exists only if it was resolved successfully before and
    /// has not been evicted by a failure since.
    async fn resolve_token(&mut self, project_id: i64) -> Result<String, ApiError> {
        if let Some(token) = self.tokens.get(&project_id) {
            return Ok(token.clone());
        }
        let token = self.client.get_or_create_read_token(project_id).await?;
        self.tokens.insert(project_id, token.access_token.clone());
        Ok(token.access_token)
    }

    /// Cached read token for a project, if any. Used by tests to observe
    /// cache eviction.
    pub fn cached_token(&self, project_id: i64) -> Option<&str> {
        self.tokens.get(&project_id).map(String::as_str)
    }
}
