//! Target resolution: maps a (domain, pattern) request to an ordered,
//! deduplicated set of fetch targets with priority tiers and category tags.
//!
//! Resolution is table-driven (see [`table::TargetTable`]); unrecognized
//! patterns fall back to the critical-tier core-framework set, which is a
//! deliberate degraded-mode policy rather than a failure. Supplemental
//! passes hand back only targets not already resolved in this run.

mod table;

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};
use url::Url;

use docscout_shared::{
    ArchPattern, Category, DocScoutError, FetchTarget, Priority, ResearchRequest, Result,
};

pub use table::{PatternTargets, TargetSpec, TargetTable};

/// Resolves research requests into fetch targets.
pub struct Resolver {
    table: TargetTable,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Resolver over the built-in target table.
    pub fn new() -> Self {
        Self {
            table: TargetTable::builtin(),
        }
    }

    /// Resolver over a custom table (tests, alternative frameworks).
    pub fn with_table(table: TargetTable) -> Self {
        Self { table }
    }

    /// Resolve the initial target set for a request.
    ///
    /// Deduplicated by URL, ordered core → integration → pattern-specific.
    #[instrument(skip(self), fields(domain = %request.domain, pattern = %request.pattern))]
    pub fn resolve(&self, request: &ResearchRequest) -> Result<Vec<FetchTarget>> {
        let mut targets = Vec::new();
        let mut seen = HashSet::new();

        match request.pattern {
            ArchPattern::SimpleCrud | ArchPattern::Unknown => {
                if request.pattern == ArchPattern::Unknown {
                    info!("unrecognized pattern, falling back to core-framework targets");
                }
                self.push_specs(
                    &mut targets,
                    &mut seen,
                    request,
                    Category::CoreFramework,
                    self.table.core.iter().filter(|s| s.priority == Priority::Critical),
                );
            }
            pattern => {
                self.push_specs(
                    &mut targets,
                    &mut seen,
                    request,
                    Category::CoreFramework,
                    self.table.core.iter(),
                );
                self.push_specs(
                    &mut targets,
                    &mut seen,
                    request,
                    Category::Integration,
                    self.table.integration.iter(),
                );
                if let Some(group) = self.table.pattern_specific.get(&pattern) {
                    self.push_specs(
                        &mut targets,
                        &mut seen,
                        request,
                        Category::PatternSpecific,
                        group.seed.iter(),
                    );
                }
            }
        }

        if targets.is_empty() {
            return Err(DocScoutError::config(format!(
                "no fetch targets resolvable for pattern '{}'",
                request.pattern
            )));
        }

        info!(count = targets.len(), "targets resolved");
        Ok(targets)
    }

    /// Resolve supplemental targets for the under-covered categories.
    ///
    /// Returns only targets whose URL is not in `already_resolved`; an empty
    /// result means the table has nothing further to offer and the run must
    /// accept its coverage as final.
    #[instrument(skip(self, already_resolved), fields(pattern = %request.pattern))]
    pub fn supplemental(
        &self,
        request: &ResearchRequest,
        under_covered: &[Category],
        already_resolved: &HashSet<String>,
    ) -> Vec<FetchTarget> {
        let mut targets = Vec::new();
        let mut seen: HashSet<String> = already_resolved.clone();

        for &category in under_covered {
            let specs: Vec<&TargetSpec> = match category {
                Category::CoreFramework => self.table.core_supplemental.iter().collect(),
                Category::Integration => self.table.integration_supplemental.iter().collect(),
                Category::PatternSpecific => self
                    .table
                    .pattern_specific
                    .get(&request.pattern)
                    .map(|g| g.supplemental.iter().collect())
                    .unwrap_or_default(),
            };
            self.push_specs(&mut targets, &mut seen, request, category, specs.into_iter());
        }

        debug!(count = targets.len(), "supplemental targets resolved");
        targets
    }

    fn push_specs<'a>(
        &self,
        targets: &mut Vec<FetchTarget>,
        seen: &mut HashSet<String>,
        request: &ResearchRequest,
        category: Category,
        specs: impl Iterator<Item = &'a TargetSpec>,
    ) {
        for spec in specs {
            let url = match Url::parse(&spec.url) {
                Ok(url) => url,
                Err(e) => {
                    warn!(url = %spec.url, error = %e, "skipping malformed table entry");
                    continue;
                }
            };
            if !seen.insert(url.to_string()) {
                continue;
            }
            targets.push(FetchTarget {
                url,
                category,
                priority: spec.priority,
                origin: request.clone(),
            });
        }
    }
}
