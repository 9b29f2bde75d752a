//! Aggregation of extraction output into the bundle's collections.
//!
//! Pure grouping by the source target's category (already stamped on each
//! fragment by the extractor), with near-duplicate suppression for patterns:
//! same category + whitespace-normalized code text, first occurrence wins.
//! Callers must admit extractions in target-resolution order — fetch results
//! arrive unordered, and output determinism comes from this fan-in step.

use std::collections::HashSet;

use tracing::{debug, warn};

use docscout_shared::ResearchBundle;
use docscout_extractor::Extraction;

/// Counts of what one admission added and dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdmitStats {
    pub patterns_added: usize,
    pub duplicates_dropped: usize,
    pub gotchas_added: usize,
}

/// Admit one document's extraction into the bundle.
///
/// Fragments whose source URL has no `Ok` fetch result in the bundle are
/// rejected.
pub fn admit(bundle: &mut ResearchBundle, extraction: Extraction) -> AdmitStats {
    let mut stats = AdmitStats::default();

    let ok_urls: HashSet<String> = bundle
        .ok_results()
        .map(|r| r.target.url.to_string())
        .collect();

    let mut seen: HashSet<(docscout_shared::Category, String)> = bundle
        .patterns
        .iter()
        .map(|p| (p.category, normalize_code(&p.code_text)))
        .collect();

    for pattern in extraction.patterns {
        if !ok_urls.contains(pattern.source_url.as_str()) {
            warn!(url = %pattern.source_url, "dropping pattern without ok fetch result");
            continue;
        }
        let key = (pattern.category, normalize_code(&pattern.code_text));
        if seen.contains(&key) {
            stats.duplicates_dropped += 1;
            continue;
        }
        seen.insert(key);
        bundle.patterns.push(pattern);
        stats.patterns_added += 1;
    }

    for gotcha in extraction.gotchas {
        if !ok_urls.contains(gotcha.source_url.as_str()) {
            warn!(url = %gotcha.source_url, "dropping gotcha without ok fetch result");
            continue;
        }
        bundle.gotchas.push(gotcha);
        stats.gotchas_added += 1;
    }

    debug!(
        added = stats.patterns_added,
        duplicates = stats.duplicates_dropped,
        gotchas = stats.gotchas_added,
        "extraction admitted"
    );
    stats
}

/// Collapse all whitespace runs so formatting differences don't defeat
/// duplicate detection.
fn normalize_code(code: &str) -> String {
    code.split_whitespace().collect::<Vec<_>>().join(" ")
}
