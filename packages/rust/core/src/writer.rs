//! Bundle writer: serializes a validated research bundle into a
//! deterministic, category-partitioned artifact tree.
//!
//! Layout under the output directory:
//!
//! ```text
//! <out>/
//! ├── summary.json        status, scores, missing areas, artifact hashes
//! ├── coverage.json       machine-readable category → score map for gating
//! └── research/
//!     ├── core-framework.md
//!     ├── integration.md
//!     └── pattern-specific.md
//! ```
//!
//! Writes are atomic (temp file + rename) and idempotent: the same bundle
//! written twice produces byte-identical output apart from the
//! `run_id`/`generated_at` header fields in summary.json.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use docscout_shared::{
    BundleStatus, Category, CategoryCoverage, CoverageReport, CURRENT_SCHEMA_VERSION,
    DocScoutError, ResearchBundle, Result,
};

/// Output from a successful bundle write.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// Absolute path of the bundle directory.
    pub bundle_dir: PathBuf,
    /// Relative paths of all files written.
    pub files: Vec<String>,
}

/// Metadata for a single written artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

#[derive(Serialize)]
struct FetchStats {
    ok: usize,
    failed: usize,
    cache_hits: usize,
}

#[derive(Serialize)]
struct MissingArea<'a> {
    category: Category,
    missing_signals: &'a [String],
}

#[derive(Serialize)]
struct SummaryDoc<'a> {
    schema_version: u32,
    run_id: String,
    generated_at: String,
    domain: &'a str,
    pattern: &'a str,
    status: BundleStatus,
    overall_score: f64,
    supplemental_passes: u32,
    targets_resolved: usize,
    fetch: FetchStats,
    categories: &'a [CategoryCoverage],
    /// Why the bundle is incomplete, named per category. Empty when complete.
    missing_areas: Vec<MissingArea<'a>>,
    artifacts: Vec<ArtifactMeta>,
}

#[derive(Serialize)]
struct CoverageDoc {
    status: BundleStatus,
    overall_score: f64,
    categories: BTreeMap<String, f64>,
}

/// Write the bundle's artifact tree under `out_dir`.
///
/// The bundle must already carry a coverage report.
#[instrument(skip_all, fields(run_id = %bundle.run_id, out = %out_dir.display()))]
pub fn write_bundle(bundle: &ResearchBundle, out_dir: &Path) -> Result<WriteResult> {
    let coverage = bundle
        .coverage
        .as_ref()
        .ok_or_else(|| DocScoutError::validation("bundle has no coverage report"))?;

    let research_dir = out_dir.join("research");
    std::fs::create_dir_all(&research_dir).map_err(|e| DocScoutError::io(&research_dir, e))?;

    let mut artifacts: Vec<ArtifactMeta> = Vec::new();
    let mut files: Vec<String> = Vec::new();

    // One research file per resolved category
    for category in bundle.resolved_categories() {
        let content = render_category(bundle, coverage, category);
        let filename = format!("{}.md", category.slug());
        write_atomic(&research_dir.join(&filename), &content)?;

        let rel = format!("research/{filename}");
        artifacts.push(artifact_meta(&rel, &content));
        files.push(rel);
    }

    // Machine-readable coverage report for downstream gating
    let coverage_doc = CoverageDoc {
        status: coverage.status,
        overall_score: coverage.overall_score,
        categories: coverage
            .categories
            .iter()
            .map(|c| (c.category.slug().to_string(), c.score))
            .collect(),
    };
    let coverage_json = to_json(&coverage_doc)?;
    write_atomic(&out_dir.join("coverage.json"), &coverage_json)?;
    artifacts.push(artifact_meta("coverage.json", &coverage_json));
    files.push("coverage.json".into());

    // Summary last: it carries the hashes of everything else
    let summary = SummaryDoc {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id: bundle.run_id.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        domain: &bundle.request.domain,
        pattern: bundle.request.pattern.name(),
        status: coverage.status,
        overall_score: coverage.overall_score,
        supplemental_passes: bundle.supplemental_passes,
        targets_resolved: bundle.targets.len(),
        fetch: FetchStats {
            ok: bundle.fetch_results.iter().filter(|r| r.is_ok()).count(),
            failed: bundle.fetch_results.iter().filter(|r| !r.is_ok()).count(),
            cache_hits: bundle.fetch_results.iter().filter(|r| r.from_cache).count(),
        },
        categories: &coverage.categories,
        missing_areas: coverage
            .categories
            .iter()
            .filter(|c| !c.missing_signals.is_empty())
            .map(|c| MissingArea {
                category: c.category,
                missing_signals: &c.missing_signals,
            })
            .collect(),
        artifacts,
    };
    let summary_json = to_json(&summary)?;
    write_atomic(&out_dir.join("summary.json"), &summary_json)?;
    files.push("summary.json".into());

    info!(
        files = files.len(),
        status = %coverage.status,
        "bundle written"
    );

    Ok(WriteResult {
        bundle_dir: out_dir.to_path_buf(),
        files,
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render one category's patterns and gotchas as Markdown.
fn render_category(
    bundle: &ResearchBundle,
    coverage: &CoverageReport,
    category: Category,
) -> String {
    let mut md = String::new();

    let _ = writeln!(md, "# {} Research", category.title());
    let _ = writeln!(md);
    let _ = writeln!(md, "- Category: `{}`", category.slug());
    if let Some(cov) = coverage.category(category) {
        let _ = writeln!(md, "- Coverage score: {:.2}", cov.score);
        if !cov.missing_signals.is_empty() {
            let _ = writeln!(md, "- Missing signals: {}", cov.missing_signals.join(", "));
        }
    }
    let _ = writeln!(md);

    let patterns: Vec<_> = bundle
        .patterns
        .iter()
        .filter(|p| p.category == category)
        .collect();
    let _ = writeln!(md, "## Patterns");
    let _ = writeln!(md);
    if patterns.is_empty() {
        let _ = writeln!(md, "_No patterns extracted._");
        let _ = writeln!(md);
    }
    for (i, pattern) in patterns.iter().enumerate() {
        let title = if pattern.description.is_empty() {
            "(no description)"
        } else {
            &pattern.description
        };
        let _ = writeln!(md, "### {}. {title}", i + 1);
        let _ = writeln!(md);
        let _ = writeln!(md, "- Source: <{}>", pattern.source_url);
        let _ = writeln!(md, "- Kind: {}", match pattern.kind {
            docscout_shared::PatternKind::Snippet => "snippet",
            docscout_shared::PatternKind::Example => "example",
        });
        let _ = writeln!(md);
        let _ = writeln!(md, "```{}", pattern.language.as_deref().unwrap_or(""));
        let _ = writeln!(md, "{}", pattern.code_text);
        let _ = writeln!(md, "```");
        let _ = writeln!(md);
    }

    let gotchas: Vec<_> = bundle
        .gotchas
        .iter()
        .filter(|g| g.category == category)
        .collect();
    let _ = writeln!(md, "## Gotchas");
    let _ = writeln!(md);
    if gotchas.is_empty() {
        let _ = writeln!(md, "_No gotchas identified._");
        let _ = writeln!(md);
    }
    for (i, gotcha) in gotchas.iter().enumerate() {
        let _ = writeln!(md, "{}. **{}**", i + 1, gotcha.warning_text);
        if let Some(context) = &gotcha.nearby_context {
            let _ = writeln!(md, "   - Context: {context}");
        }
        let _ = writeln!(md, "   - Source: <{}>", gotcha.source_url);
    }

    md
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value)
        .map_err(|e| DocScoutError::validation(format!("serialization failed: {e}")))?;
    json.push('\n');
    Ok(json)
}

/// Write a file atomically: temp file in the same directory, then rename.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| DocScoutError::validation(format!("no parent for {}", path.display())))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| DocScoutError::validation(format!("bad file name {}", path.display())))?;

    let temp = parent.join(format!(".{filename}.tmp"));
    std::fs::write(&temp, content).map_err(|e| DocScoutError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| DocScoutError::io(path, e))?;

    debug!(file = %path.display(), size = content.len(), "wrote artifact");
    Ok(())
}

fn artifact_meta(filename: &str, content: &str) -> ArtifactMeta {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    ArtifactMeta {
        filename: filename.to_string(),
        sha256: format!("{:x}", hasher.finalize()),
        size_bytes: content.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate;
    use chrono::Utc;
    use docscout_shared::{
        ArchPattern, ExtractedPattern, FetchResult, FetchStatus, FetchTarget, Gotcha,
        PatternKind, Priority, ResearchRequest, ValidationConfig,
    };
    use url::Url;

    fn test_bundle() -> ResearchBundle {
        let request = ResearchRequest {
            domain: "contact-manager".into(),
            pattern: ArchPattern::SimpleCrud,
        };
        let mut bundle = ResearchBundle::new(request.clone());

        for area in ["data", "auth", "storage"] {
            let url = format!("https://docs.example.com/{area}/setup/");
            let target = FetchTarget {
                url: Url::parse(&url).unwrap(),
                category: Category::CoreFramework,
                priority: Priority::Critical,
                origin: request.clone(),
            };
            bundle.targets.push(target.clone());
            bundle.fetch_results.push(FetchResult {
                target,
                status: FetchStatus::Ok,
                raw_content: Some(String::new()),
                fetched_at: Utc::now(),
                attempt_count: 1,
                error_detail: None,
                from_cache: false,
            });
            bundle.patterns.push(ExtractedPattern {
                source_url: url.clone(),
                code_text: format!("const {area} = define();\nexport default {area};"),
                description: format!("Example setup for {area}:"),
                language: Some("ts".into()),
                kind: PatternKind::Example,
                category: Category::CoreFramework,
            });
            bundle.gotchas.push(Gotcha {
                source_url: url,
                warning_text: format!("Warning: configure {area} before deploying."),
                nearby_context: None,
                category: Category::CoreFramework,
            });
        }

        bundle.coverage = Some(validate::validate(&bundle, &ValidationConfig::default()));
        bundle
    }

    fn temp_out() -> PathBuf {
        std::env::temp_dir().join(format!("docscout-writer-{}", uuid::Uuid::now_v7()))
    }

    #[test]
    fn writes_expected_layout() {
        let bundle = test_bundle();
        let out = temp_out();

        let result = write_bundle(&bundle, &out).expect("write");

        assert!(out.join("summary.json").exists());
        assert!(out.join("coverage.json").exists());
        assert!(out.join("research/core-framework.md").exists());
        assert!(result.files.contains(&"summary.json".to_string()));

        let coverage: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("coverage.json")).unwrap())
                .unwrap();
        assert_eq!(coverage["status"], "complete");
        assert!(coverage["categories"]["core-framework"].as_f64().unwrap() > 0.99);

        let _ = std::fs::remove_dir_all(&out);
    }

    #[test]
    fn rewrite_is_byte_identical_apart_from_header() {
        let bundle = test_bundle();
        let out_a = temp_out();
        let out_b = temp_out();

        write_bundle(&bundle, &out_a).expect("write a");
        write_bundle(&bundle, &out_b).expect("write b");

        for rel in ["research/core-framework.md", "coverage.json"] {
            let a = std::fs::read(out_a.join(rel)).unwrap();
            let b = std::fs::read(out_b.join(rel)).unwrap();
            assert_eq!(a, b, "{rel} differs between writes");
        }

        // summary.json differs only in the generated_at header (same run id)
        let strip = |path: &Path| -> Vec<String> {
            std::fs::read_to_string(path)
                .unwrap()
                .lines()
                .filter(|l| !l.contains("\"generated_at\"") && !l.contains("\"run_id\""))
                .map(String::from)
                .collect()
        };
        assert_eq!(
            strip(&out_a.join("summary.json")),
            strip(&out_b.join("summary.json"))
        );

        let _ = std::fs::remove_dir_all(&out_a);
        let _ = std::fs::remove_dir_all(&out_b);
    }

    #[test]
    fn incomplete_bundle_names_missing_areas() {
        let mut bundle = test_bundle();
        // Drop all storage evidence, then re-validate
        bundle.patterns.retain(|p| !p.source_url.contains("storage"));
        bundle.coverage = Some(validate::validate(&bundle, &ValidationConfig::default()));
        let out = temp_out();

        write_bundle(&bundle, &out).expect("write");

        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("summary.json")).unwrap())
                .unwrap();
        assert_eq!(summary["status"], "incomplete");
        let missing = summary["missing_areas"].as_array().unwrap();
        assert!(!missing.is_empty());
        assert_eq!(missing[0]["category"], "core-framework");
        assert!(
            missing[0]["missing_signals"]
                .as_array()
                .unwrap()
                .iter()
                .any(|s| s.as_str().unwrap().contains("storage"))
        );

        let _ = std::fs::remove_dir_all(&out);
    }

    #[test]
    fn unvalidated_bundle_is_rejected() {
        let mut bundle = test_bundle();
        bundle.coverage = None;
        let out = temp_out();

        let err = write_bundle(&bundle, &out).unwrap_err();
        assert!(err.to_string().contains("coverage"));

        let _ = std::fs::remove_dir_all(&out);
    }
}
