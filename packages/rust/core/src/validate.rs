//! Completeness validation: table-driven requirement map and weighted
//! coverage scoring.
//!
//! Each resolved category is scored against its required signal set; the
//! overall score is a weighted mean (critical 3, important 2, supplementary
//! 1) over resolved categories only. A bundle is complete when the overall
//! score clears the threshold AND no critical category sits below the floor
//! — strong supplementary coverage must not mask a missing critical area.
//!
//! Signals are category-scoped: evidence admitted under one category never
//! satisfies another category's requirements.

use url::Url;

use docscout_shared::{
    BundleStatus, Category, CategoryCoverage, CoverageReport, Priority, ResearchBundle,
    SignalKind, ValidationConfig,
};

/// Core-framework sub-areas that each need pattern + example coverage.
pub const CORE_SUB_AREAS: [&str; 3] = ["data", "auth", "storage"];

/// One required signal, optionally scoped to a sub-area detected from the
/// fragment's source URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequiredSignal {
    kind: SignalKind,
    area: Option<&'static str>,
}

impl RequiredSignal {
    fn label(&self) -> String {
        match self.area {
            Some(area) => format!("{}:{}", self.kind.label(), area),
            None => self.kind.label().to_string(),
        }
    }
}

/// The requirement map: category → required signal kinds.
fn required_signals(category: Category) -> Vec<RequiredSignal> {
    match category {
        Category::CoreFramework => CORE_SUB_AREAS
            .iter()
            .flat_map(|&area| {
                [
                    RequiredSignal {
                        kind: SignalKind::HasPattern,
                        area: Some(area),
                    },
                    RequiredSignal {
                        kind: SignalKind::HasExample,
                        area: Some(area),
                    },
                ]
            })
            .collect(),
        Category::Integration => vec![
            RequiredSignal {
                kind: SignalKind::HasPattern,
                area: None,
            },
            RequiredSignal {
                kind: SignalKind::HasExample,
                area: None,
            },
        ],
        Category::PatternSpecific => vec![
            RequiredSignal {
                kind: SignalKind::HasPattern,
                area: None,
            },
            RequiredSignal {
                kind: SignalKind::HasGotcha,
                area: None,
            },
        ],
    }
}

/// Score the bundle against the requirement map.
pub fn validate(bundle: &ResearchBundle, config: &ValidationConfig) -> CoverageReport {
    let mut categories = Vec::new();
    let mut weighted_sum = 0.0;
    let mut weight_total = 0u32;

    for category in bundle.resolved_categories() {
        let weight = category_weight(bundle, category);
        let required = required_signals(category);

        let mut observed = Vec::new();
        let mut missing = Vec::new();
        for signal in &required {
            if signal_observed(bundle, category, signal) {
                observed.push(signal.label());
            } else {
                missing.push(signal.label());
            }
        }
        observed.sort();
        missing.sort();

        let score = if required.is_empty() {
            1.0
        } else {
            (observed.len() as f64 / required.len() as f64).min(1.0)
        };

        weighted_sum += score * weight as f64;
        weight_total += weight;

        categories.push(CategoryCoverage {
            category,
            weight,
            required_signals: required.iter().map(RequiredSignal::label).collect(),
            observed_signals: observed,
            missing_signals: missing,
            score,
        });
    }

    let overall_score = if weight_total == 0 {
        0.0
    } else {
        weighted_sum / weight_total as f64
    };

    let critical_ok = categories
        .iter()
        .filter(|c| c.weight == Priority::Critical.weight())
        .all(|c| c.score >= config.critical_floor);

    let status = if overall_score >= config.completeness_threshold && critical_ok {
        BundleStatus::Complete
    } else {
        BundleStatus::Incomplete
    };

    CoverageReport {
        overall_score,
        status,
        categories,
    }
}

/// Categories that should be handed back to the resolver for a supplemental
/// pass: anything under the completeness threshold, plus critical
/// categories below the floor.
pub fn under_covered(report: &CoverageReport, config: &ValidationConfig) -> Vec<Category> {
    report
        .categories
        .iter()
        .filter(|c| {
            c.score < config.completeness_threshold
                || (c.weight == Priority::Critical.weight() && c.score < config.critical_floor)
        })
        .map(|c| c.category)
        .collect()
}

/// Category weight: the highest priority among its resolved targets.
fn category_weight(bundle: &ResearchBundle, category: Category) -> u32 {
    bundle
        .targets
        .iter()
        .filter(|t| t.category == category)
        .map(|t| t.priority.weight())
        .max()
        .unwrap_or(Priority::Supplementary.weight())
}

fn signal_observed(bundle: &ResearchBundle, category: Category, signal: &RequiredSignal) -> bool {
    match signal.kind {
        SignalKind::HasPattern => bundle
            .patterns
            .iter()
            .any(|p| p.category == category && area_matches(&p.source_url, signal.area)),
        SignalKind::HasExample => bundle.patterns.iter().any(|p| {
            p.category == category
                && p.kind == docscout_shared::PatternKind::Example
                && area_matches(&p.source_url, signal.area)
        }),
        SignalKind::HasGotcha => bundle
            .gotchas
            .iter()
            .any(|g| g.category == category && area_matches(&g.source_url, signal.area)),
    }
}

/// Sub-area attribution by URL path segment (e.g. any `/data/` segment).
fn area_matches(source_url: &str, area: Option<&str>) -> bool {
    let Some(area) = area else {
        return true;
    };
    Url::parse(source_url)
        .map(|u| u.path().split('/').any(|seg| seg == area))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docscout_shared::{
        ArchPattern, ExtractedPattern, FetchResult, FetchStatus, FetchTarget, Gotcha,
        PatternKind, ResearchRequest,
    };

    fn test_config() -> ValidationConfig {
        ValidationConfig {
            completeness_threshold: 0.85,
            critical_floor: 0.6,
            max_supplemental_passes: 2,
        }
    }

    fn add_target(bundle: &mut ResearchBundle, url: &str, category: Category, priority: Priority) {
        let target = FetchTarget {
            url: Url::parse(url).unwrap(),
            category,
            priority,
            origin: bundle.request.clone(),
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
    }

    fn add_pattern(bundle: &mut ResearchBundle, url: &str, category: Category, kind: PatternKind) {
        bundle.patterns.push(ExtractedPattern {
            source_url: url.into(),
            code_text: format!("const x = {};", bundle.patterns.len()),
            description: String::new(),
            language: None,
            kind,
            category,
        });
    }

    fn add_gotcha(bundle: &mut ResearchBundle, url: &str, category: Category) {
        bundle.gotchas.push(Gotcha {
            source_url: url.into(),
            warning_text: "Warning: something.".into(),
            nearby_context: None,
            category,
        });
    }

    fn core_bundle() -> ResearchBundle {
        let mut bundle = ResearchBundle::new(ResearchRequest {
            domain: "test".into(),
            pattern: ArchPattern::SimpleCrud,
        });
        for area in CORE_SUB_AREAS {
            add_target(
                &mut bundle,
                &format!("https://docs.example.com/{area}/setup/"),
                Category::CoreFramework,
                Priority::Critical,
            );
        }
        bundle
    }

    #[test]
    fn full_core_coverage_is_complete() {
        let mut bundle = core_bundle();
        for area in CORE_SUB_AREAS {
            let url = format!("https://docs.example.com/{area}/setup/");
            add_pattern(&mut bundle, &url, Category::CoreFramework, PatternKind::Snippet);
            add_pattern(&mut bundle, &url, Category::CoreFramework, PatternKind::Example);
        }

        let report = validate(&bundle, &test_config());
        assert_eq!(report.status, BundleStatus::Complete);
        assert!((report.overall_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(report.categories.len(), 1);
        assert!(report.categories[0].missing_signals.is_empty());
    }

    #[test]
    fn missing_sub_area_is_named() {
        let mut bundle = core_bundle();
        for area in ["data", "auth"] {
            let url = format!("https://docs.example.com/{area}/setup/");
            add_pattern(&mut bundle, &url, Category::CoreFramework, PatternKind::Example);
        }

        let report = validate(&bundle, &test_config());
        let core = report.category(Category::CoreFramework).unwrap();
        assert!((core.score - 4.0 / 6.0).abs() < 1e-9);
        assert!(core.missing_signals.contains(&"pattern:storage".to_string()));
        assert!(core.missing_signals.contains(&"example:storage".to_string()));
        assert_eq!(report.status, BundleStatus::Incomplete);
    }

    #[test]
    fn critical_floor_overrides_overall_score() {
        // Loosen the threshold so the weighted mean clears it while the
        // critical category is still badly missing.
        let config = ValidationConfig {
            completeness_threshold: 0.7,
            ..test_config()
        };

        let mut bundle = core_bundle();
        // Core: 3 of 6 signals → 0.5, below the 0.6 floor
        for area in ["data", "auth", "storage"] {
            let url = format!("https://docs.example.com/{area}/setup/");
            add_pattern(&mut bundle, &url, Category::CoreFramework, PatternKind::Snippet);
        }
        // Integration + pattern-specific fully covered
        add_target(
            &mut bundle,
            "https://docs.example.com/start/quickstart/",
            Category::Integration,
            Priority::Important,
        );
        add_pattern(
            &mut bundle,
            "https://docs.example.com/start/quickstart/",
            Category::Integration,
            PatternKind::Example,
        );
        add_target(
            &mut bundle,
            "https://docs.example.com/realtime/",
            Category::PatternSpecific,
            Priority::Important,
        );
        add_pattern(
            &mut bundle,
            "https://docs.example.com/realtime/",
            Category::PatternSpecific,
            PatternKind::Snippet,
        );
        add_gotcha(&mut bundle, "https://docs.example.com/realtime/", Category::PatternSpecific);

        let report = validate(&bundle, &config);
        // (3*0.5 + 2*1.0 + 2*1.0) / 7 ≈ 0.786 — above the loosened threshold
        assert!(report.overall_score >= config.completeness_threshold);
        assert_eq!(report.status, BundleStatus::Incomplete);
    }

    #[test]
    fn scores_are_monotone_as_evidence_accumulates() {
        let mut bundle = core_bundle();
        let config = test_config();

        let before = validate(&bundle, &config);

        add_pattern(
            &mut bundle,
            "https://docs.example.com/data/setup/",
            Category::CoreFramework,
            PatternKind::Example,
        );
        let after = validate(&bundle, &config);

        assert!(after.overall_score >= before.overall_score);
        for cat in &after.categories {
            let prev = before.category(cat.category).unwrap();
            assert!(cat.score >= prev.score);
        }
    }

    #[test]
    fn only_resolved_categories_are_scored() {
        let bundle = core_bundle();
        let report = validate(&bundle, &test_config());
        assert_eq!(report.categories.len(), 1);
        assert_eq!(report.categories[0].category, Category::CoreFramework);
        assert!(report.category(Category::Integration).is_none());
    }

    #[test]
    fn signals_are_category_scoped() {
        let mut bundle = core_bundle();
        add_target(
            &mut bundle,
            "https://docs.example.com/realtime/data/",
            Category::PatternSpecific,
            Priority::Important,
        );
        // A pattern-specific fragment from a /data/ URL must not satisfy the
        // core-framework data requirement.
        add_pattern(
            &mut bundle,
            "https://docs.example.com/realtime/data/",
            Category::PatternSpecific,
            PatternKind::Example,
        );

        let report = validate(&bundle, &test_config());
        let core = report.category(Category::CoreFramework).unwrap();
        assert!(core.missing_signals.contains(&"pattern:data".to_string()));
    }

    #[test]
    fn under_covered_lists_categories_below_threshold() {
        let mut bundle = core_bundle();
        add_target(
            &mut bundle,
            "https://docs.example.com/start/quickstart/",
            Category::Integration,
            Priority::Important,
        );
        add_pattern(
            &mut bundle,
            "https://docs.example.com/start/quickstart/",
            Category::Integration,
            PatternKind::Example,
        );

        let report = validate(&bundle, &test_config());
        let under = under_covered(&report, &test_config());
        assert!(under.contains(&Category::CoreFramework));
        assert!(!under.contains(&Category::Integration));
    }
}
