//! Core domain types for the DocScout research pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Current schema version for the summary artifact format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// ArchPattern
// ---------------------------------------------------------------------------

/// Architecture pattern named by the incoming research request.
///
/// Unrecognized names map to [`ArchPattern::Unknown`], which resolves to the
/// core-framework-only target set (degraded mode, not a failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchPattern {
    SocialPlatform,
    ECommerce,
    ContentManagement,
    DashboardAnalytics,
    SimpleCrud,
    Unknown,
}

impl ArchPattern {
    /// All patterns with dedicated target sets, for CLI listings.
    pub const KNOWN: [ArchPattern; 5] = [
        ArchPattern::SocialPlatform,
        ArchPattern::ECommerce,
        ArchPattern::ContentManagement,
        ArchPattern::DashboardAnalytics,
        ArchPattern::SimpleCrud,
    ];

    /// The snake_case name used on the CLI and in serialized artifacts.
    pub fn name(&self) -> &'static str {
        match self {
            ArchPattern::SocialPlatform => "social_platform",
            ArchPattern::ECommerce => "e_commerce",
            ArchPattern::ContentManagement => "content_management",
            ArchPattern::DashboardAnalytics => "dashboard_analytics",
            ArchPattern::SimpleCrud => "simple_crud",
            ArchPattern::Unknown => "unknown",
        }
    }

    /// Parse a pattern name, falling back to `Unknown` for anything
    /// unrecognized (never an error).
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "social_platform" => ArchPattern::SocialPlatform,
            "e_commerce" | "ecommerce" => ArchPattern::ECommerce,
            "content_management" => ArchPattern::ContentManagement,
            "dashboard_analytics" => ArchPattern::DashboardAnalytics,
            "simple_crud" => ArchPattern::SimpleCrud,
            _ => ArchPattern::Unknown,
        }
    }
}

impl std::fmt::Display for ArchPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Category / Priority
// ---------------------------------------------------------------------------

/// Logical grouping of documentation used for coverage scoring.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    CoreFramework,
    Integration,
    PatternSpecific,
}

impl Category {
    /// Kebab-case slug used for artifact file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Category::CoreFramework => "core-framework",
            Category::Integration => "integration",
            Category::PatternSpecific => "pattern-specific",
        }
    }

    /// Human-readable title for artifact headers.
    pub fn title(&self) -> &'static str {
        match self {
            Category::CoreFramework => "Core Framework",
            Category::Integration => "Integration",
            Category::PatternSpecific => "Pattern Specific",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Fetch priority tier. Doubles as the coverage weight for the category a
/// target belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Supplementary,
    Important,
    Critical,
}

impl Priority {
    /// Weight used in the overall coverage score (critical 3, important 2,
    /// supplementary 1).
    pub fn weight(&self) -> u32 {
        match self {
            Priority::Critical => 3,
            Priority::Important => 2,
            Priority::Supplementary => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// ResearchRequest / FetchTarget
// ---------------------------------------------------------------------------

/// The (domain, pattern) pair that originated a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// Free-text product domain (e.g. "contact-manager").
    pub domain: String,
    /// Architecture pattern driving target selection.
    pub pattern: ArchPattern,
}

/// One URL scheduled for fetching. Identity is the URL; targets are
/// immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchTarget {
    pub url: Url,
    pub category: Category,
    pub priority: Priority,
    /// The request this target was resolved for.
    pub origin: ResearchRequest,
}

// ---------------------------------------------------------------------------
// FetchResult
// ---------------------------------------------------------------------------

/// Outcome classification for a single fetch.
///
/// `Error` covers HTTP failures and per-request timeouts that exhausted
/// their retries (`error_detail` says which). `Timeout` is reserved for
/// fetches aborted by the run deadline or cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Ok,
    Error,
    Timeout,
}

/// One fetch outcome per target per run. A re-fetch within a run replaces
/// the prior result for that URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub target: FetchTarget,
    pub status: FetchStatus,
    /// Raw response body; `None` unless `status == Ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    /// Fetch completion time; for cache hits, the cache write time.
    pub fetched_at: DateTime<Utc>,
    /// Number of HTTP attempts made (0 for cache hits).
    pub attempt_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Whether this result was served from the URL cache.
    #[serde(default)]
    pub from_cache: bool,
}

impl FetchResult {
    pub fn is_ok(&self) -> bool {
        self.status == FetchStatus::Ok
    }
}

// ---------------------------------------------------------------------------
// Extraction output
// ---------------------------------------------------------------------------

/// Classification of a qualifying fenced code region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Reusable configuration or program logic.
    Snippet,
    /// A worked example usage.
    Example,
}

/// A reusable code pattern extracted from a fetched document.
/// Derived from exactly one `Ok` fetch result; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedPattern {
    pub source_url: String,
    pub code_text: String,
    /// The paragraph immediately preceding the code block.
    pub description: String,
    /// Fence info string, when present (e.g. "ts", "graphql").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub kind: PatternKind,
    pub category: Category,
}

/// An extracted warning/pitfall fragment with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gotcha {
    pub source_url: String,
    /// The sentence (or paragraph) containing the warning indicator.
    pub warning_text: String,
    /// One paragraph of following context, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nearby_context: Option<String>,
    pub category: Category,
}

// ---------------------------------------------------------------------------
// Coverage
// ---------------------------------------------------------------------------

/// Kinds of knowledge signal a category can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    HasPattern,
    HasExample,
    HasGotcha,
}

impl SignalKind {
    pub fn label(&self) -> &'static str {
        match self {
            SignalKind::HasPattern => "pattern",
            SignalKind::HasExample => "example",
            SignalKind::HasGotcha => "gotcha",
        }
    }
}

/// Coverage of one category against its required signal set.
///
/// Signal sets are stored as sorted label strings (e.g. `"pattern:data"`,
/// `"gotcha"`) so serialized reports are deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCoverage {
    pub category: Category,
    /// Weight inherited from the highest-priority resolved target.
    pub weight: u32,
    pub required_signals: Vec<String>,
    pub observed_signals: Vec<String>,
    pub missing_signals: Vec<String>,
    /// observed / required, capped at 1.0.
    pub score: f64,
}

/// Bundle gate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleStatus {
    Complete,
    Incomplete,
}

impl std::fmt::Display for BundleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BundleStatus::Complete => f.write_str("complete"),
            BundleStatus::Incomplete => f.write_str("incomplete"),
        }
    }
}

/// Full coverage report across resolved categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    pub overall_score: f64,
    pub status: BundleStatus,
    /// Per-category coverage, ordered by category.
    pub categories: Vec<CategoryCoverage>,
}

impl CoverageReport {
    /// Coverage entry for a category, if it was resolved in this run.
    pub fn category(&self, category: Category) -> Option<&CategoryCoverage> {
        self.categories.iter().find(|c| c.category == category)
    }
}

// ---------------------------------------------------------------------------
// ResearchBundle
// ---------------------------------------------------------------------------

/// Everything one pipeline run produced. Created once per invocation and
/// owned by the run; the validator appends `coverage` before finalization,
/// after which the bundle is treated as immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchBundle {
    pub run_id: RunId,
    pub request: ResearchRequest,
    pub started_at: DateTime<Utc>,
    /// All targets resolved across the initial and supplemental passes.
    pub targets: Vec<FetchTarget>,
    pub fetch_results: Vec<FetchResult>,
    pub patterns: Vec<ExtractedPattern>,
    pub gotchas: Vec<Gotcha>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageReport>,
    /// Supplemental resolve-fetch-extract cycles performed.
    pub supplemental_passes: u32,
}

impl ResearchBundle {
    /// Start an empty bundle for a request.
    pub fn new(request: ResearchRequest) -> Self {
        Self {
            run_id: RunId::new(),
            request,
            started_at: Utc::now(),
            targets: Vec::new(),
            fetch_results: Vec::new(),
            patterns: Vec::new(),
            gotchas: Vec::new(),
            coverage: None,
            supplemental_passes: 0,
        }
    }

    /// Gate status, defaulting to incomplete until validated.
    pub fn status(&self) -> BundleStatus {
        self.coverage
            .as_ref()
            .map(|c| c.status)
            .unwrap_or(BundleStatus::Incomplete)
    }

    /// Fetch results with `status == Ok`.
    pub fn ok_results(&self) -> impl Iterator<Item = &FetchResult> {
        self.fetch_results.iter().filter(|r| r.is_ok())
    }

    /// Categories with at least one resolved target, in category order.
    pub fn resolved_categories(&self) -> Vec<Category> {
        let mut cats: Vec<Category> = self.targets.iter().map(|t| t.category).collect();
        cats.sort();
        cats.dedup();
        cats
    }
}
