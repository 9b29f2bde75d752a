//! Built-in fetch target tables.
//!
//! Targets are grouped by the category they are tagged with; pattern-specific
//! groups are keyed by architecture pattern. Each group has seed entries
//! (resolved on the first pass) and supplemental entries (held back for
//! coverage-driven follow-up passes).
//!
//! The built-in table points at the AWS Amplify Gen 2 documentation tree,
//! whose `data`/`auth`/`storage` sections map directly onto the
//! core-framework sub-areas the validator scores. Operators can swap in a
//! custom table to research a different framework.

use std::collections::HashMap;

use docscout_shared::{ArchPattern, Priority};

/// One table entry: a URL plus the priority tier it is fetched at.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub url: String,
    pub priority: Priority,
}

impl TargetSpec {
    fn new(url: &str, priority: Priority) -> Self {
        Self {
            url: url.to_string(),
            priority,
        }
    }
}

/// Seed + supplemental entries for one pattern's pattern-specific category.
#[derive(Debug, Clone, Default)]
pub struct PatternTargets {
    pub seed: Vec<TargetSpec>,
    pub supplemental: Vec<TargetSpec>,
}

/// The full lookup table the resolver draws targets from.
#[derive(Debug, Clone, Default)]
pub struct TargetTable {
    /// Core-framework targets, always resolved.
    pub core: Vec<TargetSpec>,
    /// Core-framework follow-ups for under-covered supplemental passes.
    pub core_supplemental: Vec<TargetSpec>,
    /// Integration targets, resolved for known patterns with a full set.
    pub integration: Vec<TargetSpec>,
    pub integration_supplemental: Vec<TargetSpec>,
    /// Pattern-specific targets keyed by architecture pattern.
    pub pattern_specific: HashMap<ArchPattern, PatternTargets>,
}

impl TargetTable {
    /// The built-in table covering the Amplify Gen 2 documentation.
    pub fn builtin() -> Self {
        use Priority::*;

        let base = "https://docs.amplify.aws/react";

        let core = vec![
            TargetSpec::new(&format!("{base}/build-a-backend/data/set-up-data/"), Critical),
            TargetSpec::new(&format!("{base}/build-a-backend/auth/set-up-auth/"), Critical),
            TargetSpec::new(
                &format!("{base}/build-a-backend/storage/set-up-storage/"),
                Critical,
            ),
        ];

        let core_supplemental = vec![
            TargetSpec::new(
                &format!("{base}/build-a-backend/data/data-modeling/"),
                Critical,
            ),
            TargetSpec::new(&format!("{base}/build-a-backend/data/mutate-data/"), Critical),
            TargetSpec::new(&format!("{base}/build-a-backend/auth/concepts/"), Critical),
            TargetSpec::new(
                &format!("{base}/build-a-backend/auth/connect-your-frontend/sign-in/"),
                Critical,
            ),
            TargetSpec::new(
                &format!("{base}/build-a-backend/storage/upload-files/"),
                Critical,
            ),
            TargetSpec::new(
                &format!("{base}/build-a-backend/storage/download-files/"),
                Critical,
            ),
        ];

        let integration = vec![
            TargetSpec::new(&format!("{base}/start/quickstart/"), Important),
            TargetSpec::new(
                &format!("{base}/build-a-backend/server-side-rendering/"),
                Important,
            ),
        ];

        let integration_supplemental = vec![
            TargetSpec::new(
                &format!("{base}/build-a-backend/functions/set-up-function/"),
                Important,
            ),
            TargetSpec::new(
                &format!("{base}/deploy-and-host/fullstack-branching/"),
                Supplementary,
            ),
        ];

        let mut pattern_specific = HashMap::new();

        pattern_specific.insert(
            ArchPattern::SocialPlatform,
            PatternTargets {
                seed: vec![
                    TargetSpec::new(
                        &format!("{base}/build-a-backend/data/subscribe-data/"),
                        Important,
                    ),
                    TargetSpec::new(
                        &format!(
                            "{base}/build-a-backend/auth/concepts/external-identity-providers/"
                        ),
                        Important,
                    ),
                ],
                supplemental: vec![TargetSpec::new(
                    &format!("{base}/build-a-backend/storage/lambda-triggers/"),
                    Supplementary,
                )],
            },
        );

        pattern_specific.insert(
            ArchPattern::ECommerce,
            PatternTargets {
                seed: vec![
                    TargetSpec::new(
                        &format!("{base}/build-a-backend/data/data-modeling/relationships/"),
                        Important,
                    ),
                    TargetSpec::new(
                        &format!("{base}/build-a-backend/functions/examples/"),
                        Important,
                    ),
                ],
                supplemental: vec![TargetSpec::new(
                    &format!("{base}/build-a-backend/auth/concepts/user-groups/"),
                    Supplementary,
                )],
            },
        );

        pattern_specific.insert(
            ArchPattern::ContentManagement,
            PatternTargets {
                seed: vec![
                    TargetSpec::new(
                        &format!("{base}/build-a-backend/storage/manage-with-amplify-console/"),
                        Important,
                    ),
                    TargetSpec::new(
                        &format!("{base}/build-a-backend/data/data-modeling/add-fields/"),
                        Important,
                    ),
                ],
                supplemental: vec![TargetSpec::new(
                    &format!("{base}/build-a-backend/storage/file-properties/"),
                    Supplementary,
                )],
            },
        );

        pattern_specific.insert(
            ArchPattern::DashboardAnalytics,
            PatternTargets {
                seed: vec![
                    TargetSpec::new(
                        &format!("{base}/build-a-backend/data/query-data/"),
                        Important,
                    ),
                    TargetSpec::new(
                        &format!("{base}/build-a-backend/functions/scheduling-functions/"),
                        Important,
                    ),
                ],
                supplemental: vec![TargetSpec::new(
                    &format!("{base}/build-a-backend/data/connect-event-api/"),
                    Supplementary,
                )],
            },
        );

        // SimpleCrud intentionally has no pattern-specific group: it
        // resolves to the critical core targets only.

        Self {
            core,
            core_supplemental,
            integration,
            integration_supplemental,
            pattern_specific,
        }
    }
}
