//! Structured fragment extraction from fetched documents.
//!
//! Each `Ok` fetch result is reduced to Markdown (HTML pages go through a
//! content-container selector ladder and `htmd` conversion first) and then
//! scanned for fenced code patterns and warning/gotcha prose. Extraction is
//! a pure function of one document; malformed or binary content yields zero
//! fragments and is logged, never treated as a pipeline failure.
//!
//! The pattern/gotcha detectors are lexicon and structure based — a known,
//! accepted approximation, not a parser.

mod scan;

use scraper::Html;
use tracing::{debug, instrument, warn};

use docscout_shared::{ExtractedPattern, FetchResult, Gotcha};

use scan::Block;

/// Fragments extracted from a single document.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub patterns: Vec<ExtractedPattern>,
    pub gotchas: Vec<Gotcha>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.gotchas.is_empty()
    }
}

/// Extract code patterns and gotchas from one fetched document.
///
/// Returns an empty extraction for non-`Ok` results and for content the
/// scanner cannot make sense of.
#[instrument(skip(result), fields(url = %result.target.url))]
pub fn extract(result: &FetchResult) -> Extraction {
    let Some(content) = result.raw_content.as_deref().filter(|_| result.is_ok()) else {
        return Extraction::default();
    };

    if looks_binary(content) {
        debug!(url = %result.target.url, "skipping binary or mangled content");
        return Extraction::default();
    }

    let markdown = if looks_like_html(content) {
        match html_to_markdown(content) {
            Ok(md) => md,
            Err(e) => {
                warn!(url = %result.target.url, error = %e, "HTML conversion failed, skipping");
                return Extraction::default();
            }
        }
    } else {
        content.to_string()
    };

    let source_url = result.target.url.to_string();
    let category = result.target.category;
    let blocks = scan::parse_blocks(&markdown);

    let mut extraction = Extraction::default();
    let mut last_heading: Option<&str> = None;
    let mut last_paragraph: Option<&str> = None;

    for (i, block) in blocks.iter().enumerate() {
        match block {
            Block::Heading(text) => {
                last_heading = Some(text.as_str());
                last_paragraph = None;
            }
            Block::Paragraph(text) => {
                if let Some(gotcha) = gotcha_from_paragraph(text, &blocks[i + 1..]) {
                    extraction.gotchas.push(Gotcha {
                        source_url: source_url.clone(),
                        warning_text: gotcha.0,
                        nearby_context: gotcha.1,
                        category,
                    });
                }
                last_paragraph = Some(text.as_str());
            }
            Block::Fence { language, code } => {
                if scan::qualifies_as_pattern(code) {
                    let description = last_paragraph
                        .or(last_heading)
                        .unwrap_or("")
                        .to_string();
                    extraction.patterns.push(ExtractedPattern {
                        source_url: source_url.clone(),
                        code_text: code.clone(),
                        kind: scan::classify_kind(&description, last_heading),
                        description,
                        language: language.clone(),
                        category,
                    });
                }
            }
        }
    }

    debug!(
        url = %source_url,
        patterns = extraction.patterns.len(),
        gotchas = extraction.gotchas.len(),
        "extraction complete"
    );
    extraction
}

/// Scan one paragraph for a warning indicator. Returns the warning sentence
/// and one following paragraph of context.
fn gotcha_from_paragraph(
    paragraph: &str,
    following: &[Block],
) -> Option<(String, Option<String>)> {
    let pos = scan::find_indicator(paragraph)?;
    let warning = scan::sentence_containing(paragraph, pos).to_string();

    let context = following.iter().find_map(|b| match b {
        Block::Paragraph(text) => Some(text.clone()),
        _ => None,
    });

    Some((warning, context))
}

// ---------------------------------------------------------------------------
// Content shape detection
// ---------------------------------------------------------------------------

/// Rough check that a body is an HTML page rather than Markdown/plain text.
fn looks_like_html(content: &str) -> bool {
    let head = content.trim_start();
    let lower = head.get(..256.min(head.len())).unwrap_or(head).to_lowercase();
    lower.starts_with("<!doctype html")
        || lower.starts_with("<html")
        || lower.contains("<body")
        || lower.contains("<div")
}

/// Reject content the scanner cannot work with: NUL bytes or a body that is
/// mostly UTF-8 replacement characters (a lossy decode of binary data).
fn looks_binary(content: &str) -> bool {
    if content.contains('\0') {
        return true;
    }
    let replacements = content.chars().filter(|&c| c == '\u{FFFD}').count();
    replacements > 0 && replacements * 10 > content.chars().count()
}

// ---------------------------------------------------------------------------
// HTML → Markdown
// ---------------------------------------------------------------------------

/// Reduce an HTML page to its content container and convert to Markdown.
fn html_to_markdown(html: &str) -> Result<String, String> {
    let content_html = extract_content_html(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();

    converter
        .convert(&content_html)
        .map_err(|e| format!("htmd conversion failed: {e}"))
}

/// Extract the main content HTML, stripping chrome (nav, header, footer, etc.).
fn extract_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    // Try known content containers in priority order
    let selectors = [
        "article .markdown",     // Docusaurus
        ".vp-doc",               // VitePress
        ".markdown-section",     // GitBook
        "[role=\"main\"]",       // ReadTheDocs / generic
        "article",               // Common
        "main",                  // HTML5 semantic
        ".content",              // Generic
    ];

    for sel_str in &selectors {
        if let Ok(selector) = scraper::Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                return el.inner_html();
            }
        }
    }

    // Fallback: use <body> content
    if let Ok(body_sel) = scraper::Selector::parse("body") {
        if let Some(body) = doc.select(&body_sel).next() {
            return body.inner_html();
        }
    }

    // Last resort
    html.to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use docscout_shared::{
        ArchPattern, Category, FetchStatus, FetchTarget, PatternKind, Priority, ResearchRequest,
    };
    use url::Url;

    fn ok_result(content: &str) -> FetchResult {
        FetchResult {
            target: FetchTarget {
                url: Url::parse("https://docs.example.com/build-a-backend/data/set-up-data/")
                    .unwrap(),
                category: Category::CoreFramework,
                priority: Priority::Critical,
                origin: ResearchRequest {
                    domain: "contact-manager".into(),
                    pattern: ArchPattern::SimpleCrud,
                },
            },
            status: FetchStatus::Ok,
            raw_content: Some(content.to_string()),
            fetched_at: chrono::Utc::now(),
            attempt_count: 1,
            error_detail: None,
            from_cache: false,
        }
    }

    #[test]
    fn markdown_code_block_becomes_pattern_with_description() {
        let md = "# Set up data\n\nDefine your schema in the resource file:\n\n```ts\nconst schema = a.schema({\n  Todo: a.model({ content: a.string() }),\n});\n```\n";
        let extraction = extract(&ok_result(md));

        assert_eq!(extraction.patterns.len(), 1);
        let pattern = &extraction.patterns[0];
        assert!(pattern.code_text.contains("a.schema"));
        assert_eq!(pattern.description, "Define your schema in the resource file:");
        assert_eq!(pattern.language.as_deref(), Some("ts"));
        assert_eq!(pattern.kind, PatternKind::Snippet);
        assert_eq!(pattern.category, Category::CoreFramework);
    }

    #[test]
    fn shell_only_block_is_skipped() {
        let md = "Install the CLI:\n\n```bash\nnpm create amplify@latest\nnpx ampx sandbox\n```\n";
        let extraction = extract(&ok_result(md));
        assert!(extraction.patterns.is_empty());
    }

    #[test]
    fn example_block_is_classified_by_description() {
        let md = "For example, create a record from your component:\n\n```ts\nconst { data } = await client.models.Todo.create({\n  content: \"my first todo\",\n});\n```\n";
        let extraction = extract(&ok_result(md));

        assert_eq!(extraction.patterns.len(), 1);
        assert_eq!(extraction.patterns[0].kind, PatternKind::Example);
    }

    #[test]
    fn warning_sentence_becomes_gotcha() {
        let md = "# Auth setup\n\nSome intro text.\n\nWarning: policy must be attached to user, not group.\n\nAttach it from the IAM console before deploying.\n";
        let extraction = extract(&ok_result(md));

        assert_eq!(extraction.gotchas.len(), 1);
        let gotcha = &extraction.gotchas[0];
        assert_eq!(
            gotcha.warning_text,
            "Warning: policy must be attached to user, not group."
        );
        assert_eq!(
            gotcha.nearby_context.as_deref(),
            Some("Attach it from the IAM console before deploying.")
        );
    }

    #[test]
    fn multiple_indicator_paragraphs_yield_one_gotcha_each() {
        let md = "Note: tokens expire after one hour.\n\nMake sure to configure a refresh flow.\n";
        let extraction = extract(&ok_result(md));
        assert_eq!(extraction.gotchas.len(), 2);
    }

    #[test]
    fn html_page_is_reduced_and_scanned() {
        let html = r#"<html><body>
            <nav><a href="/">Home</a></nav>
            <main>
                <h1>Set up storage</h1>
                <p>Configure the bucket in your backend:</p>
                <pre><code class="language-ts">export const storage = defineStorage({
  name: "media",
});</code></pre>
                <p>Caution: bucket names must be globally unique.</p>
            </main>
            <footer>Copyright 2025</footer>
        </body></html>"#;

        let extraction = extract(&ok_result(html));

        assert_eq!(extraction.patterns.len(), 1);
        assert!(extraction.patterns[0].code_text.contains("defineStorage"));
        assert_eq!(extraction.gotchas.len(), 1);
        assert!(extraction.gotchas[0]
            .warning_text
            .to_lowercase()
            .contains("globally unique"));
    }

    #[test]
    fn binary_content_yields_nothing() {
        let extraction = extract(&ok_result("PK\u{0003}\u{0004}\0\0binary junk"));
        assert!(extraction.is_empty());
    }

    #[test]
    fn non_ok_result_yields_nothing() {
        let mut result = ok_result("```ts\nconst a = 1;\nconst b = 2;\n```");
        result.status = FetchStatus::Error;
        let extraction = extract(&result);
        assert!(extraction.is_empty());
    }

    #[test]
    fn provenance_is_carried_on_every_fragment() {
        let md = "Define the model:\n\n```ts\nconst m = a.model({});\nexport default m;\n```\n\nImportant: run codegen after changing the schema.\n";
        let extraction = extract(&ok_result(md));

        for p in &extraction.patterns {
            assert_eq!(
                p.source_url,
                "https://docs.example.com/build-a-backend/data/set-up-data/"
            );
        }
        for g in &extraction.gotchas {
            assert_eq!(
                g.source_url,
                "https://docs.example.com/build-a-backend/data/set-up-data/"
            );
        }
    }
}
