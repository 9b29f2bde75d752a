//! Lexical scanning of Markdown text: block segmentation, code-pattern
//! qualification, and the gotcha indicator lexicon.
//!
//! All of this is deliberately heuristic — structural and lexical signals
//! only, no parsing of the embedded languages.

use std::sync::LazyLock;

use regex::Regex;

/// A coarse block of a Markdown document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Block {
    Heading(String),
    Paragraph(String),
    Fence {
        language: Option<String>,
        code: String,
    },
}

/// Warning indicators that flag a paragraph as a gotcha.
pub(crate) const GOTCHA_INDICATORS: &[&str] = &[
    "note:",
    "important:",
    "warning:",
    "caution:",
    "make sure",
    "avoid",
    "common mistake",
    "troubleshooting",
    "be careful",
    "known issue",
    "keep in mind",
    "do not",
];

/// Description/heading words that mark a code block as an example usage
/// rather than a reusable snippet.
const EXAMPLE_INDICATORS: &[&str] = &["example", "usage", "walkthrough"];

/// First tokens that mark a line as a shell command.
const SHELL_COMMANDS: &[&str] = &[
    "npm", "npx", "yarn", "pnpm", "bun", "cd", "mkdir", "git", "brew", "pip", "pip3",
    "cargo", "curl", "wget", "touch", "rm", "cp", "mv", "aws", "amplify", "node", "sudo",
];

/// Structural keywords that mark a line as declaration-like.
const DECLARATION_KEYWORDS: &[&str] = &[
    "const", "let", "var", "function", "class", "import", "export", "def", "fn",
    "interface", "type", "return", "new", "await", "pub", "impl",
];

// ---------------------------------------------------------------------------
// Block segmentation
// ---------------------------------------------------------------------------

/// Split Markdown into headings, paragraphs, and fenced code blocks.
///
/// Fences open with ``` or ~~~ (up to three leading spaces) and close with
/// the same marker; an unterminated fence runs to the end of input.
pub(crate) fn parse_blocks(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<String> = Vec::new();
    let mut lines = markdown.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();

        if let Some(marker) = fence_marker(trimmed) {
            flush_paragraph(&mut blocks, &mut paragraph);

            let info = trimmed[marker.len()..].trim();
            let language = if info.is_empty() {
                None
            } else {
                Some(info.split_whitespace().next().unwrap_or(info).to_string())
            };

            let mut code_lines = Vec::new();
            for code_line in lines.by_ref() {
                if code_line.trim_start().starts_with(marker) {
                    break;
                }
                code_lines.push(code_line);
            }
            blocks.push(Block::Fence {
                language,
                code: code_lines.join("\n"),
            });
            continue;
        }

        if trimmed.starts_with('#') {
            flush_paragraph(&mut blocks, &mut paragraph);
            blocks.push(Block::Heading(
                trimmed.trim_start_matches('#').trim().to_string(),
            ));
            continue;
        }

        if trimmed.is_empty() {
            flush_paragraph(&mut blocks, &mut paragraph);
        } else {
            paragraph.push(trimmed.to_string());
        }
    }

    flush_paragraph(&mut blocks, &mut paragraph);
    blocks
}

fn fence_marker(line: &str) -> Option<&'static str> {
    if line.starts_with("```") {
        Some("```")
    } else if line.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn flush_paragraph(blocks: &mut Vec<Block>, paragraph: &mut Vec<String>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Paragraph(paragraph.join(" ")));
        paragraph.clear();
    }
}

// ---------------------------------------------------------------------------
// Code qualification
// ---------------------------------------------------------------------------

/// Whether a fenced region qualifies as a reusable pattern: more than one
/// non-blank line, not a pure shell command list, and at least one
/// declaration/assignment/block structural marker.
pub(crate) fn qualifies_as_pattern(code: &str) -> bool {
    let non_blank: Vec<&str> = code
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if non_blank.len() < 2 {
        return false;
    }
    if is_shell_command_list(&non_blank) {
        return false;
    }
    non_blank.iter().any(|l| has_structural_marker(l))
}

fn is_shell_command_list(lines: &[&str]) -> bool {
    lines.iter().all(|line| {
        if line.starts_with('$') || line.starts_with('#') {
            return true;
        }
        match line.split_whitespace().next() {
            Some(first) => SHELL_COMMANDS.contains(&first),
            None => false,
        }
    })
}

fn has_structural_marker(line: &str) -> bool {
    if line.contains('=') || line.contains('{') || line.contains(':') {
        return true;
    }
    line.split(|c: char| !c.is_alphanumeric() && c != '_')
        .any(|token| DECLARATION_KEYWORDS.contains(&token))
}

/// Classify a qualifying block as example usage or reusable snippet based
/// on the description and nearest heading.
pub(crate) fn classify_kind(description: &str, heading: Option<&str>) -> docscout_shared::PatternKind {
    let haystack = format!(
        "{} {}",
        description.to_lowercase(),
        heading.unwrap_or("").to_lowercase()
    );
    if EXAMPLE_INDICATORS.iter().any(|ind| haystack.contains(ind)) {
        docscout_shared::PatternKind::Example
    } else {
        docscout_shared::PatternKind::Snippet
    }
}

// ---------------------------------------------------------------------------
// Gotcha detection
// ---------------------------------------------------------------------------

static INDICATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = GOTCHA_INDICATORS
        .iter()
        .map(|ind| regex::escape(ind))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b({alternation})")).expect("valid regex")
});

/// Byte offset of the first warning indicator in a paragraph
/// (case-insensitive, word-boundary anchored).
pub(crate) fn find_indicator(paragraph: &str) -> Option<usize> {
    INDICATOR_RE.find(paragraph).map(|m| m.start())
}

/// Extract the sentence containing the byte offset `pos`, falling back to
/// the whole paragraph when no boundaries are found.
pub(crate) fn sentence_containing(paragraph: &str, pos: usize) -> &str {
    let bytes = paragraph.as_bytes();

    let start = paragraph[..pos]
        .rfind(['.', '!', '?'])
        .map(|i| i + 1)
        .unwrap_or(0);

    let end = paragraph[pos..]
        .find(['.', '!', '?'])
        .map(|i| (pos + i + 1).min(bytes.len()))
        .unwrap_or(bytes.len());

    paragraph[start..end].trim()
}
