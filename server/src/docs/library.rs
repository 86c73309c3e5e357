//! Library candidates returned by `resolve-library-id`.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Prefix of documentation ids scraped from websites rather than repositories
const WEBSITE_PREFIX: &str = "/websites/";

fn library_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"- Context7-compatible library ID: (/[\w\-/.]+)").expect("static pattern")
    })
}

/// One match from the library directory
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibraryCandidate {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippets: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f32>,
}

impl LibraryCandidate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Whether this id points at scraped website docs
    pub fn is_website(&self) -> bool {
        self.id.starts_with(WEBSITE_PREFIX)
    }
}

fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    line.trim()
        .strip_prefix("- ")?
        .strip_prefix(name)?
        .strip_prefix(':')
        .map(str::trim)
}

/// Parse the text listing into candidates, in listing order.
///
/// Blocks are separated by `----------`; a block without a library id line
/// is skipped.
pub fn parse_candidates(listing: &str) -> Vec<LibraryCandidate> {
    let pattern = library_id_pattern();
    let mut candidates = Vec::new();

    for block in listing.split("----------") {
        for caps in pattern.captures_iter(block) {
            let mut candidate = LibraryCandidate::new(&caps[1]);

            // Only attach metadata when the block describes a single library
            if pattern.captures_iter(block).count() == 1 {
                for line in block.lines() {
                    if let Some(v) = field(line, "Title") {
                        candidate.title = Some(v.to_string());
                    } else if let Some(v) = field(line, "Description") {
                        candidate.description = Some(v.to_string());
                    } else if let Some(v) = field(line, "Code Snippets") {
                        candidate.code_snippets = v.parse().ok();
                    } else if let Some(v) = field(line, "Trust Score") {
                        candidate.trust_score = v.parse().ok();
                    }
                }
            }

            candidates.push(candidate);
        }
    }

    candidates
}

/// Pick the library to use: the first repository-backed id, otherwise the
/// first id of any kind.
pub fn select_library(candidates: &[LibraryCandidate]) -> Option<&LibraryCandidate> {
    candidates
        .iter()
        .find(|c| !c.is_website())
        .or_else(|| candidates.first())
}
