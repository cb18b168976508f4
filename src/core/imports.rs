//! Import extraction
//!
//! Supported Solidity import forms (single or double quotes, brace lists may
//! span lines):
//!
//! ```text
//! import "path";
//! import "path" as X;
//! import X from "path";
//! import * as X from "path";
//! import {A, B as C} from "path";
//! ```
//!
//! Line and block comments are removed before scanning, so commented-out
//! imports are ignored.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use crate::models::types::ImportKind;
use crate::utils::constants::SCOPED_IMPORT_MARKER;

lazy_static! {
    static ref IMPORT_STATEMENT: Regex = Regex::new(
        r#"\bimport\s+(?:(?:\{[^}]*\}|\*\s*as\s+[A-Za-z_$][\w$]*|[A-Za-z_$][\w$]*)\s+from\s+)?["']([^"']+)["']"#
    )
    .unwrap();
}

/// Pulls import specifiers out of Solidity source text
pub trait ImportExtractor {
    /// Specifiers in order of first appearance, without duplicates
    fn extract(&self, source: &str) -> Vec<String>;
}

/// Regex-backed extractor covering the grammar subset above
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexImportExtractor;

impl ImportExtractor for RegexImportExtractor {
    fn extract(&self, source: &str) -> Vec<String> {
        let cleaned = strip_comments(source);
        let mut seen = HashSet::new();
        IMPORT_STATEMENT
            .captures_iter(&cleaned)
            .map(|caps| caps[1].to_string())
            .filter(|spec| seen.insert(spec.clone()))
            .collect()
    }
}

/// Classify a specifier by its leading characters
pub fn classify_specifier(specifier: &str) -> ImportKind {
    if specifier.starts_with(SCOPED_IMPORT_MARKER) {
        ImportKind::Scoped
    } else if specifier.starts_with("./") || specifier.starts_with("../") {
        ImportKind::Relative
    } else {
        ImportKind::Bare
    }
}

/// Remove `//` and `/* */` comments, leaving string literals intact.
/// Newlines inside block comments are kept.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q || c == '\n' {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    prev = skipped;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}
