// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The strict template grammar (§4.1, §8 property 1).
//!
//! A valid token is exactly `{{ PATH }}` or `{{ PATH : DEFAULT }}`.
//! Forbidden anywhere: `${`, `{%...%}`, `{#...#}`, the empty pair `{}`,
//! and nesting inside `{{ … }}`. Literal braces must not appear outside a
//! matched `{{ … }}` pair.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ResolverError;

/// A single recognized `{{PATH}}` / `{{PATH:DEFAULT}}` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Byte range of the whole `{{…}}` match in the source string.
    pub span: (usize, usize),
    pub path: String,
    pub default: Option<String>,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.0..self.span.1]
    }
}

#[allow(clippy::expect_used)]
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*(?::(.*?))?\s*\}\}")
        .expect("constant regex pattern is valid")
});

const FORBIDDEN_SUBSTRINGS: &[&str] = &["${", "{%", "%}", "{#", "#}", "{}"];

/// Scan `s` for valid tokens and validate there is no forbidden syntax
/// anywhere in the string (including outside matched tokens).
pub fn scan(s: &str) -> Result<Vec<Token>, ResolverError> {
    let tokens: Vec<Token> = TOKEN_PATTERN
        .captures_iter(s)
        .map(|caps| {
            let m = caps.get(0).expect("group 0 always matches");
            Token {
                span: (m.start(), m.end()),
                path: caps[1].to_string(),
                default: caps.get(2).map(|d| d.as_str().to_string()),
            }
        })
        .collect();

    // A token's default/path must not itself contain a nested "{{" — the
    // lazy regex would stop at the first "}}", so nesting surfaces as
    // leftover "{{"/"}}" in the remainder below, except when the nested
    // open brace falls within what the lazy match already consumed.
    for t in &tokens {
        let text = t.text(s);
        let inner = &text[2..text.len() - 2];
        if inner.contains("{{") || inner.contains("}}") {
            return Err(ResolverError::Syntax);
        }
    }

    // Build the remainder with recognized tokens blanked out, then check
    // for any forbidden pattern or stray brace.
    let mut remainder = String::with_capacity(s.len());
    let mut last = 0usize;
    for t in &tokens {
        remainder.push_str(&s[last..t.span.0]);
        last = t.span.1;
    }
    remainder.push_str(&s[last..]);

    for pat in FORBIDDEN_SUBSTRINGS {
        if remainder.contains(pat) {
            return Err(ResolverError::Syntax);
        }
    }
    if remainder.contains('{') || remainder.contains('}') {
        return Err(ResolverError::Syntax);
    }

    Ok(tokens)
}

/// True if `s`, once trimmed, is exactly one standalone token with no
/// surrounding literal text (§4.1 "typed vs inline rendering").
pub fn standalone_token(s: &str) -> Result<Option<Token>, ResolverError> {
    let tokens = scan(s)?;
    if tokens.len() != 1 {
        return Ok(None);
    }
    let t = &tokens[0];
    if s.trim() == t.text(s) {
        Ok(Some(t.clone()))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
#[path = "grammar_tests.rs"]
mod tests;
