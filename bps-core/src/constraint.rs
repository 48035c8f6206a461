// bps-core/src/constraint.rs
//! Version range expressions as they appear in buildpack catalogs.
//!
//! `||` separates alternatives; inside an alternative every comparator must
//! hold. Comparators are separated by commas or whitespace, may put
//! whitespace between operator and version, and may use hyphen ranges
//! (`1.2 - 1.4`). A bare version means exact equality, padded with zeros
//! when partial. Wildcards and the `~`/`^` operators follow the `semver`
//! crate.

use std::fmt;

use bps_common::error::{BpsError, Result};
use semver::{Version, VersionReq};

/// A parsed version range.
#[derive(Debug, Clone)]
pub struct Constraint {
    source: String,
    alternatives: Vec<Vec<Term>>,
}

#[derive(Debug, Clone)]
enum Term {
    Req(VersionReq),
    Not(Version),
}

impl Term {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Term::Req(req) => req.matches(version),
            Term::Not(excluded) => version != excluded,
        }
    }
}

impl Constraint {
    pub fn parse(input: &str) -> Result<Self> {
        let syntax = |reason: String| BpsError::ConstraintSyntax(input.to_string(), reason);

        let mut alternatives = Vec::new();
        for alternative in input.split("||") {
            let tokens = merge_operators(alternative).map_err(syntax)?;
            let mut terms = Vec::new();
            let mut i = 0;
            while i < tokens.len() {
                if tokens.get(i + 1).map(String::as_str) == Some("-") {
                    let upper = tokens
                        .get(i + 2)
                        .ok_or_else(|| syntax(format!("hyphen range after {:?} has no upper bound", tokens[i])))?;
                    terms.push(comparator(&format!(">={}", tokens[i])).map_err(syntax)?);
                    terms.push(comparator(&format!("<={upper}")).map_err(syntax)?);
                    i += 3;
                    continue;
                }
                if tokens[i] == "-" {
                    return Err(syntax("hyphen range has no lower bound".to_string()));
                }
                terms.push(term(&tokens[i]).map_err(syntax)?);
                i += 1;
            }
            alternatives.push(terms);
        }

        Ok(Self {
            source: input.to_string(),
            alternatives,
        })
    }

    /// A pre-release only matches an alternative holding a range comparator
    /// that admits it; `*`, an empty alternative or `!=` alone never do.
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|terms| {
            let admits_pre = version.pre.is_empty()
                || terms.iter().any(|term| matches!(term, Term::Req(_)));
            admits_pre && terms.iter().all(|term| term.matches(version))
        })
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parses a catalog version. Accepts a leading `v` and a missing minor or
/// patch component (`1.2` is `1.2.0`).
pub fn parse_version_lenient(input: &str) -> Result<Version> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    Version::parse(&pad(trimmed))
        .map_err(|e| BpsError::VersionSyntax(input.to_string(), e.to_string()))
}

const OPERATOR_CHARS: &[char] = &['=', '!', '<', '>', '~', '^'];

fn is_operator(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| OPERATOR_CHARS.contains(&c))
}

// Splits on commas and whitespace, gluing a lone operator to the version
// after it.
fn merge_operators(alternative: &str) -> std::result::Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut pending: Option<&str> = None;
    for token in alternative
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        match pending.take() {
            Some(op) if is_operator(token) || token == "-" => {
                return Err(format!("operator {op:?} is not followed by a version"));
            }
            Some(op) => tokens.push(format!("{op}{token}")),
            None if is_operator(token) => pending = Some(token),
            None => tokens.push(token.to_string()),
        }
    }
    if let Some(op) = pending {
        return Err(format!("operator {op:?} is not followed by a version"));
    }
    Ok(tokens)
}

fn term(token: &str) -> std::result::Result<Term, String> {
    if matches!(token, "*" | "x" | "X") {
        return Ok(Term::Req(VersionReq::STAR));
    }
    if let Some(excluded) = token.strip_prefix("!=") {
        if has_wildcard(excluded) {
            return Err(format!("wildcard not allowed in {token:?}"));
        }
        let version = parse_version_lenient(excluded).map_err(|e| e.to_string())?;
        return Ok(Term::Not(version));
    }
    if token.starts_with(OPERATOR_CHARS) {
        return comparator(token);
    }
    if has_wildcard(token) {
        return VersionReq::parse(token)
            .map(Term::Req)
            .map_err(|e| e.to_string());
    }
    comparator(&format!("={token}"))
}

// `=`, `<`, `<=`, `>` and `>=` compare against the zero-padded version;
// `~` and `^` keep their partial-version meaning.
fn comparator(token: &str) -> std::result::Result<Term, String> {
    let split = token
        .find(|c: char| !OPERATOR_CHARS.contains(&c))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(split);
    let version = version.strip_prefix('v').unwrap_or(version);

    let normalized = match op {
        "=" | "<" | "<=" | ">" | ">=" if !has_wildcard(version) => format!("{op}{}", pad(version)),
        "=" | "<" | "<=" | ">" | ">=" | "~" | "^" => format!("{op}{version}"),
        other => return Err(format!("unknown operator {other:?}")),
    };
    VersionReq::parse(&normalized)
        .map(Term::Req)
        .map_err(|e| e.to_string())
}

fn core_and_suffix(version: &str) -> (&str, &str) {
    let at = version.find(['-', '+']).unwrap_or(version.len());
    version.split_at(at)
}

fn has_wildcard(version: &str) -> bool {
    let (core, _) = core_and_suffix(version);
    core.split('.').any(|part| matches!(part, "*" | "x" | "X"))
}

fn pad(version: &str) -> String {
    let (core, suffix) = core_and_suffix(version);
    match core.split('.').count() {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => version.to_string(),
    }
}
