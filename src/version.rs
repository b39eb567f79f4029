// src/version.rs

//! Version constraints and version string comparison
//!
//! Versions are compared token-wise after splitting on `.`, `-`, and `+`.
//! A trailing run of purely numeric tokens on one side is treated as a
//! packaging revision and ignored: `1.2.3` and `1.2.3-4` compare equal.

use std::cmp::Ordering;
use std::fmt;

/// Comparison operators, two-character ones first so that `<=` wins over `<`.
const OPS: [&str; 5] = ["<=", ">=", "<", ">", "="];

/// A parsed requirement: package name, operator, and version.
///
/// An empty `op` means "any version".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub name: String,
    pub op: String,
    pub version: String,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.op, self.version)
    }
}

/// Parse `"foo>=1.2.3-4"` or plain `"foo"` into its parts.
pub fn parse_constraint(s: &str) -> Constraint {
    for op in OPS {
        if let Some(pos) = s.find(op) {
            return Constraint {
                name: s[..pos].to_string(),
                op: op.to_string(),
                version: s[pos + op.len()..].to_string(),
            };
        }
    }
    Constraint {
        name: s.to_string(),
        op: String::new(),
        version: String::new(),
    }
}

fn is_numeric(tok: &str) -> bool {
    !tok.is_empty() && tok.bytes().all(|b| b.is_ascii_digit())
}

fn compare_tokens(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(na), Ok(nb)) if is_numeric(a) && is_numeric(b) => na.cmp(&nb),
        _ => a.cmp(b),
    }
}

/// Compare two version strings.
///
/// Shared tokens compare numerically when both are all-digit, otherwise
/// lexicographically. Extra trailing tokens on one side are ignored when they
/// are entirely numeric (a packaging revision) and otherwise make the longer
/// version greater.
pub fn version_compare(a: &str, b: &str) -> Ordering {
    let ta: Vec<&str> = a.split(['.', '-', '+']).collect();
    let tb: Vec<&str> = b.split(['.', '-', '+']).collect();

    for (sa, sb) in ta.iter().zip(tb.iter()) {
        match compare_tokens(sa, sb) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }

    match ta.len().cmp(&tb.len()) {
        Ordering::Equal => Ordering::Equal,
        Ordering::Greater => {
            if ta[tb.len()..].iter().all(|t| is_numeric(t)) {
                Ordering::Equal
            } else {
                Ordering::Greater
            }
        }
        Ordering::Less => {
            if tb[ta.len()..].iter().all(|t| is_numeric(t)) {
                Ordering::Equal
            } else {
                Ordering::Less
            }
        }
    }
}

/// Test an installed version against a constraint.
pub fn eval_constraint(installed: &str, c: &Constraint) -> bool {
    if c.op.is_empty() {
        return true;
    }
    let cmp = version_compare(installed, &c.version);
    match c.op.as_str() {
        "=" => cmp == Ordering::Equal,
        "<" => cmp == Ordering::Less,
        "<=" => cmp != Ordering::Greater,
        ">" => cmp == Ordering::Greater,
        ">=" => cmp != Ordering::Less,
        _ => false,
    }
}

/// SONAME policy predicate: dependency entries naming a shared object
/// (anything containing `.so`) are opaque ELF-level detail and skipped by
/// dependency checks.
pub fn is_soname(dep: &str) -> bool {
    dep.contains(".so")
}
