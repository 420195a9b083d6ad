//! Glob patterns over operation and type names
//!
//! `*` matches any run of characters (including none), `?` matches exactly
//! one. Everything else is literal. Patterns are compiled once.

use regex::Regex;
use std::fmt;
use tracing::warn;

#[derive(Clone)]
pub struct Glob {
    pattern: String,
    // None for the match-everything pattern
    regex: Option<Regex>,
    valid: bool,
}

impl Glob {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if pattern.chars().all(|c| c == '*') && !pattern.is_empty() {
            return Self { pattern, regex: None, valid: true };
        }
        match Regex::new(&to_regex(&pattern)) {
            Ok(re) => Self { pattern, regex: Some(re), valid: true },
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Invalid glob pattern, it will never match");
                Self { pattern, regex: None, valid: false }
            }
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, value: &str) -> bool {
        match &self.regex {
            Some(re) => re.is_match(value),
            None => self.valid,
        }
    }
}

impl fmt::Debug for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Glob({:?})", self.pattern)
    }
}

impl fmt::Display for Glob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

fn to_regex(pattern: &str) -> String {
    let mut regex_str = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                // Skip consecutive stars
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                regex_str.push_str(".*");
                continue;
            }
            '?' => regex_str.push('.'),
            '.' | '^' | '$' | '+' | '{' | '}' | '[' | ']' | '|' | '(' | ')' | '\\' => {
                regex_str.push('\\');
                regex_str.push(chars[i]);
            }
            c => regex_str.push(c),
        }
        i += 1;
    }
    regex_str.push('$');
    regex_str
}
