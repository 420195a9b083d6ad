//! Regular-expression pointcut over qualified operation names
//!
//! Each operation is matched as `Target.name` and as `Declaring.name`, so a
//! pattern can select either by the proxied type or by the type that
//! declared the operation. Exclusions win over patterns.

use crate::filter::{ClassFilter, TrueClassFilter};
use crate::matcher::OperationMatcher;
use crate::pointcut::Pointcut;
use interpose_core::{Error, Operation, Result, TypeDescriptor};
use regex::Regex;

pub struct RegexPointcut {
    patterns: Vec<Regex>,
    exclusions: Vec<Regex>,
}

impl RegexPointcut {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        Ok(Self {
            patterns: compile(patterns)?,
            exclusions: Vec::new(),
        })
    }

    pub fn exclude<S: AsRef<str>>(mut self, exclusions: &[S]) -> Result<Self> {
        self.exclusions.extend(compile(exclusions)?);
        Ok(self)
    }

    fn candidates(op: &Operation, target: &TypeDescriptor) -> [String; 2] {
        let target_name = target
            .substituted_from()
            .map(|t| t.name())
            .unwrap_or_else(|| target.name());
        [format!("{}.{}", target_name, op.name()), op.qualified_name()]
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            let p = p.as_ref();
            // Anchor so a pattern has to describe the whole name
            Regex::new(&format!("^(?:{})$", p))
                .map_err(|e| Error::config(format!("invalid pointcut pattern '{}': {}", p, e)))
        })
        .collect()
}

impl OperationMatcher for RegexPointcut {
    fn matches(&self, op: &Operation, target: &TypeDescriptor) -> bool {
        let candidates = Self::candidates(op, target);
        let hit = |set: &[Regex]| set.iter().any(|re| candidates.iter().any(|c| re.is_match(c)));
        hit(&self.patterns) && !hit(&self.exclusions)
    }

    fn describe(&self) -> String {
        let patterns: Vec<String> = self
            .patterns
            .iter()
            .map(|re| strip_anchor(re.as_str()))
            .collect();
        if self.exclusions.is_empty() {
            format!("regex({})", patterns.join(", "))
        } else {
            let exclusions: Vec<String> = self
                .exclusions
                .iter()
                .map(|re| strip_anchor(re.as_str()))
                .collect();
            format!("regex({}; exclude {})", patterns.join(", "), exclusions.join(", "))
        }
    }
}

fn strip_anchor(s: &str) -> String {
    s.strip_prefix("^(?:")
        .and_then(|s| s.strip_suffix(")$"))
        .unwrap_or(s)
        .to_string()
}

impl Pointcut for RegexPointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        &TrueClassFilter
    }

    fn operation_matcher(&self) -> &dyn OperationMatcher {
        self
    }

    fn expression(&self) -> String {
        self.describe()
    }
}
