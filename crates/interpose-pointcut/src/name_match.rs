//! Pointcut matching operation names against glob patterns

use crate::filter::{ClassFilter, TrueClassFilter};
use crate::glob::Glob;
use crate::matcher::OperationMatcher;
use crate::pointcut::Pointcut;
use interpose_core::{Operation, TypeDescriptor};
use std::sync::Arc;

#[derive(Clone)]
pub struct NameMatchPointcut {
    names: Vec<Glob>,
    class_filter: Arc<dyn ClassFilter>,
}

impl NameMatchPointcut {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names.into_iter().map(|n| Glob::new(n.as_ref())).collect(),
            class_filter: TrueClassFilter::shared(),
        }
    }

    pub fn add_name(mut self, name: &str) -> Self {
        self.names.push(Glob::new(name));
        self
    }

    /// Restrict to types accepted by `filter`.
    pub fn within(mut self, filter: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = filter;
        self
    }
}

impl OperationMatcher for NameMatchPointcut {
    fn matches(&self, op: &Operation, _target: &TypeDescriptor) -> bool {
        self.names.iter().any(|g| g.matches(op.name()))
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self.names.iter().map(Glob::pattern).collect();
        format!("name({})", names.join("|"))
    }
}

impl Pointcut for NameMatchPointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        self.class_filter.as_ref()
    }

    fn operation_matcher(&self) -> &dyn OperationMatcher {
        self
    }

    fn expression(&self) -> String {
        if self.class_filter.is_true() {
            self.describe()
        } else {
            format!("{} && {}", self.class_filter.describe(), self.describe())
        }
    }
}
