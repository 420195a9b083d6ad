//! Interpose Pointcut - predicate algebra over types and operations
//!
//! A pointcut is a class filter plus an operation matcher. Matchers are
//! static (decided from the signature alone) or runtime (also need the
//! call's arguments). Composition treats the constant TRUE matcher as a
//! special case so it can be skipped entirely.

pub mod args;
pub mod filter;
pub mod glob;
pub mod matcher;
pub mod name_match;
pub mod pattern;
pub mod pointcut;
pub mod tags;

pub use args::{ArgSpec, ArgsPointcut};
pub use filter::{ClassFilter, TrueClassFilter, TypeFilter};
pub use glob::Glob;
pub use matcher::{OperationMatcher, TrueMatcher};
pub use name_match::NameMatchPointcut;
pub use pattern::RegexPointcut;
pub use pointcut::{Bindings, ComposablePointcut, Pointcut, Pointcuts, TruePointcut};
pub use tags::TagMatchingPointcut;
