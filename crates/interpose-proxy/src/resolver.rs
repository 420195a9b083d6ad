//! Advisor resolution: which advisors apply to a type, and the chain of
//! steps they contribute to a single operation.

use interpose_advice::{Advisor, Interceptor};
use interpose_core::{Operation, TypeDescriptor};
use interpose_pointcut::{Pointcut, Pointcuts};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Advisors that may apply to `ty`, in input order.
///
/// Introductions whose class filter accepts the type are collected first;
/// their presence lets introduction-aware matchers also accept the
/// operations they add. Ordinary advisors are then kept when their
/// pointcut statically matches some operation of the type. Global
/// advisors skip that pre-filter.
pub fn find_applicable_advisors(candidates: &[Arc<Advisor>], ty: &TypeDescriptor) -> Vec<Arc<Advisor>> {
    let mut applicable = vec![false; candidates.len()];
    let mut introduced = Vec::new();

    for (i, advisor) in candidates.iter().enumerate() {
        if let Some(intro) = advisor.as_introduction() {
            if intro.class_filter().matches(ty) {
                applicable[i] = true;
                for iface in intro.interfaces() {
                    introduced.extend(iface.all_operations());
                }
            }
        }
    }
    let has_introductions = applicable.iter().any(|a| *a);

    for (i, advisor) in candidates.iter().enumerate() {
        if let Some(pa) = advisor.as_pointcut_advisor() {
            applicable[i] =
                pa.is_global() || Pointcuts::can_apply_with(pa.pointcut().as_ref(), ty, &introduced, has_introductions);
        }
    }

    candidates
        .iter()
        .zip(applicable)
        .filter_map(|(a, keep)| keep.then(|| a.clone()))
        .collect()
}

/// One resolved step of a chain.
#[derive(Clone)]
pub enum ChainStep {
    /// Runs on every call. `binder` is set when the pointcut binds values.
    Static {
        interceptor: Arc<dyn Interceptor>,
        binder: Option<Arc<dyn Pointcut>>,
    },
    /// Runs only when the pointcut's runtime check accepts the arguments.
    Dynamic {
        interceptor: Arc<dyn Interceptor>,
        pointcut: Arc<dyn Pointcut>,
    },
}

impl ChainStep {
    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        match self {
            Self::Static { interceptor, .. } | Self::Dynamic { interceptor, .. } => interceptor,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Static { interceptor, .. } => interceptor.describe(),
            Self::Dynamic { interceptor, pointcut } => {
                format!("{} if {}", interceptor.describe(), pointcut.expression())
            }
        }
    }
}

impl fmt::Debug for ChainStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// The steps for `op` on `ty`, in advisor order.
pub fn build_chain(advisors: &[Arc<Advisor>], op: &Operation, ty: &TypeDescriptor) -> Vec<ChainStep> {
    let has_introductions = advisors
        .iter()
        .filter_map(|a| a.as_introduction())
        .any(|intro| intro.class_filter().matches(ty));

    let mut chain = Vec::new();
    for advisor in advisors {
        match advisor.as_ref() {
            Advisor::Introduction(intro) => {
                if intro.class_filter().matches(ty) {
                    chain.push(ChainStep::Static {
                        interceptor: intro.interceptor().clone(),
                        binder: None,
                    });
                }
            }
            Advisor::Pointcut(pa) => {
                let pointcut = pa.pointcut();
                if !pointcut.class_filter().matches(ty) {
                    continue;
                }
                let matcher = pointcut.operation_matcher();
                if !matcher.matches_with_introductions(op, ty, has_introductions) {
                    continue;
                }
                let step = if matcher.is_runtime() {
                    ChainStep::Dynamic {
                        interceptor: pa.interceptor().clone(),
                        pointcut: pointcut.clone(),
                    }
                } else {
                    let binder = (!pointcut.binding_names().is_empty()).then(|| pointcut.clone());
                    ChainStep::Static {
                        interceptor: pa.interceptor().clone(),
                        binder,
                    }
                };
                chain.push(step);
            }
        }
    }
    trace!(operation = %op.qualified_name(), target_type = %ty.name(), steps = chain.len(), "Chain built");
    chain
}

// ============================================================================
// Registry
// ============================================================================

/// Registered advisors with their registration sequence.
///
/// Chain order is `order` ascending, ties broken by registration order.
#[derive(Default)]
pub struct AdvisorRegistry {
    entries: Vec<(u64, Arc<Advisor>)>,
    next_seq: u64,
}

impl AdvisorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, advisor: Advisor) -> Arc<Advisor> {
        let advisor = Arc::new(advisor);
        self.entries.push((self.next_seq, advisor.clone()));
        self.next_seq += 1;
        advisor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sorted(&self) -> Vec<Arc<Advisor>> {
        let mut entries: Vec<&(u64, Arc<Advisor>)> = self.entries.iter().collect();
        entries.sort_by_key(|(seq, a)| (a.order(), *seq));
        entries.into_iter().map(|(_, a)| a.clone()).collect()
    }

    pub fn advisors_for(&self, ty: &TypeDescriptor) -> Vec<Arc<Advisor>> {
        find_applicable_advisors(&self.sorted(), ty)
    }
}
