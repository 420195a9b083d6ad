//! Argument bindings for declared advice
//!
//! Computed once per advice. The join point slot (if any), the returning
//! and throwing slots, and the names the pointcut binds must together
//! cover every parameter of the advice method exactly once. Anything else
//! is a binding error raised while the advisor is built.

use crate::advice::AdviceKind;
use crate::declared::{AdviceMethod, ParamKind};
use interpose_core::{builtin, Error, Result, TypeRef};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Name given to a reserved join point slot when argument names are
/// supplied without it.
pub const THIS_JOIN_POINT: &str = "thisJoinPoint";

/// Discovers the parameter names of an advice method.
pub trait ParameterNameResolver: Send + Sync {
    /// Names for every parameter, or `None` if they cannot be determined.
    fn parameter_names(&self, method: &AdviceMethod) -> Option<Vec<String>>;
}

/// Names recorded on the parameter declarations. Unnamed join point slots
/// are called [`THIS_JOIN_POINT`]; any other unnamed parameter makes the
/// names undeterminable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredNames;

impl ParameterNameResolver for DeclaredNames {
    fn parameter_names(&self, method: &AdviceMethod) -> Option<Vec<String>> {
        method
            .params()
            .iter()
            .map(|p| match (&p.name, &p.kind) {
                (Some(name), _) => Some(name.clone()),
                (None, ParamKind::Value(_)) => None,
                (None, _) => Some(THIS_JOIN_POINT.to_string()),
            })
            .collect()
    }
}

/// Tries each resolver in turn; the first answer wins.
#[derive(Clone, Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn ParameterNameResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: Arc<dyn ParameterNameResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }
}

impl ParameterNameResolver for ResolverChain {
    fn parameter_names(&self, method: &AdviceMethod) -> Option<Vec<String>> {
        self.resolvers.iter().find_map(|r| r.parameter_names(method))
    }
}

/// Resolved slot layout of one declared advice method.
#[derive(Debug, Clone)]
pub struct ArgumentBindings {
    parameter_names: Vec<String>,
    join_point_arg_index: Option<usize>,
    join_point_static_part_arg_index: Option<usize>,
    name_to_param_index: HashMap<String, usize>,
    returning: Option<(usize, TypeRef)>,
    throwing: Option<(usize, TypeRef)>,
    pointcut_bound: Vec<(String, usize)>,
}

impl ArgumentBindings {
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub fn join_point_arg_index(&self) -> Option<usize> {
        self.join_point_arg_index
    }

    pub fn join_point_static_part_arg_index(&self) -> Option<usize> {
        self.join_point_static_part_arg_index
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.name_to_param_index.get(name).copied()
    }

    /// Slot and declared type receiving the return value.
    pub fn returning(&self) -> Option<&(usize, TypeRef)> {
        self.returning.as_ref()
    }

    /// Slot and declared type receiving the raised fault.
    pub fn throwing(&self) -> Option<&(usize, TypeRef)> {
        self.throwing.as_ref()
    }

    /// Names the pointcut must bind at call time, with their slots.
    pub fn pointcut_bound(&self) -> &[(String, usize)] {
        &self.pointcut_bound
    }

    pub fn pointcut_bound_names(&self) -> Vec<&str> {
        self.pointcut_bound.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Number of slots filled from sources other than the pointcut.
    pub fn fixed_slot_count(&self) -> usize {
        usize::from(self.join_point_arg_index.is_some())
            + usize::from(self.join_point_static_part_arg_index.is_some())
            + usize::from(self.returning.is_some())
            + usize::from(self.throwing.is_some())
    }
}

/// Everything the binder needs to know about one declared advice.
pub(crate) struct BindingRequest<'a> {
    pub method: &'a AdviceMethod,
    pub kind: AdviceKind,
    pub arg_names: Option<&'a [String]>,
    pub returning: Option<&'a str>,
    pub throwing: Option<&'a str>,
    pub pointcut_names: &'a [String],
    pub resolver: &'a dyn ParameterNameResolver,
}

pub(crate) fn calculate(req: &BindingRequest<'_>) -> Result<ArgumentBindings> {
    let advice = req.method.name();
    let params = req.method.params();
    let fail = |message: String| Err(Error::binding(advice, message));

    if req.returning.is_some() && req.throwing.is_some() {
        return fail("returning and throwing cannot both be bound by one advice".to_string());
    }
    if req.returning.is_some() && req.kind != AdviceKind::AfterReturning {
        return fail(format!("returning is only supported for after-returning advice, not {}", req.kind));
    }
    if req.throwing.is_some() && req.kind != AdviceKind::AfterThrowing {
        return fail(format!("throwing is only supported for after-throwing advice, not {}", req.kind));
    }

    // Step 1: reserved join point slot
    let mut join_point_arg_index = None;
    let mut join_point_static_part_arg_index = None;
    for (i, param) in params.iter().enumerate() {
        let reserved = !matches!(param.kind, ParamKind::Value(_));
        if reserved && i > 0 {
            return fail(format!("join point parameter must be the first parameter, found at position {}", i));
        }
        match param.kind {
            ParamKind::JoinPoint => join_point_arg_index = Some(0),
            ParamKind::ProceedingJoinPoint => {
                if req.kind != AdviceKind::Around {
                    return fail(format!(
                        "a proceeding join point is only supported for around advice, not {}",
                        req.kind
                    ));
                }
                join_point_arg_index = Some(0);
            }
            ParamKind::StaticPart => join_point_static_part_arg_index = Some(0),
            ParamKind::Value(_) => {}
        }
    }
    let reserved = usize::from(join_point_arg_index.is_some() || join_point_static_part_arg_index.is_some());

    if params.len() == reserved {
        if let Some(name) = req.returning.or(req.throwing) {
            return fail(format!("binding name '{}' has no parameter to bind to", name));
        }
        return Ok(ArgumentBindings {
            parameter_names: params.iter().map(|_| THIS_JOIN_POINT.to_string()).collect(),
            join_point_arg_index,
            join_point_static_part_arg_index,
            name_to_param_index: HashMap::new(),
            returning: None,
            throwing: None,
            pointcut_bound: Vec::new(),
        });
    }

    // Step 2: names for the remaining parameters
    let names = match req.arg_names {
        Some(explicit) => {
            if explicit.len() == params.len() {
                explicit.to_vec()
            } else if reserved == 1 && explicit.len() + 1 == params.len() {
                let mut names = Vec::with_capacity(params.len());
                names.push(THIS_JOIN_POINT.to_string());
                names.extend(explicit.iter().cloned());
                names
            } else {
                return fail(format!(
                    "expecting {} argument names but got {}",
                    params.len() - reserved,
                    explicit.len()
                ));
            }
        }
        None => match req.resolver.parameter_names(req.method) {
            Some(names) if names.len() == params.len() => names,
            Some(names) => {
                return fail(format!(
                    "parameter name resolver returned {} names for {} parameters",
                    names.len(),
                    params.len()
                ))
            }
            None => {
                return fail(
                    "unable to determine parameter names; supply argument names explicitly".to_string(),
                )
            }
        },
    };

    let mut name_to_param_index = HashMap::new();
    for (i, name) in names.iter().enumerate().skip(reserved) {
        if name.is_empty() {
            return fail(format!("parameter {} has an empty name", i));
        }
        if name_to_param_index.insert(name.clone(), i).is_some() {
            return fail(format!("parameter name '{}' is used more than once", name));
        }
    }

    let value_type = |index: usize| match &params[index].kind {
        ParamKind::Value(ty) => ty.clone(),
        _ => builtin::any(),
    };

    // Steps 3 and 4: returning and throwing slots
    let mut returning = None;
    if let Some(name) = req.returning {
        match name_to_param_index.get(name) {
            Some(&index) => returning = Some((index, value_type(index))),
            None => return fail(format!("returning name '{}' does not match any parameter", name)),
        }
    }
    let mut throwing = None;
    if let Some(name) = req.throwing {
        match name_to_param_index.get(name) {
            Some(&index) => {
                let ty = value_type(index);
                if ty.name() != builtin::ANY && !builtin::fault().is_assignable_from(&ty) {
                    return fail(format!(
                        "throwing parameter '{}' has type {} which is not a fault type",
                        name,
                        ty.name()
                    ));
                }
                throwing = Some((index, ty));
            }
            None => return fail(format!("throwing name '{}' does not match any parameter", name)),
        }
    }

    // Step 5: the rest must come from the pointcut
    let offered: HashSet<&str> = req.pointcut_names.iter().map(String::as_str).collect();
    let mut pointcut_bound = Vec::new();
    for (i, name) in names.iter().enumerate().skip(reserved) {
        if Some(name.as_str()) == req.returning || Some(name.as_str()) == req.throwing {
            continue;
        }
        if !offered.contains(name.as_str()) {
            return fail(format!("parameter '{}' is not bound by the pointcut", name));
        }
        pointcut_bound.push((name.clone(), i));
    }

    Ok(ArgumentBindings {
        parameter_names: names,
        join_point_arg_index,
        join_point_static_part_arg_index,
        name_to_param_index,
        returning,
        throwing,
        pointcut_bound,
    })
}
