//! Advisors: advice paired with where it applies

use crate::advice::{Advice, Interceptor};
use crate::declared::DeclaredAdvice;
use crate::introduction::DelegatingIntroduction;
use interpose_core::{Error, Result, TypeRef};
use interpose_pointcut::{ClassFilter, Pointcut, TrueClassFilter, TruePointcut};
use std::fmt;
use std::sync::Arc;

/// Order of advisors that did not ask for one. Runs after all ordered ones.
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

#[derive(Clone)]
pub enum Advisor {
    Pointcut(PointcutAdvisor),
    Introduction(IntroductionAdvisor),
}

impl Advisor {
    pub fn new(pointcut: Arc<dyn Pointcut>, advice: Advice) -> Self {
        Self::Pointcut(PointcutAdvisor::new(pointcut, advice))
    }

    /// Advice applying to every operation.
    pub fn for_advice(advice: Advice) -> Self {
        Self::new(TruePointcut::shared(), advice)
    }

    /// Advisor for declared advice. The argument bindings are computed and
    /// checked here, so a bad declaration fails before any proxy uses it.
    pub fn declared(advice: DeclaredAdvice) -> Result<Self> {
        advice.argument_bindings()?;
        let pointcut = advice.pointcut().clone();
        Ok(Self::new(pointcut, Advice::declared(Arc::new(advice))))
    }

    pub fn introduction(introduction: DelegatingIntroduction) -> Result<Self> {
        IntroductionAdvisor::new(introduction).map(Self::Introduction)
    }

    pub fn with_order(self, order: i32) -> Self {
        match self {
            Self::Pointcut(a) => Self::Pointcut(a.with_order(order)),
            Self::Introduction(a) => Self::Introduction(a.with_order(order)),
        }
    }

    pub fn order(&self) -> i32 {
        match self {
            Self::Pointcut(a) => a.order,
            Self::Introduction(a) => a.order,
        }
    }

    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        match self {
            Self::Pointcut(a) => &a.interceptor,
            Self::Introduction(a) => &a.interceptor,
        }
    }

    pub fn is_introduction(&self) -> bool {
        matches!(self, Self::Introduction(_))
    }

    pub fn as_pointcut_advisor(&self) -> Option<&PointcutAdvisor> {
        match self {
            Self::Pointcut(a) => Some(a),
            Self::Introduction(_) => None,
        }
    }

    pub fn as_introduction(&self) -> Option<&IntroductionAdvisor> {
        match self {
            Self::Introduction(a) => Some(a),
            Self::Pointcut(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Pointcut(a) => format!("{} @ {} [order {}]", a.advice.describe(), a.pointcut.expression(), a.order),
            Self::Introduction(a) => {
                let names: Vec<&str> = a.interfaces.iter().map(|i| i.name()).collect();
                format!("introduction of {} [order {}]", names.join(", "), a.order)
            }
        }
    }
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl From<PointcutAdvisor> for Advisor {
    fn from(a: PointcutAdvisor) -> Self {
        Self::Pointcut(a)
    }
}

impl From<IntroductionAdvisor> for Advisor {
    fn from(a: IntroductionAdvisor) -> Self {
        Self::Introduction(a)
    }
}

#[derive(Clone)]
pub struct PointcutAdvisor {
    advice: Advice,
    pointcut: Arc<dyn Pointcut>,
    order: i32,
    is_global: bool,
    interceptor: Arc<dyn Interceptor>,
}

impl PointcutAdvisor {
    pub fn new(pointcut: Arc<dyn Pointcut>, advice: Advice) -> Self {
        let interceptor = advice.to_interceptor();
        Self {
            advice,
            pointcut,
            order: LOWEST_PRECEDENCE,
            is_global: false,
            interceptor,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// A global advisor is a candidate for every type; its pointcut is
    /// still evaluated per call.
    pub fn global(mut self) -> Self {
        self.is_global = true;
        self
    }

    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    pub fn pointcut(&self) -> &Arc<dyn Pointcut> {
        &self.pointcut
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn is_global(&self) -> bool {
        self.is_global
    }

    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        &self.interceptor
    }
}

/// Adds interfaces to the dispatch object, answered by an interceptor.
#[derive(Clone)]
pub struct IntroductionAdvisor {
    class_filter: Arc<dyn ClassFilter>,
    interfaces: Vec<TypeRef>,
    interceptor: Arc<dyn Interceptor>,
    order: i32,
}

impl IntroductionAdvisor {
    pub fn new(introduction: DelegatingIntroduction) -> Result<Self> {
        let interfaces = introduction.interfaces().to_vec();
        Self::with_interceptor(interfaces, Arc::new(introduction))
    }

    pub fn with_interceptor(interfaces: Vec<TypeRef>, interceptor: Arc<dyn Interceptor>) -> Result<Self> {
        if interfaces.is_empty() {
            return Err(Error::config("introduction advisor introduces no interfaces"));
        }
        if let Some(bad) = interfaces.iter().find(|i| !i.is_interface()) {
            return Err(Error::config(format!("{} is not an interface and cannot be introduced", bad.name())));
        }
        Ok(Self {
            class_filter: TrueClassFilter::shared(),
            interfaces,
            interceptor,
            order: LOWEST_PRECEDENCE,
        })
    }

    /// Restrict the types this introduction applies to.
    pub fn within(mut self, filter: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = filter;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn class_filter(&self) -> &Arc<dyn ClassFilter> {
        &self.class_filter
    }

    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        &self.interceptor
    }
}
