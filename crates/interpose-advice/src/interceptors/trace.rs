//! Logs entry and exit of every intercepted call

use crate::advice::Interceptor;
use crate::invocation::MethodInvocation;
use interpose_core::{Result, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct TraceInterceptor {
    include_arguments: bool,
    include_result: bool,
}

impl TraceInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_arguments(mut self, yes: bool) -> Self {
        self.include_arguments = yes;
        self
    }

    pub fn include_result(mut self, yes: bool) -> Self {
        self.include_result = yes;
        self
    }
}

impl Interceptor for TraceInterceptor {
    fn invoke(&self, inv: &mut dyn MethodInvocation) -> Result<Value> {
        let call = inv.static_part().signature();
        if self.include_arguments {
            let args: Vec<serde_json::Value> = inv.arguments().iter().map(Value::to_json).collect();
            debug!(call = %call, args = %serde_json::Value::Array(args), "Entering");
        } else {
            debug!(call = %call, "Entering");
        }

        match inv.proceed() {
            Ok(ret) => {
                if self.include_result {
                    debug!(call = %call, result = %ret.to_json(), "Exiting");
                } else {
                    debug!(call = %call, "Exiting");
                }
                Ok(ret)
            }
            Err(e) => {
                warn!(call = %call, error = %e, "Exiting with error");
                Err(e)
            }
        }
    }

    fn describe(&self) -> String {
        "trace".to_string()
    }
}
