//! The thread's current dispatch object
//!
//! Published only while a call runs on a dispatch object whose
//! configuration sets `expose_proxy`. A target calling one of its own
//! operations through `AopContext::current_proxy()` gets advised again.

use interpose_core::{Error, ObjectRef, Result};
use std::cell::RefCell;

thread_local! {
    static CURRENT_PROXY: RefCell<Option<ObjectRef>> = const { RefCell::new(None) };
}

pub struct AopContext;

impl AopContext {
    /// The dispatch object handling the current call on this thread.
    pub fn current_proxy() -> Result<ObjectRef> {
        Self::try_current_proxy().ok_or_else(|| {
            Error::illegal_state(
                "cannot find current proxy: set expose_proxy on the configuration to make it available",
            )
        })
    }

    pub fn try_current_proxy() -> Option<ObjectRef> {
        CURRENT_PROXY.with(|slot| slot.borrow().clone())
    }
}

/// Publishes a dispatch object for the life of the guard, then restores
/// whatever was there before.
pub(crate) struct ProxyScope {
    previous: Option<ObjectRef>,
}

impl ProxyScope {
    pub(crate) fn enter(proxy: ObjectRef) -> Self {
        let previous = CURRENT_PROXY.with(|slot| slot.replace(Some(proxy)));
        Self { previous }
    }
}

impl Drop for ProxyScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_PROXY.with(|slot| *slot.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interpose_core::{same_object, ClosureObject, TypeBuilder};

    #[test]
    fn scopes_nest_and_restore() {
        let ty = TypeBuilder::class("Widget").build();
        let outer = ClosureObject::builder(&ty).build();
        let inner = ClosureObject::builder(&ty).build();

        assert!(AopContext::current_proxy().is_err());
        {
            let _outer = ProxyScope::enter(outer.clone());
            {
                let _inner = ProxyScope::enter(inner.clone());
                assert!(same_object(&AopContext::current_proxy().unwrap(), &inner));
            }
            assert!(same_object(&AopContext::current_proxy().unwrap(), &outer));
        }
        assert!(AopContext::try_current_proxy().is_none());
    }
}
