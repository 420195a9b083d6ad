//! Proxy configuration and change propagation
//!
//! The configuration is the one long-lived mutable piece shared by every
//! dispatch object built from it. Readers take an `Arc` snapshot; writers
//! publish a new snapshot under a write lock. Every change to the advisors
//! or the target source bumps a generation counter, and resolved chains
//! are cached with the generation they were computed under, so a change
//! makes older entries stale without touching the cache.
//!
//! Once frozen, the snapshot is also published to a `OnceLock` and reads
//! stop taking the lock.

use crate::resolver::{build_chain, ChainStep};
use crate::target::{EmptyTargetSource, TargetSource};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use interpose_advice::{Advice, Advisor};
use interpose_core::{Error, Operation, Result, TypeRef};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyFlags {
    /// Substitute a subtype of the target's concrete type.
    pub proxy_target_class: bool,
    /// Publish the dispatch object to the thread's current-proxy slot during calls.
    pub expose_proxy: bool,
    /// Reject all further changes.
    pub frozen: bool,
    /// Prefer subclass substitution.
    pub optimize: bool,
    /// Hide the configuration: introspection calls go to the target.
    pub opaque: bool,
}

/// Observer of a configuration.
pub trait ConfigListener: Send + Sync {
    /// The first dispatch object was built from the configuration.
    fn activated(&self, _config: &ProxyConfig) {}

    /// The advisor list changed.
    fn advice_changed(&self, _config: &ProxyConfig) {}
}

/// An immutable view of the configuration at one point in time.
#[derive(Clone)]
pub struct ConfigSnapshot {
    pub target_source: Arc<dyn TargetSource>,
    pub advisors: Vec<Arc<Advisor>>,
    pub interfaces: Vec<TypeRef>,
    pub flags: ProxyFlags,
    pub generation: u64,
}

impl ConfigSnapshot {
    pub fn describe(&self) -> String {
        let interfaces: Vec<&str> = self.interfaces.iter().map(|i| i.name()).collect();
        let advisors: Vec<String> = self.advisors.iter().map(|a| a.describe()).collect();
        let target_type = self.target_source.target_type();
        format!(
            "interfaces=[{}]; {} advisors=[{}]; target_type={}; proxy_target_class={}; optimize={}; expose_proxy={}; frozen={}; opaque={}",
            interfaces.join(", "),
            advisors.len(),
            advisors.join(", "),
            target_type.as_ref().map_or("none", |t| t.name()),
            self.flags.proxy_target_class,
            self.flags.optimize,
            self.flags.expose_proxy,
            self.flags.frozen,
            self.flags.opaque,
        )
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct ChainKey {
    operation: String,
    target_type: String,
}

struct CachedChain {
    generation: u64,
    chain: Arc<[ChainStep]>,
}

pub struct ProxyConfig {
    state: RwLock<Arc<ConfigSnapshot>>,
    frozen: OnceLock<Arc<ConfigSnapshot>>,
    chains: DashMap<ChainKey, CachedChain>,
    listeners: RwLock<Vec<Arc<dyn ConfigListener>>>,
    active: AtomicBool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new(Arc::new(EmptyTargetSource::new()))
    }
}

impl ProxyConfig {
    pub fn new(target_source: Arc<dyn TargetSource>) -> Self {
        Self {
            state: RwLock::new(Arc::new(ConfigSnapshot {
                target_source,
                advisors: Vec::new(),
                interfaces: Vec::new(),
                flags: ProxyFlags::default(),
                generation: 0,
            })),
            frozen: OnceLock::new(),
            chains: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
            active: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        match self.frozen.get() {
            Some(snapshot) => snapshot.clone(),
            None => self.state.read().clone(),
        }
    }

    /// Apply `change` to a copy of the current state and publish it.
    /// `change` reports whether the advisors (and so the chains) changed.
    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut ConfigSnapshot) -> Result<bool>,
    {
        let advice_changed = {
            let mut state = self.state.write();
            if state.flags.frozen {
                return Err(Error::Frozen);
            }
            let mut next = ConfigSnapshot::clone(&state);
            let advice_changed = change(&mut next)?;
            if advice_changed {
                next.generation += 1;
            }
            let next = Arc::new(next);
            if next.flags.frozen {
                let _ = self.frozen.set(next.clone());
                info!(generation = next.generation, "Proxy configuration frozen");
            }
            *state = next;
            advice_changed
        };
        if advice_changed {
            self.notify(|l| l.advice_changed(self));
        }
        Ok(())
    }

    fn notify(&self, f: impl Fn(&dyn ConfigListener)) {
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            f(listener.as_ref());
        }
    }

    // ------------------------------------------------------------------
    // Target
    // ------------------------------------------------------------------

    pub fn target_source(&self) -> Arc<dyn TargetSource> {
        self.snapshot().target_source.clone()
    }

    pub fn set_target_source(&self, target_source: Arc<dyn TargetSource>) -> Result<()> {
        self.update(|s| {
            s.target_source = target_source;
            Ok(true)
        })
    }

    pub fn target_type(&self) -> Option<TypeRef> {
        self.snapshot().target_source.target_type()
    }

    // ------------------------------------------------------------------
    // Interfaces
    // ------------------------------------------------------------------

    pub fn interfaces(&self) -> Vec<TypeRef> {
        self.snapshot().interfaces.clone()
    }

    pub fn add_interface(&self, iface: &TypeRef) -> Result<()> {
        if !iface.is_interface() {
            return Err(Error::config(format!("{} is not an interface", iface.name())));
        }
        self.update(|s| {
            if !s.interfaces.iter().any(|i| i.name() == iface.name()) {
                s.interfaces.push(iface.clone());
            }
            Ok(false)
        })
    }

    pub fn remove_interface(&self, name: &str) -> Result<bool> {
        let mut removed = false;
        self.update(|s| {
            let before = s.interfaces.len();
            s.interfaces.retain(|i| i.name() != name);
            removed = s.interfaces.len() != before;
            Ok(false)
        })?;
        Ok(removed)
    }

    pub fn is_interface_proxied(&self, name: &str) -> bool {
        self.snapshot()
            .interfaces
            .iter()
            .any(|i| i.find_supertype(name).is_some())
    }

    // ------------------------------------------------------------------
    // Advisors
    // ------------------------------------------------------------------

    pub fn advisors(&self) -> Vec<Arc<Advisor>> {
        self.snapshot().advisors.clone()
    }

    pub fn advisor_count(&self) -> usize {
        self.snapshot().advisors.len()
    }

    pub fn add_advice(&self, advice: Advice) -> Result<()> {
        self.add_advisor(Advisor::for_advice(advice))
    }

    /// Append to the chain. Chains run in list order; `Advisor::order` is
    /// only consulted by `AdvisorRegistry::sorted`.
    pub fn add_advisor(&self, advisor: impl Into<Arc<Advisor>>) -> Result<()> {
        let advisor = advisor.into();
        self.update(|s| {
            let pos = s.advisors.len();
            insert_advisor(s, pos, advisor)
        })
    }

    pub fn add_advisor_at(&self, pos: usize, advisor: impl Into<Arc<Advisor>>) -> Result<()> {
        let advisor = advisor.into();
        self.update(|s| {
            if pos > s.advisors.len() {
                return Err(Error::config(format!(
                    "illegal advisor position {} (only {} advisors)",
                    pos,
                    s.advisors.len()
                )));
            }
            insert_advisor(s, pos, advisor)
        })
    }

    pub fn add_advisors(&self, advisors: impl IntoIterator<Item = Arc<Advisor>>) -> Result<()> {
        let advisors: Vec<Arc<Advisor>> = advisors.into_iter().collect();
        self.update(|s| {
            for advisor in advisors {
                let pos = s.advisors.len();
                insert_advisor(s, pos, advisor)?;
            }
            Ok(true)
        })
    }

    pub fn remove_advisor_at(&self, index: usize) -> Result<Arc<Advisor>> {
        let mut removed = None;
        self.update(|s| {
            if index >= s.advisors.len() {
                return Err(Error::config(format!(
                    "advisor index {} out of bounds (only {} advisors)",
                    index,
                    s.advisors.len()
                )));
            }
            removed = Some(take_advisor(s, index));
            Ok(true)
        })?;
        removed.ok_or_else(|| Error::illegal_state("advisor removal produced nothing"))
    }

    /// Remove a registered advisor by identity.
    pub fn remove_advisor(&self, advisor: &Arc<Advisor>) -> Result<bool> {
        let mut removed = false;
        self.update(|s| {
            let Some(index) = position_of(s, advisor) else {
                return Ok(false);
            };
            take_advisor(s, index);
            removed = true;
            Ok(true)
        })?;
        Ok(removed)
    }

    /// Swap `old` for `new` in place, keeping its chain position.
    pub fn replace_advisor(&self, old: &Arc<Advisor>, new: impl Into<Arc<Advisor>>) -> Result<bool> {
        let new = new.into();
        let mut replaced = false;
        self.update(|s| {
            let Some(index) = position_of(s, old) else {
                return Ok(false);
            };
            take_advisor(s, index);
            insert_advisor(s, index, new)?;
            replaced = true;
            Ok(true)
        })?;
        Ok(replaced)
    }

    pub fn index_of(&self, advisor: &Arc<Advisor>) -> Option<usize> {
        position_of(&self.snapshot(), advisor)
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    pub fn flags(&self) -> ProxyFlags {
        self.snapshot().flags
    }

    pub fn set_flags(&self, flags: ProxyFlags) -> Result<()> {
        self.update(|s| {
            s.flags = flags;
            Ok(false)
        })
    }

    pub fn set_proxy_target_class(&self, value: bool) -> Result<()> {
        self.update(|s| {
            s.flags.proxy_target_class = value;
            Ok(false)
        })
    }

    pub fn set_expose_proxy(&self, value: bool) -> Result<()> {
        self.update(|s| {
            s.flags.expose_proxy = value;
            Ok(false)
        })
    }

    pub fn set_optimize(&self, value: bool) -> Result<()> {
        self.update(|s| {
            s.flags.optimize = value;
            Ok(false)
        })
    }

    pub fn set_opaque(&self, value: bool) -> Result<()> {
        self.update(|s| {
            s.flags.opaque = value;
            Ok(false)
        })
    }

    pub fn set_frozen(&self, value: bool) -> Result<()> {
        self.update(|s| {
            s.flags.frozen = value;
            Ok(false)
        })
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get().is_some()
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn add_listener(&self, listener: Arc<dyn ConfigListener>) {
        self.listeners.write().push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ConfigListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Called when a dispatch object is built. Listeners hear about the
    /// first one only.
    pub fn activate(&self) {
        if !self.active.swap(true, Ordering::AcqRel) {
            debug!("Proxy configuration activated");
            self.notify(|l| l.activated(self));
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Chains
    // ------------------------------------------------------------------

    pub fn generation(&self) -> u64 {
        self.snapshot().generation
    }

    /// The chain for `op` on `target_type` under the current advisors.
    ///
    /// Entries computed under an older generation are recomputed. Racing
    /// callers may both compute; an entry is never replaced by one from
    /// an older generation.
    pub fn chain_for(&self, op: &Operation, target_type: &TypeRef) -> Arc<[ChainStep]> {
        let snapshot = self.snapshot();
        let key = ChainKey {
            operation: op.key(),
            target_type: target_type.name().to_string(),
        };
        if let Some(cached) = self.chains.get(&key) {
            if cached.generation == snapshot.generation {
                return cached.chain.clone();
            }
        }

        let chain: Arc<[ChainStep]> = build_chain(&snapshot.advisors, op, target_type).into();
        debug!(
            operation = %key.operation,
            target_type = %key.target_type,
            generation = snapshot.generation,
            steps = chain.len(),
            "Chain resolved"
        );
        match self.chains.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().generation <= snapshot.generation {
                    entry.insert(CachedChain {
                        generation: snapshot.generation,
                        chain: chain.clone(),
                    });
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(CachedChain {
                    generation: snapshot.generation,
                    chain: chain.clone(),
                });
            }
        }
        chain
    }

    pub fn cached_chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn describe(&self) -> String {
        self.snapshot().describe()
    }
}

fn position_of(s: &ConfigSnapshot, advisor: &Arc<Advisor>) -> Option<usize> {
    s.advisors.iter().position(|a| Arc::ptr_eq(a, advisor))
}

/// Remove the advisor at `index` along with any interfaces it introduced.
fn take_advisor(s: &mut ConfigSnapshot, index: usize) -> Arc<Advisor> {
    let advisor = s.advisors.remove(index);
    if let Some(intro) = advisor.as_introduction() {
        for iface in intro.interfaces() {
            s.interfaces.retain(|i| i.name() != iface.name());
        }
    }
    advisor
}

fn insert_advisor(s: &mut ConfigSnapshot, pos: usize, advisor: Arc<Advisor>) -> Result<bool> {
    if let Some(intro) = advisor.as_introduction() {
        for iface in intro.interfaces() {
            if !iface.is_interface() {
                return Err(Error::config(format!("{} is not an interface and cannot be introduced", iface.name())));
            }
            if s.interfaces.iter().any(|i| i.name() == iface.name()) {
                warn!(interface = %iface.name(), "Introduced interface already proxied");
            } else {
                s.interfaces.push(iface.clone());
            }
        }
    }
    s.advisors.insert(pos, advisor);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use interpose_core::{builtin, TypeBuilder};
    use std::sync::atomic::AtomicUsize;

    fn account() -> TypeRef {
        TypeBuilder::class("Account")
            .operation(Operation::new("deposit").param(&builtin::int()))
            .build()
    }

    #[derive(Default)]
    struct Counting {
        activated: AtomicUsize,
        changed: AtomicUsize,
    }

    impl ConfigListener for Counting {
        fn activated(&self, _config: &ProxyConfig) {
            self.activated.fetch_add(1, Ordering::SeqCst);
        }

        fn advice_changed(&self, _config: &ProxyConfig) {
            self.changed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn advisor_changes_bump_generation_and_notify() {
        let config = ProxyConfig::default();
        let listener = Arc::new(Counting::default());
        config.add_listener(listener.clone());

        config.add_advice(Advice::before(|_, _, _| Ok(()))).unwrap();
        config.set_expose_proxy(true).unwrap();
        config.remove_advisor_at(0).unwrap();

        assert_eq!(config.generation(), 2);
        assert_eq!(listener.changed.load(Ordering::SeqCst), 2);

        config.activate();
        config.activate();
        assert_eq!(listener.activated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_chain_is_recomputed() {
        let config = ProxyConfig::default();
        let ty = account();
        let op = ty.find_operation("deposit").unwrap();

        let empty = config.chain_for(&op, &ty);
        assert!(empty.is_empty());
        assert!(Arc::ptr_eq(&empty, &config.chain_for(&op, &ty)));

        config.add_advice(Advice::around(|inv| inv.proceed())).unwrap();
        let chain = config.chain_for(&op, &ty);
        assert_eq!(chain.len(), 1);
        assert_eq!(config.cached_chain_count(), 1);
    }

    #[test]
    fn frozen_rejects_changes() {
        let config = ProxyConfig::default();
        config.set_frozen(true).unwrap();
        assert!(config.is_frozen());
        assert!(matches!(config.add_advice(Advice::around(|inv| inv.proceed())), Err(Error::Frozen)));
        assert!(matches!(config.set_frozen(false), Err(Error::Frozen)));
        assert_eq!(config.advisor_count(), 0);
    }

    #[test]
    fn removing_an_introduction_removes_its_interfaces() {
        use interpose_advice::DelegatingIntroduction;
        use interpose_core::ClosureObject;

        let lockable = TypeBuilder::interface("Lockable").build();
        let mixin = TypeBuilder::class("LockMixin").implements(&lockable).build();
        let intro = Advisor::introduction(DelegatingIntroduction::new(ClosureObject::builder(&mixin).build())).unwrap();

        let config = ProxyConfig::default();
        config.add_advisor(intro).unwrap();
        assert!(config.is_interface_proxied("Lockable"));
        config.remove_advisor_at(0).unwrap();
        assert!(!config.is_interface_proxied("Lockable"));
    }

    fn lockable_introduction() -> Arc<Advisor> {
        use interpose_advice::DelegatingIntroduction;
        use interpose_core::ClosureObject;

        let lockable = TypeBuilder::interface("Lockable").build();
        let mixin = TypeBuilder::class("LockMixin").implements(&lockable).build();
        Arc::new(Advisor::introduction(DelegatingIntroduction::new(ClosureObject::builder(&mixin).build())).unwrap())
    }

    #[test]
    fn replacing_with_an_introduction_adds_its_interfaces() {
        let config = ProxyConfig::default();
        let plain = Arc::new(Advisor::for_advice(Advice::before(|_, _, _| Ok(()))));
        let after = Arc::new(Advisor::for_advice(Advice::after(|_, _, _| Ok(()))));
        config.add_advisor(plain.clone()).unwrap();
        config.add_advisor(after.clone()).unwrap();

        let intro = lockable_introduction();
        assert!(config.replace_advisor(&plain, intro.clone()).unwrap());
        assert!(config.is_interface_proxied("Lockable"));
        assert_eq!(config.index_of(&intro), Some(0));
        assert_eq!(config.index_of(&after), Some(1));
        assert_eq!(config.index_of(&plain), None);
    }

    #[test]
    fn replacing_an_introduction_drops_its_interfaces() {
        let config = ProxyConfig::default();
        let intro = lockable_introduction();
        config.add_advisor(intro.clone()).unwrap();
        assert!(config.is_interface_proxied("Lockable"));

        let plain = Arc::new(Advisor::for_advice(Advice::before(|_, _, _| Ok(()))));
        assert!(config.replace_advisor(&intro, plain.clone()).unwrap());
        assert!(!config.is_interface_proxied("Lockable"));
        assert_eq!(config.advisors().len(), 1);
        assert_eq!(config.index_of(&plain), Some(0));
    }

    #[test]
    fn absent_advisor_is_left_alone() {
        let config = ProxyConfig::default();
        let kept = Arc::new(Advisor::for_advice(Advice::before(|_, _, _| Ok(()))));
        let stranger = Arc::new(Advisor::for_advice(Advice::before(|_, _, _| Ok(()))));
        config.add_advisor(kept.clone()).unwrap();
        let generation = config.generation();

        assert!(!config.remove_advisor(&stranger).unwrap());
        assert!(!config.replace_advisor(&stranger, Advisor::for_advice(Advice::after(|_, _, _| Ok(())))).unwrap());
        assert_eq!(config.generation(), generation);
        assert_eq!(config.index_of(&kept), Some(0));
    }

    #[test]
    fn identity_writes_race_without_panicking() {
        let config = ProxyConfig::default();
        let anchor = Arc::new(Advisor::for_advice(Advice::before(|_, _, _| Ok(()))));
        config.add_advisor(anchor.clone()).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..500 {
                    config.add_advice(Advice::after(|_, _, _| Ok(()))).unwrap();
                    config.remove_advisor_at(0).unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..500 {
                    let current = config.advisors();
                    if let Some(last) = current.last() {
                        config.replace_advisor(last, Advisor::for_advice(Advice::before(|_, _, _| Ok(())))).unwrap();
                    }
                }
            });
        });

        // Each add is paired with a removal, so only one advisor survives.
        assert_eq!(config.advisor_count(), 1);
    }
}
