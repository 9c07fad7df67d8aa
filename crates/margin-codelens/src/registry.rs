//! Where providers are registered and command context keys are published.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use margin_core::Disposable;
use serde_json::Value;

use crate::provider::{CodeLensProvider, DocumentSelector};

/// Accepts code lens providers for the documents a selector matches.
pub trait CodeLensRegistry {
    /// Register `provider`; dispose the handle to unregister.
    fn register(&self, selector: &DocumentSelector, provider: Rc<dyn CodeLensProvider>) -> Disposable;
}

/// Receives context keys that gate commands in the editor.
pub trait CommandContext {
    fn set_context(&self, key: &str, value: Value);
}

struct Registration {
    id: u64,
    selector: DocumentSelector,
    provider: Rc<dyn CodeLensProvider>,
}

#[derive(Default)]
struct Registrations {
    next_id: u64,
    entries: Vec<Registration>,
}

/// In-memory [`CodeLensRegistry`].
///
/// Clones share the same registrations.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    registrations: Rc<RefCell<Registrations>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.registrations.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Providers registered for documents with `scheme`, oldest first.
    pub fn providers_for(&self, scheme: &str) -> Vec<Rc<dyn CodeLensProvider>> {
        self.registrations
            .borrow()
            .entries
            .iter()
            .filter(|r| r.selector.matches(scheme))
            .map(|r| Rc::clone(&r.provider))
            .collect()
    }
}

impl CodeLensRegistry for ProviderRegistry {
    fn register(&self, selector: &DocumentSelector, provider: Rc<dyn CodeLensProvider>) -> Disposable {
        let id = {
            let mut registrations = self.registrations.borrow_mut();
            let id = registrations.next_id;
            registrations.next_id += 1;
            registrations.entries.push(Registration {
                id,
                selector: selector.clone(),
                provider,
            });
            id
        };

        let registrations = Rc::downgrade(&self.registrations);
        Disposable::new(move || {
            // Take the entry out before it drops so its provider is not
            // released while the registry is borrowed
            let removed = registrations.upgrade().and_then(|registrations| {
                let mut registrations = registrations.borrow_mut();
                let index = registrations.entries.iter().position(|r| r.id == id)?;
                Some(registrations.entries.remove(index))
            });
            drop(removed);
        })
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("registrations", &self.len())
            .finish()
    }
}

/// In-memory [`CommandContext`].
///
/// # Examples
///
/// ```
/// use margin_codelens::registry::{CommandContext, ContextKeys};
/// use serde_json::json;
///
/// let keys = ContextKeys::new();
/// keys.set_context("margin:canToggleCodeLens", json!(true));
/// assert_eq!(keys.get("margin:canToggleCodeLens"), Some(json!(true)));
/// ```
#[derive(Debug, Default)]
pub struct ContextKeys {
    values: RefCell<BTreeMap<String, Value>>,
    writes: Cell<usize>,
}

impl ContextKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    /// Total number of writes, including ones that did not change a value.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl CommandContext for ContextKeys {
    fn set_context(&self, key: &str, value: Value) {
        self.writes.set(self.writes.get() + 1);
        self.values.borrow_mut().insert(key.to_string(), value);
    }
}
