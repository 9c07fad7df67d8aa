//! In-memory configuration store with change notifications.

use std::cell::RefCell;
use std::collections::BTreeSet;

use serde_json::Value;

use crate::config::MarginConfig;
use crate::disposable::Disposable;
use crate::error::MarginError;
use crate::event::EventEmitter;

/// Describes which configuration keys changed.
///
/// Keys are dotted camelCase paths such as `codeLens.authors.enabled`.
/// The initializing event affects every section.
///
/// # Examples
///
/// ```
/// use margin_core::ConfigurationChangeEvent;
///
/// let event = ConfigurationChangeEvent::from_keys(["codeLens.authors.enabled"]);
/// assert!(event.affects("codeLens"));
/// assert!(event.affects("codeLens.authors"));
/// assert!(!event.affects("code"));
/// assert!(!event.affects("defaultDateStyle"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationChangeEvent {
    initializing: bool,
    changed: BTreeSet<String>,
}

impl ConfigurationChangeEvent {
    /// The synthetic event delivered once when a consumer starts up.
    pub fn initializing() -> Self {
        Self {
            initializing: true,
            changed: BTreeSet::new(),
        }
    }

    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            initializing: false,
            changed: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing
    }

    /// `section` or anything below it changed.
    pub fn affects(&self, section: &str) -> bool {
        self.initializing
            || self.changed.iter().any(|key| {
                key == section
                    || (key.starts_with(section) && key[section.len()..].starts_with('.'))
            })
    }

    pub fn changed_keys(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        !self.initializing && self.changed.is_empty()
    }
}

/// Holds the live [`MarginConfig`] and notifies listeners on update.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use margin_core::{ConfigurationStore, MarginConfig};
///
/// let store = ConfigurationStore::new(MarginConfig::default());
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let s = seen.clone();
/// let _sub = store.on_did_change(move |e| {
///     s.borrow_mut().extend(e.changed_keys().map(String::from));
/// });
///
/// let mut next = store.get();
/// next.code_lens.enabled = false;
/// store.update(next).unwrap();
/// assert_eq!(*seen.borrow(), vec!["codeLens.enabled".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct ConfigurationStore {
    current: RefCell<MarginConfig>,
    on_did_change: EventEmitter<ConfigurationChangeEvent>,
}

impl ConfigurationStore {
    pub fn new(config: MarginConfig) -> Self {
        Self {
            current: RefCell::new(config),
            on_did_change: EventEmitter::new(),
        }
    }

    /// Snapshot of the current configuration.
    pub fn get(&self) -> MarginConfig {
        self.current.borrow().clone()
    }

    /// Replace the configuration and notify listeners of the changed keys.
    ///
    /// No event fires when nothing changed.
    ///
    /// # Errors
    ///
    /// Returns [`MarginError::Serialization`] if either configuration cannot
    /// be converted to JSON for comparison.
    pub fn update(&self, config: MarginConfig) -> Result<ConfigurationChangeEvent, MarginError> {
        let before = serde_json::to_value(&*self.current.borrow())?;
        let after = serde_json::to_value(&config)?;

        let mut changed = BTreeSet::new();
        collect_changed_keys("", &before, &after, &mut changed);

        *self.current.borrow_mut() = config;

        let event = ConfigurationChangeEvent {
            initializing: false,
            changed,
        };
        if !event.is_empty() {
            tracing::debug!(keys = ?event.changed, "configuration changed");
            self.on_did_change.fire(&event);
        }
        Ok(event)
    }

    /// Subscribe to configuration changes.
    pub fn on_did_change(
        &self,
        listener: impl Fn(&ConfigurationChangeEvent) + 'static,
    ) -> Disposable {
        self.on_did_change.subscribe(listener)
    }
}

fn collect_changed_keys(prefix: &str, before: &Value, after: &Value, out: &mut BTreeSet<String>) {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
            for key in keys {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match (old.get(key), new.get(key)) {
                    (Some(a), Some(b)) => collect_changed_keys(&path, a, b, out),
                    _ => {
                        out.insert(path);
                    }
                }
            }
        }
        (a, b) if a != b => {
            out.insert(prefix.to_string());
        }
        _ => {}
    }
}
