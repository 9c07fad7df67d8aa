//! Creates, resets and tears down the code lens provider.
//!
//! The controller follows configuration: while code lenses are enabled and at
//! least one lens kind is on, exactly one provider is registered and wired to
//! document state events; otherwise none is. Document saves and settled edits
//! reset the provider so its lenses are recomputed.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use margin_annotations::editor::TextEditor;
use margin_core::{ConfigurationChangeEvent, ConfigurationStore, Disposable};
use serde_json::json;
use tracing::info;

use crate::provider::{CodeLensProvider, DocumentSelector, ResetReason};
use crate::registry::{CodeLensRegistry, CommandContext};
use crate::tracker::{BlameStateChangeEvent, DirtyIdleStateChangeEvent, DocumentTracker};

/// Context key telling the editor whether the toggle command is available.
pub const CAN_TOGGLE_CODE_LENS: &str = "margin:canToggleCodeLens";

/// Configuration sections whose change re-evaluates the provider.
const WATCHED_SECTIONS: [&str; 3] = ["codeLens", "defaultDateStyle", "defaultDateFormat"];

/// A live provider together with everything that must be released with it.
struct ActiveProvider<P> {
    provider: Rc<P>,
    subscriptions: Disposable,
}

struct ControllerState<P> {
    can_toggle: bool,
    active: Option<ActiveProvider<P>>,
}

/// Collaborators of a [`CodeLensController`].
pub struct ControllerContext {
    pub config: Rc<ConfigurationStore>,
    pub tracker: Rc<dyn DocumentTracker>,
    pub registry: Rc<dyn CodeLensRegistry>,
    pub context: Rc<dyn CommandContext>,
}

struct Inner<P> {
    config: Rc<ConfigurationStore>,
    tracker: Rc<dyn DocumentTracker>,
    registry: Rc<dyn CodeLensRegistry>,
    context: Rc<dyn CommandContext>,
    selector: DocumentSelector,
    create: Box<dyn Fn() -> Rc<P>>,
    state: RefCell<ControllerState<P>>,
    config_subscription: RefCell<Option<Disposable>>,
}

/// Owns the code lens provider's lifecycle.
///
/// Event handlers hold weak references to the controller, and no internal
/// borrow is held while a provider, registry or tracker is called, so
/// providers may re-enter the controller from `reset`.
pub struct CodeLensController<P: CodeLensProvider + 'static> {
    inner: Rc<Inner<P>>,
}

impl<P: CodeLensProvider + 'static> CodeLensController<P> {
    /// Subscribe to configuration changes and apply the current
    /// configuration as if it had just been loaded.
    ///
    /// `create` builds a fresh provider each time one is needed; providers
    /// are registered under `selector`.
    pub fn new(
        collaborators: ControllerContext,
        selector: DocumentSelector,
        create: impl Fn() -> Rc<P> + 'static,
    ) -> Self {
        let inner = Rc::new(Inner {
            config: collaborators.config,
            tracker: collaborators.tracker,
            registry: collaborators.registry,
            context: collaborators.context,
            selector,
            create: Box::new(create),
            state: RefCell::new(ControllerState {
                can_toggle: false,
                active: None,
            }),
            config_subscription: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        let subscription = inner.config.on_did_change(move |e| {
            if let Some(inner) = weak.upgrade() {
                Inner::on_configuration_changed(&inner, e);
            }
        });
        *inner.config_subscription.borrow_mut() = Some(subscription);

        Inner::on_configuration_changed(&inner, &ConfigurationChangeEvent::initializing());

        Self { inner }
    }

    /// Whether the toggle command is currently allowed.
    pub fn can_toggle(&self) -> bool {
        self.inner.state.borrow().can_toggle
    }

    /// The live provider, if any.
    pub fn provider(&self) -> Option<Rc<P>> {
        self.inner.provider()
    }

    /// Flip between having a provider and having none.
    ///
    /// Does nothing unless [`can_toggle`](Self::can_toggle). A provider
    /// created here follows blame state changes only.
    pub fn toggle_code_lens(&self, _editor: &dyn TextEditor) {
        if !self.can_toggle() {
            return;
        }

        info!("toggling code lens");
        let previous = self.inner.state.borrow_mut().active.take();
        match previous {
            Some(active) => active.subscriptions.dispose(),
            None => {
                let active = Inner::activate(&self.inner, false);
                self.inner.install(active);
            }
        }
    }

    /// Release the provider and stop following configuration.
    pub fn dispose(&self) {
        let active = self.inner.state.borrow_mut().active.take();
        if let Some(active) = active {
            active.subscriptions.dispose();
        }
        let subscription = self.inner.config_subscription.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.dispose();
        }
    }
}

impl<P: CodeLensProvider + 'static> Inner<P> {
    fn provider(&self) -> Option<Rc<P>> {
        self.state
            .borrow()
            .active
            .as_ref()
            .map(|active| Rc::clone(&active.provider))
    }

    fn on_configuration_changed(this: &Rc<Self>, e: &ConfigurationChangeEvent) {
        if !WATCHED_SECTIONS.iter().any(|section| e.affects(section)) {
            return;
        }
        if !e.is_initializing() {
            info!("code lens config changed; resetting code lens provider");
        }

        let cfg = this.config.get().code_lens;
        if cfg.is_active() {
            match this.provider() {
                Some(provider) => provider.reset(None),
                None => {
                    let active = Self::activate(this, true);
                    this.install(active);
                }
            }
        } else {
            let previous = this.state.borrow_mut().active.take();
            if let Some(active) = previous {
                active.subscriptions.dispose();
            }
        }

        let can_toggle = cfg.can_toggle();
        this.state.borrow_mut().can_toggle = can_toggle;
        this.context.set_context(CAN_TOGGLE_CODE_LENS, json!(can_toggle));
    }

    /// Create and register a provider and subscribe to document events.
    fn activate(this: &Rc<Self>, follow_dirty_idle: bool) -> ActiveProvider<P> {
        let provider = (this.create)();
        let registered: Rc<dyn CodeLensProvider> = provider.clone();

        let mut subscriptions = vec![this.registry.register(&this.selector, registered)];

        let weak: Weak<Self> = Rc::downgrade(this);
        subscriptions.push(this.tracker.on_did_change_blame_state(Box::new(move |e| {
            if let Some(inner) = weak.upgrade() {
                inner.on_blame_state_changed(e);
            }
        })));

        if follow_dirty_idle {
            let weak: Weak<Self> = Rc::downgrade(this);
            subscriptions.push(this.tracker.on_did_change_dirty_idle_state(Box::new(move |e| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_dirty_idle_state_changed(e);
                }
            })));
        }

        ActiveProvider {
            provider,
            subscriptions: Disposable::from_all(subscriptions),
        }
    }

    fn install(&self, active: ActiveProvider<P>) {
        let replaced = self.state.borrow_mut().active.replace(active);
        if let Some(replaced) = replaced {
            replaced.subscriptions.dispose();
        }
    }

    fn on_blame_state_changed(&self, e: &BlameStateChangeEvent) {
        // Only a save makes blame available again without a re-render
        if !e.blameable {
            return;
        }
        let Some(provider) = self.provider() else {
            return;
        };

        info!(uri = %e.uri, "blame state changed; resetting code lens provider");
        provider.reset(Some(ResetReason::Saved));
    }

    fn on_dirty_idle_state_changed(&self, e: &DirtyIdleStateChangeEvent) {
        if !e.document.is_blameable {
            return;
        }
        let Some(provider) = self.provider() else {
            return;
        };

        info!(uri = %e.document.uri, "dirty idle state changed; resetting code lens provider");
        provider.reset(Some(ResetReason::Idle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use margin_annotations::editor::TextBuffer;
    use margin_core::{CodeLensConfig, CodeLensItemConfig, GitUri, MarginConfig};
    use serde_json::Value;

    use crate::registry::{ContextKeys, ProviderRegistry};
    use crate::tracker::DocumentStateTracker;

    #[derive(Default)]
    struct RecordingProvider {
        resets: RefCell<Vec<Option<ResetReason>>>,
    }

    impl CodeLensProvider for RecordingProvider {
        fn reset(&self, reason: Option<ResetReason>) {
            self.resets.borrow_mut().push(reason);
        }

        fn on_did_change_code_lenses(&self, _listener: Box<dyn Fn()>) -> Disposable {
            Disposable::noop()
        }
    }

    struct Harness {
        config: Rc<ConfigurationStore>,
        tracker: Rc<DocumentStateTracker>,
        registry: ProviderRegistry,
        context: Rc<ContextKeys>,
        created: Rc<Cell<usize>>,
        controller: CodeLensController<RecordingProvider>,
        uri: GitUri,
    }

    fn code_lens(enabled: bool, recent: bool, authors: bool) -> MarginConfig {
        MarginConfig {
            code_lens: CodeLensConfig {
                enabled,
                recent_change: CodeLensItemConfig { enabled: recent },
                authors: CodeLensItemConfig { enabled: authors },
            },
            ..MarginConfig::default()
        }
    }

    fn harness(config: MarginConfig) -> Harness {
        let config = Rc::new(ConfigurationStore::new(config));
        let tracker = Rc::new(DocumentStateTracker::new());
        let registry = ProviderRegistry::new();
        let context = Rc::new(ContextKeys::new());
        let created = Rc::new(Cell::new(0));

        let counter = Rc::clone(&created);
        let controller = CodeLensController::new(
            ControllerContext {
                config: Rc::clone(&config),
                tracker: tracker.clone(),
                registry: Rc::new(registry.clone()),
                context: context.clone(),
            },
            DocumentSelector::new(["file"]),
            move || {
                counter.set(counter.get() + 1);
                Rc::new(RecordingProvider::default())
            },
        );

        let uri = GitUri::new("/repo", "src/lib.rs");
        tracker.open(&uri, true);

        Harness {
            config,
            tracker,
            registry,
            context,
            created,
            controller,
            uri,
        }
    }

    impl Harness {
        fn set(&self, config: MarginConfig) {
            self.config.update(config).unwrap();
        }

        fn resets(&self) -> Vec<Option<ResetReason>> {
            self.controller
                .provider()
                .map(|p| p.resets.borrow().clone())
                .unwrap_or_default()
        }

        /// A provider exists exactly when its registration and blame-state
        /// subscription exist.
        fn assert_consistent(&self) {
            let present = self.controller.provider().is_some();
            assert_eq!(self.registry.len(), usize::from(present));
            assert_eq!(self.tracker.blame_state_listener_count(), usize::from(present));
        }
    }

    #[test]
    fn initial_enabled_config_creates_and_registers_provider() {
        let h = harness(MarginConfig::default());
        assert!(h.controller.provider().is_some());
        assert_eq!(h.registry.len(), 1);
        assert_eq!(h.tracker.dirty_idle_listener_count(), 1);
        assert!(h.controller.can_toggle());
        assert_eq!(h.context.get(CAN_TOGGLE_CODE_LENS), Some(Value::Bool(true)));
        assert!(h.resets().is_empty());
    }

    #[test]
    fn enabling_after_disabled_start_creates_one_provider() {
        let h = harness(code_lens(false, true, true));
        assert!(h.controller.provider().is_none());
        assert!(h.registry.is_empty());

        h.set(code_lens(true, true, false));
        assert_eq!(h.created.get(), 1);
        assert_eq!(h.registry.len(), 1);
        assert!(h.controller.can_toggle());
        h.assert_consistent();
    }

    #[test]
    fn config_change_with_live_provider_resets_without_reason() {
        let h = harness(MarginConfig::default());
        h.set(code_lens(true, false, true));
        assert_eq!(h.created.get(), 1);
        assert_eq!(h.resets(), vec![None]);
    }

    #[test]
    fn date_settings_also_reset_provider() {
        let h = harness(MarginConfig::default());
        let mut config = MarginConfig::default();
        config.default_date_format = Some("%Y".into());
        h.set(config);
        assert_eq!(h.resets(), vec![None]);
    }

    #[test]
    fn unrelated_config_change_is_ignored() {
        let h = harness(MarginConfig::default());
        let writes = h.context.writes();

        let mut config = MarginConfig::default();
        config.annotations.file.recent_changes.hover.details = false;
        h.set(config);

        assert!(h.resets().is_empty());
        assert_eq!(h.context.writes(), writes);
    }

    #[test]
    fn enable_disable_enable_never_leaves_two_providers() {
        let h = harness(MarginConfig::default());
        h.assert_consistent();

        h.set(code_lens(false, true, true));
        assert!(h.controller.provider().is_none());
        assert_eq!(h.tracker.dirty_idle_listener_count(), 0);
        assert!(h.controller.can_toggle());
        h.assert_consistent();

        h.set(code_lens(true, true, true));
        assert_eq!(h.created.get(), 2);
        assert_eq!(h.registry.len(), 1);
        h.assert_consistent();
    }

    #[test]
    fn all_lens_kinds_off_disables_toggle() {
        let h = harness(MarginConfig::default());
        h.set(code_lens(true, false, false));
        assert!(h.controller.provider().is_none());
        assert!(!h.controller.can_toggle());
        assert_eq!(h.context.get(CAN_TOGGLE_CODE_LENS), Some(Value::Bool(false)));
        h.assert_consistent();
    }

    #[test]
    fn save_resets_with_saved_reason() {
        let h = harness(MarginConfig::default());
        h.tracker.edited(&h.uri);
        h.tracker.saved(&h.uri);
        assert_eq!(h.resets(), vec![Some(ResetReason::Saved)]);
    }

    #[test]
    fn unblameable_transition_never_resets() {
        let h = harness(MarginConfig::default());
        h.tracker.set_blameable(&h.uri, false);
        assert!(h.resets().is_empty());
    }

    #[test]
    fn dirty_idle_resets_only_blameable_documents() {
        let h = harness(MarginConfig::default());

        h.tracker.set_blameable(&h.uri, false);
        h.tracker.set_dirty_idle(&h.uri, true);
        assert!(h.resets().is_empty());

        h.tracker.set_dirty_idle(&h.uri, false);
        h.tracker.idle(&h.uri);
        assert_eq!(
            h.resets(),
            vec![Some(ResetReason::Saved), Some(ResetReason::Idle)]
        );
    }

    #[test]
    fn events_without_provider_are_ignored() {
        let h = harness(code_lens(false, true, true));
        h.tracker.edited(&h.uri);
        h.tracker.saved(&h.uri);
        h.tracker.idle(&h.uri);
        assert_eq!(h.created.get(), 0);
    }

    #[test]
    fn toggle_twice_creates_then_removes_without_dirty_idle() {
        let h = harness(code_lens(false, true, true));
        let editor = TextBuffer::from_text("fn main() {}\n");

        h.controller.toggle_code_lens(&editor);
        assert!(h.controller.provider().is_some());
        assert_eq!(h.tracker.dirty_idle_listener_count(), 0);
        h.assert_consistent();

        h.tracker.set_dirty_idle(&h.uri, true);
        assert!(h.resets().is_empty());

        h.controller.toggle_code_lens(&editor);
        assert!(h.controller.provider().is_none());
        h.assert_consistent();
    }

    #[test]
    fn toggle_is_noop_when_not_permitted() {
        let h = harness(code_lens(true, false, false));
        h.controller.toggle_code_lens(&TextBuffer::from_text(""));
        assert!(h.controller.provider().is_none());
        assert_eq!(h.created.get(), 0);
    }

    #[test]
    fn dispose_releases_provider_and_config_subscription() {
        let h = harness(MarginConfig::default());
        h.controller.dispose();
        assert!(h.controller.provider().is_none());
        h.assert_consistent();

        h.set(code_lens(true, false, true));
        assert_eq!(h.created.get(), 1);
        assert!(h.controller.provider().is_none());
    }

    #[test]
    fn dropping_controller_unregisters() {
        let h = harness(MarginConfig::default());
        let Harness {
            registry,
            tracker,
            controller,
            ..
        } = h;
        drop(controller);
        assert!(registry.is_empty());
        assert_eq!(tracker.blame_state_listener_count(), 0);
    }
}
