//! Store construction and the two calling conventions for wiring a
//! producer render function to a [`ProducerBinding`].
//!
//! - Direct (legacy): `factory.with_state(initial, render)` gives a thunk;
//!   every `call()` mounts a binding and renders with the store.
//! - Curried: `factory.decorator(initial).wrap(render)` gives a
//!   [`Decorated`]; `call(Some(context))` renders with the context enriched
//!   by the store, `call(None)` with the store alone.
//!
//! Store identity is explicit. [`StoreScope::Fresh`] builds a new store per
//! mount. [`StoreScope::Shared`] looks the store up in the factory's
//! [`StoreRegistry`] by a caller-chosen [`ScopeKey`], so state survives
//! re-mounts of the same producer.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use crate::channel::SyncChannel;
use crate::lock;
use crate::producer::ProducerBinding;
use crate::protocol::ChannelTopics;
use crate::store::ObservableStore;
use crate::value::StateMap;

/// Opaque caller-supplied identity for a shared store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScopeKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a mount gets its store from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreScope {
    /// A new store for every mount.
    #[default]
    Fresh,
    /// One store per key, reused across mounts.
    Shared(ScopeKey),
}

/// Shared stores keyed by [`ScopeKey`].
#[derive(Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<ScopeKey, Arc<ObservableStore>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store for `key`, created from `initial` on first use. Later calls
    /// ignore `initial`.
    pub fn get_or_create(&self, key: &ScopeKey, initial: &StateMap) -> Arc<ObservableStore> {
        lock(&self.stores)
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(%key, "creating shared store");
                Arc::new(ObservableStore::new(initial.clone()))
            })
            .clone()
    }

    pub fn get(&self, key: &ScopeKey) -> Option<Arc<ObservableStore>> {
        lock(&self.stores).get(key).cloned()
    }

    /// Forget a shared store. Mounted bindings keep their reference.
    pub fn remove(&self, key: &ScopeKey) -> Option<Arc<ObservableStore>> {
        lock(&self.stores).remove(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.stores).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What a render function hands back: an element, or a supplier of one.
pub enum RenderResult<E> {
    Element(E),
    Deferred(Box<dyn FnOnce() -> E>),
}

impl<E> RenderResult<E> {
    pub fn deferred<F>(supplier: F) -> Self
    where
        F: FnOnce() -> E + 'static,
    {
        RenderResult::Deferred(Box::new(supplier))
    }

    pub fn resolve(self) -> E {
        match self {
            RenderResult::Element(element) => element,
            RenderResult::Deferred(supplier) => supplier(),
        }
    }
}

impl<E> From<E> for RenderResult<E> {
    fn from(element: E) -> Self {
        RenderResult::Element(element)
    }
}

/// External context passed to a curried render, e.g. story metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryContext {
    pub fields: StateMap,
}

impl StoryContext {
    pub fn new(fields: StateMap) -> Self {
        Self { fields }
    }

    /// `fields.parameters[key]`, if present.
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.fields.get("parameters")?.get(key)
    }
}

/// A [`StoryContext`] enriched with the store.
#[derive(Clone)]
pub struct BoundContext {
    pub context: StoryContext,
    pub store: Arc<ObservableStore>,
}

/// Argument handed to a render function.
#[derive(Clone)]
pub enum RenderArgs {
    Store(Arc<ObservableStore>),
    Context(BoundContext),
}

impl RenderArgs {
    pub fn store(&self) -> &Arc<ObservableStore> {
        match self {
            RenderArgs::Store(store) => store,
            RenderArgs::Context(bound) => &bound.store,
        }
    }

    pub fn context(&self) -> Option<&StoryContext> {
        match self {
            RenderArgs::Store(_) => None,
            RenderArgs::Context(bound) => Some(&bound.context),
        }
    }
}

type RenderFn<E> = Arc<dyn Fn(RenderArgs) -> RenderResult<E> + Send + Sync>;

/// A mounted producer: the binding plus what is needed to render it.
///
/// Dropping the view unmounts the binding.
pub struct StateView<E> {
    binding: ProducerBinding,
    context: Option<StoryContext>,
    render: RenderFn<E>,
}

impl<E> StateView<E> {
    /// Run the render function against the current store.
    pub fn render(&self) -> E {
        let store = self.binding.store().clone();
        let args = match &self.context {
            Some(context) => RenderArgs::Context(BoundContext {
                context: context.clone(),
                store,
            }),
            None => RenderArgs::Store(store),
        };
        (self.render)(args).resolve()
    }

    pub fn store(&self) -> &Arc<ObservableStore> {
        self.binding.store()
    }

    pub fn is_mounted(&self) -> bool {
        self.binding.is_mounted()
    }

    pub fn unmount(&mut self) {
        self.binding.unmount();
    }
}

/// Builds stores and mounts producer bindings on one channel namespace.
#[derive(Clone)]
pub struct Factory {
    channel: Arc<dyn SyncChannel>,
    topics: ChannelTopics,
    registry: Arc<StoreRegistry>,
}

impl Factory {
    pub fn new(channel: Arc<dyn SyncChannel>, topics: ChannelTopics) -> Self {
        Self {
            channel,
            topics,
            registry: Arc::new(StoreRegistry::new()),
        }
    }

    pub fn topics(&self) -> &ChannelTopics {
        &self.topics
    }

    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    /// Direct convention: the render function always receives the store.
    pub fn with_state<E, F>(&self, initial: StateMap, render: F) -> StoryThunk<E>
    where
        F: Fn(RenderArgs) -> RenderResult<E> + Send + Sync + 'static,
    {
        StoryThunk {
            factory: self.clone(),
            initial,
            scope: StoreScope::Fresh,
            render: Arc::new(render),
        }
    }

    /// Curried convention: bind the initial state now, the render function
    /// and context later.
    pub fn decorator(&self, initial: StateMap) -> Decorator {
        Decorator {
            factory: self.clone(),
            initial,
            scope: StoreScope::Fresh,
        }
    }

    /// Decorator whose initial state can be overridden per story through
    /// `context.parameters.initialState`.
    pub fn story_decorator(&self, default_initial: StateMap) -> StoryDecorator {
        StoryDecorator {
            factory: self.clone(),
            default_initial,
            scope: StoreScope::Fresh,
        }
    }

    fn store_for(&self, scope: &StoreScope, initial: &StateMap) -> Arc<ObservableStore> {
        match scope {
            StoreScope::Fresh => Arc::new(ObservableStore::new(initial.clone())),
            StoreScope::Shared(key) => self.registry.get_or_create(key, initial),
        }
    }

    fn mount<E>(
        &self,
        scope: &StoreScope,
        initial: &StateMap,
        render: RenderFn<E>,
        context: Option<StoryContext>,
    ) -> StateView<E> {
        let store = self.store_for(scope, initial);
        StateView {
            binding: ProducerBinding::mount(store, self.channel.clone(), self.topics.clone()),
            context,
            render,
        }
    }
}

/// Zero-argument producer from [`Factory::with_state`].
pub struct StoryThunk<E> {
    factory: Factory,
    initial: StateMap,
    scope: StoreScope,
    render: RenderFn<E>,
}

impl<E> StoryThunk<E> {
    pub fn in_scope(mut self, scope: StoreScope) -> Self {
        self.scope = scope;
        self
    }

    /// Mount a new binding.
    pub fn call(&self) -> StateView<E> {
        self.factory
            .mount(&self.scope, &self.initial, self.render.clone(), None)
    }
}

/// First stage of the curried convention.
pub struct Decorator {
    factory: Factory,
    initial: StateMap,
    scope: StoreScope,
}

impl Decorator {
    pub fn in_scope(mut self, scope: StoreScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn wrap<E, F>(self, render: F) -> Decorated<E>
    where
        F: Fn(RenderArgs) -> RenderResult<E> + Send + Sync + 'static,
    {
        Decorated {
            factory: self.factory,
            initial: self.initial,
            scope: self.scope,
            render: Arc::new(render),
        }
    }
}

/// Second stage of the curried convention.
pub struct Decorated<E> {
    factory: Factory,
    initial: StateMap,
    scope: StoreScope,
    render: RenderFn<E>,
}

impl<E> Decorated<E> {
    /// Mount a new binding. With a context the render receives
    /// [`RenderArgs::Context`], otherwise [`RenderArgs::Store`].
    pub fn call(&self, context: Option<StoryContext>) -> StateView<E> {
        self.factory
            .mount(&self.scope, &self.initial, self.render.clone(), context)
    }
}

/// Per-story decorator from [`Factory::story_decorator`].
pub struct StoryDecorator {
    factory: Factory,
    default_initial: StateMap,
    scope: StoreScope,
}

impl StoryDecorator {
    pub fn in_scope(mut self, scope: StoreScope) -> Self {
        self.scope = scope;
        self
    }

    /// The initial state a story would start from.
    pub fn initial_for(&self, context: &StoryContext) -> StateMap {
        match context.parameter("initialState") {
            Some(Value::Object(map)) => map.clone(),
            _ => self.default_initial.clone(),
        }
    }

    /// Mount `story` with the store bound into `context`.
    pub fn apply<E, F>(&self, story: F, context: StoryContext) -> StateView<E>
    where
        F: Fn(RenderArgs) -> RenderResult<E> + Send + Sync + 'static,
    {
        let initial = self.initial_for(&context);
        self.factory
            .mount(&self.scope, &initial, Arc::new(story), Some(context))
    }
}
