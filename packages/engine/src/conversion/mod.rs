//! # Conversion
//!
//! Model to view (downcast) and view to model (upcast) conversion.
//!
//! ```text
//! model diff ──► DowncastDispatcher ──► view tree   (editing + data)
//! view tree  ──► UpcastDispatcher   ──► model nodes (data, paste)
//! ```
//!
//! Dispatchers fire named events for every piece of input; converters are
//! listeners registered with a [`Priority`]. Listeners for `a` also receive
//! `a:b` and `a:b:c`. Every listener runs, highest priority first, and
//! consumables decide which of them actually converts a piece of input.

mod consumable;
mod downcast;
mod helpers;
mod mapper;
mod upcast;

pub use consumable::{ConsumableItem, ModelConsumable, ViewConsumable};
pub use downcast::{DowncastApi, DowncastDispatcher, DowncastEvent, DowncastHandler, DowncastItem};
pub use helpers::{
    DowncastHelpers, ElementDefinition, HighlightDescriptor, UpcastHelpers, ViewAttribute,
};
pub use mapper::Mapper;
pub use upcast::{UpcastApi, UpcastData, UpcastDispatcher, UpcastHandler, FRAGMENT_ROOT, HTML_ELEMENT};

/// Listener priority; higher runs first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    pub const HIGHEST: Priority = Priority(100_000);
    pub const HIGH: Priority = Priority(1000);
    pub const NORMAL: Priority = Priority(0);
    pub const LOW: Priority = Priority(-1000);
    pub const LOWEST: Priority = Priority(-100_000);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

#[derive(Clone)]
struct Listener<H> {
    event: String,
    priority: Priority,
    handler: H,
}

/// Listeners of one dispatcher in registration order
#[derive(Clone)]
pub(crate) struct ListenerList<H> {
    listeners: Vec<Listener<H>>,
}

impl<H> Default for ListenerList<H> {
    fn default() -> Self {
        Self { listeners: Vec::new() }
    }
}

impl<H: Clone> ListenerList<H> {
    pub(crate) fn add(&mut self, event: &str, priority: Priority, handler: H) {
        self.listeners.push(Listener {
            event: event.to_string(),
            priority,
            handler,
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Handlers for a fired event, highest priority first; equal priorities
    /// keep registration order
    pub(crate) fn matching(&self, fired: &str) -> Vec<H> {
        let mut matched: Vec<&Listener<H>> = self
            .listeners
            .iter()
            .filter(|listener| listens_to(&listener.event, fired))
            .collect();
        matched.sort_by_key(|listener| std::cmp::Reverse(listener.priority));
        matched.into_iter().map(|listener| listener.handler.clone()).collect()
    }
}

fn listens_to(listener: &str, fired: &str) -> bool {
    match fired.strip_prefix(listener) {
        Some("") => true,
        Some(rest) => rest.starts_with(':'),
        None => false,
    }
}

/// Converter registries of one editor
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    pub upcast: UpcastDispatcher,
    pub editing_downcast: DowncastDispatcher,
    pub data_downcast: DowncastDispatcher,
}

impl Conversion {
    pub fn new() -> Self {
        Self {
            upcast: UpcastDispatcher::new(),
            editing_downcast: DowncastDispatcher::new(),
            data_downcast: DowncastDispatcher::new(),
        }
    }

    pub fn for_upcast(&mut self) -> UpcastHelpers<'_> {
        UpcastHelpers::new(&mut self.upcast)
    }

    pub fn for_editing_downcast(&mut self) -> DowncastHelpers<'_> {
        DowncastHelpers::new(vec![&mut self.editing_downcast])
    }

    pub fn for_data_downcast(&mut self) -> DowncastHelpers<'_> {
        DowncastHelpers::new(vec![&mut self.data_downcast])
    }

    /// Both downcast pipelines
    pub fn for_downcast(&mut self) -> DowncastHelpers<'_> {
        DowncastHelpers::new(vec![&mut self.editing_downcast, &mut self.data_downcast])
    }
}
