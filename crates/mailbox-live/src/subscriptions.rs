use std::collections::HashMap;
use std::fmt;

use tracing::trace;

pub trait EventHandler: Send + Sync {
    fn handle(&self, payload: &str);
}

impl<F> EventHandler for F
where
    F: Fn(&str) + Send + Sync,
{
    fn handle(&self, payload: &str) {
        (self)(payload)
    }
}

/// Event name → handler table. Built once, shared by every channel instance.
pub struct EventSubscriptions {
    handlers: HashMap<String, Box<dyn EventHandler>>,
}

impl EventSubscriptions {
    pub fn builder() -> EventSubscriptionsBuilder {
        EventSubscriptionsBuilder::default()
    }

    /// Invokes the handler registered for `name`. Unknown names are ignored.
    pub fn dispatch(&self, name: &str, payload: &str) -> bool {
        match self.handlers.get(name) {
            Some(handler) => {
                handler.handle(payload);
                true
            }
            None => {
                trace!(target = "live::events", event = name, "no handler registered");
                false
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for EventSubscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("EventSubscriptions")
            .field("events", &names)
            .finish()
    }
}

#[derive(Default)]
pub struct EventSubscriptionsBuilder {
    handlers: HashMap<String, Box<dyn EventHandler>>,
}

impl EventSubscriptionsBuilder {
    /// Registers `handler` for `name`, replacing any earlier registration.
    pub fn on<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(name.into(), Box::new(handler));
        self
    }

    pub fn build(self) -> EventSubscriptions {
        EventSubscriptions {
            handlers: self.handlers,
        }
    }
}
