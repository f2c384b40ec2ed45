//! Handler registration and dispatch for events and server notifications.
//!
//! Dispatch never runs handlers under the registry lock: the dispatcher
//! clones a snapshot of the relevant handler list, then launches one
//! supervised task per handler invocation. A panicking handler is converted
//! into a `Handler` error delivered to the error handlers; it never unwinds
//! into the reader loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use mcp_types::JSONRPCNotification;
use mcp_types::McpError;
use serde_json::Value;

pub type HandlerId = u64;

/// A client-level event such as `connected`, `initialized`, `disconnected`,
/// or `request` (a server-initiated request surfaced for observation).
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: String,
    pub data: Value,
}

type EventCallback = Arc<dyn Fn(Event) + Send + Sync>;
type NotificationCallback = Arc<dyn Fn(JSONRPCNotification) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(Arc<McpError>) + Send + Sync>;

#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: HandlerId,
    events: HashMap<String, Vec<(HandlerId, EventCallback)>>,
    notifications: HashMap<String, Vec<(HandlerId, NotificationCallback)>>,
    errors: Vec<(HandlerId, ErrorCallback)>,
}

impl HandlerRegistry {
    fn next_id(&mut self) -> HandlerId {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn add_event(&mut self, kind: &str, callback: EventCallback) -> HandlerId {
        let id = self.next_id();
        self.events
            .entry(kind.to_string())
            .or_default()
            .push((id, callback));
        id
    }

    pub(crate) fn add_notification(
        &mut self,
        method: &str,
        callback: NotificationCallback,
    ) -> HandlerId {
        let id = self.next_id();
        self.notifications
            .entry(method.to_string())
            .or_default()
            .push((id, callback));
        id
    }

    pub(crate) fn add_error(&mut self, callback: ErrorCallback) -> HandlerId {
        let id = self.next_id();
        self.errors.push((id, callback));
        id
    }

    pub(crate) fn remove_event(&mut self, kind: &str, id: HandlerId) -> bool {
        match self.events.get_mut(kind) {
            Some(handlers) => {
                let before = handlers.len();
                handlers.retain(|(handler_id, _)| *handler_id != id);
                handlers.len() != before
            }
            None => false,
        }
    }

    pub(crate) fn remove_notification(&mut self, method: &str, id: HandlerId) -> bool {
        match self.notifications.get_mut(method) {
            Some(handlers) => {
                let before = handlers.len();
                handlers.retain(|(handler_id, _)| *handler_id != id);
                handlers.len() != before
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.notifications.clear();
        self.errors.clear();
    }

    pub(crate) fn event_counts(&self) -> HashMap<String, usize> {
        self.events
            .iter()
            .filter(|(_, handlers)| !handlers.is_empty())
            .map(|(kind, handlers)| (kind.clone(), handlers.len()))
            .collect()
    }
}

pub(crate) type SharedHandlers = Arc<RwLock<HandlerRegistry>>;

pub(crate) fn read(
    handlers: &SharedHandlers,
) -> std::sync::RwLockReadGuard<'_, HandlerRegistry> {
    handlers
        .read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub(crate) fn write(
    handlers: &SharedHandlers,
) -> std::sync::RwLockWriteGuard<'_, HandlerRegistry> {
    handlers
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn error_snapshot(handlers: &SharedHandlers) -> Vec<ErrorCallback> {
    read(handlers)
        .errors
        .iter()
        .map(|(_, callback)| Arc::clone(callback))
        .collect()
}

/// Run one handler on its own task; a panic is routed to the error
/// handlers instead of propagating.
fn supervise<T: Clone + Send + 'static>(
    handlers: &SharedHandlers,
    callback: Arc<dyn Fn(T) + Send + Sync>,
    payload: T,
    context: &'static str,
) {
    let errors = error_snapshot(handlers);
    let worker = tokio::spawn(async move { callback(payload) });
    tokio::spawn(async move {
        if let Err(err) = worker.await
            && err.is_panic()
        {
            let error = Arc::new(McpError::Handler(format!("{context} handler panicked")));
            for callback in errors {
                let error = Arc::clone(&error);
                tokio::spawn(async move { callback(error) });
            }
        }
    });
}

pub(crate) fn dispatch_event(handlers: &SharedHandlers, event: Event) {
    let snapshot: Vec<EventCallback> = read(handlers)
        .events
        .get(&event.kind)
        .map(|list| list.iter().map(|(_, callback)| Arc::clone(callback)).collect())
        .unwrap_or_default();

    for callback in snapshot {
        supervise(handlers, callback, event.clone(), "event");
    }
}

pub(crate) fn dispatch_notification(handlers: &SharedHandlers, notification: JSONRPCNotification) {
    let snapshot: Vec<NotificationCallback> = read(handlers)
        .notifications
        .get(&notification.method)
        .map(|list| list.iter().map(|(_, callback)| Arc::clone(callback)).collect())
        .unwrap_or_default();

    for callback in snapshot {
        supervise(handlers, callback, notification.clone(), "notification");
    }
}

pub(crate) fn dispatch_error(handlers: &SharedHandlers, error: McpError) {
    let error = Arc::new(error);
    for callback in error_snapshot(handlers) {
        let error = Arc::clone(&error);
        tokio::spawn(async move { callback(error) });
    }
}
