//! Notification channel for provisioning events
//!
//! Four events are published while configuration is merged:
//!
//! - `config`: a raw configuration fragment arrived
//! - `done`: all mapping work for a configuration is complete
//! - `bucket`: a bucket finished opening
//! - `error`: validation, mapping or connector failure
//!
//! Listeners are registered per [`EventKind`] and receive borrowed, typed
//! payloads. Emission never holds the listener table lock while a listener
//! runs, so a listener may register further listeners or query the manager.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::registry::BucketRecord;

/// The closed set of events a listener can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// A configuration fragment was received
    Config,
    /// A configuration finished loading
    Done,
    /// A bucket was opened
    Bucket,
    /// Something failed
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Done => write!(f, "done"),
            Self::Bucket => write!(f, "bucket"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl EventKind {
    /// Parse an event kind from its name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "config" => Some(Self::Config),
            "done" => Some(Self::Done),
            "bucket" => Some(Self::Bucket),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// List all valid event names
    pub fn all_names() -> &'static [&'static str] {
        &["config", "done", "bucket", "error"]
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::UnknownEvent {
            name: s.to_string(),
        })
    }
}

/// An event and its payload
#[derive(Debug)]
pub enum Event<'a, B> {
    /// Raw fragment as produced by a provider or passed to `add`
    Config(&'a Value),
    /// The merged configuration that was provisioned
    Done(&'a Value),
    /// The bucket that just opened
    Bucket(&'a BucketRecord<B>),
    Error(&'a Error),
}

impl<B> Event<'_, B> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Config(_) => EventKind::Config,
            Self::Done(_) => EventKind::Done,
            Self::Bucket(_) => EventKind::Bucket,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// A registered listener
pub type Listener<B> = Arc<dyn Fn(&Event<'_, B>) + Send + Sync>;

/// Listener table keyed by event kind.
pub struct Notifier<B> {
    listeners: RwLock<HashMap<EventKind, Vec<Listener<B>>>>,
}

impl<B> Default for Notifier<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for Notifier<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<_, _> = listeners.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("Notifier").field("listeners", &counts).finish()
    }
}

impl<B> Notifier<B> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Register `listener` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&Event<'_, B>) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(Arc::new(listener));
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener of its kind, in registration order.
    ///
    /// An error nobody listens for is logged rather than dropped.
    pub fn emit(&self, event: &Event<'_, B>) {
        let kind = event.kind();
        let listeners: Vec<Listener<B>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        if listeners.is_empty() {
            if let Event::Error(err) = event {
                tracing::error!(error = %err, "Unhandled bucket registry error");
            }
            return;
        }

        for listener in listeners {
            listener(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_kind_display() {
        assert_eq!(EventKind::Config.to_string(), "config");
        assert_eq!(EventKind::Error.to_string(), "error");
    }

    #[test]
    fn test_event_kind_roundtrip() {
        for name in EventKind::all_names() {
            let kind = EventKind::parse(name).unwrap();
            assert_eq!(kind.to_string(), *name);
        }
    }

    #[rstest]
    #[case("config", EventKind::Config)]
    #[case("done", EventKind::Done)]
    #[case("bucket", EventKind::Bucket)]
    #[case("error", EventKind::Error)]
    fn test_event_kind_from_str(#[case] name: &str, #[case] expected: EventKind) {
        assert_eq!(name.parse::<EventKind>().unwrap(), expected);
    }

    #[rstest]
    #[case("bukcet")]
    #[case("")]
    #[case("Done")]
    #[case("bucket-opened")]
    #[case("load-complete")]
    fn test_event_kind_from_str_rejects_typos(#[case] name: &str) {
        let err = name.parse::<EventKind>().unwrap_err();
        assert!(matches!(&err, Error::UnknownEvent { name: got } if got == name));
    }

    #[test]
    fn test_event_kind_serde() {
        let json = serde_json::to_string(&EventKind::Done).unwrap();
        assert_eq!(json, "\"done\"");
        let parsed: EventKind = serde_json::from_str("\"bucket\"").unwrap();
        assert_eq!(parsed, EventKind::Bucket);
    }

    #[test]
    fn test_emit_only_reaches_matching_kind() {
        let notifier: Notifier<u32> = Notifier::new();
        let configs = Arc::new(AtomicUsize::new(0));
        let dones = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&configs);
        notifier.subscribe(EventKind::Config, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let d = Arc::clone(&dones);
        notifier.subscribe(EventKind::Done, move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        });

        let value = serde_json::json!({});
        notifier.emit(&Event::Config(&value));
        notifier.emit(&Event::Config(&value));
        notifier.emit(&Event::Done(&value));

        assert_eq!(configs.load(Ordering::SeqCst), 2);
        assert_eq!(dones.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let notifier: Notifier<u32> = Notifier::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            notifier.subscribe(EventKind::Bucket, move |_| order.lock().unwrap().push(i));
        }

        let record = BucketRecord::pending("c1", "b1");
        notifier.emit(&Event::Bucket(&record));

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(notifier.listener_count(EventKind::Bucket), 3);
    }

    #[test]
    fn test_listener_may_subscribe_during_emit() {
        let notifier: Arc<Notifier<u32>> = Arc::new(Notifier::new());
        let inner = Arc::clone(&notifier);
        notifier.subscribe(EventKind::Done, move |_| {
            inner.subscribe(EventKind::Error, |_| {});
        });

        let value = serde_json::json!({});
        notifier.emit(&Event::Done(&value));

        assert_eq!(notifier.listener_count(EventKind::Error), 1);
    }

    #[test]
    fn test_unhandled_error_does_not_panic() {
        let notifier: Notifier<u32> = Notifier::new();
        let err = Error::UnknownRepository {
            repository: "r".to_string(),
        };
        notifier.emit(&Event::Error(&err));
    }
}
