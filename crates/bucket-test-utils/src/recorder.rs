//! [`EventRecorder`]: captures manager events as owned values.

use std::time::Duration;

use bucket_core::{BucketManager, Connector, Event, EventKind};
use serde_json::Value;
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

/// Owned copy of an [`Event`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded<B> {
    Config(Value),
    Done(Value),
    Bucket {
        cluster: String,
        name: String,
        handle: Option<B>,
    },
    /// The error's display text
    Error(String),
}

impl<B: Clone> Recorded<B> {
    fn from_event(event: &Event<'_, B>) -> Self {
        match event {
            Event::Config(value) => Self::Config((*value).clone()),
            Event::Done(value) => Self::Done((*value).clone()),
            Event::Bucket(record) => Self::Bucket {
                cluster: record.cluster().to_string(),
                name: record.name().to_string(),
                handle: record.handle().cloned(),
            },
            Event::Error(err) => Self::Error(err.to_string()),
        }
    }
}

impl<B> Recorded<B> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Config(_) => EventKind::Config,
            Self::Done(_) => EventKind::Done,
            Self::Bucket { .. } => EventKind::Bucket,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// Subscribes to every event kind of a manager and replays them in order.
pub struct EventRecorder<B> {
    rx: mpsc::UnboundedReceiver<Recorded<B>>,
}

impl<B: Clone + Send + Sync + 'static> EventRecorder<B> {
    pub fn attach<C: Connector<Bucket = B>>(manager: &BucketManager<C>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in [
            EventKind::Config,
            EventKind::Done,
            EventKind::Bucket,
            EventKind::Error,
        ] {
            let tx = tx.clone();
            manager.on(kind, move |event| {
                let _ = tx.send(Recorded::from_event(event));
            });
        }
        Self { rx }
    }

    /// The next event, or `None` if nothing arrives within five seconds.
    pub async fn next(&mut self) -> Option<Recorded<B>> {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Skip ahead to the next event of `kind`.
    pub async fn next_of(&mut self, kind: EventKind) -> Option<Recorded<B>> {
        loop {
            let event = self.next().await?;
            if event.kind() == kind {
                return Some(event);
            }
        }
    }

    /// Everything recorded so far that has not been consumed.
    pub fn drain(&mut self) -> Vec<Recorded<B>> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
