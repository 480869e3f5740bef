use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::debug;

use crate::event::{Notification, NotificationKind};

/// Filter for subscribing to a subset of notifications.
#[derive(Clone, Debug, Default)]
pub struct NotificationFilter {
    /// If set, only notifications of these kinds are delivered.
    pub kinds: Option<Vec<NotificationKind>>,
}

impl NotificationFilter {
    /// Deliver only notifications of these kinds.
    pub fn kinds(kinds: impl Into<Vec<NotificationKind>>) -> Self {
        Self {
            kinds: Some(kinds.into()),
        }
    }

    /// Returns `true` if the given notification matches this filter.
    pub fn matches(&self, notification: &Notification) -> bool {
        match self.kinds {
            Some(ref kinds) => kinds.contains(&notification.kind()),
            None => true,
        }
    }
}

/// A broadcast channel receiver for notifications.
pub type NotificationStream = broadcast::Receiver<Notification>;

struct Subscriber {
    filter: NotificationFilter,
    sender: broadcast::Sender<Notification>,
}

/// Fan-out hub that delivers notifications to matching subscribers.
///
/// Publishing never blocks: a subscriber that falls more than the channel
/// capacity behind sees `RecvError::Lagged` on its next receive.
pub struct NotificationHub {
    subscribers: RwLock<Vec<Subscriber>>,
    channel_capacity: usize,
}

impl NotificationHub {
    /// Hub whose subscribers each buffer up to `channel_capacity` notifications.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Register a new subscriber with the given filter.
    pub fn subscribe(&self, filter: NotificationFilter) -> NotificationStream {
        let (tx, rx) = broadcast::channel(self.channel_capacity);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { filter, sender: tx });
        rx
    }

    /// Route a notification to all matching subscribers and return how many
    /// received it. Subscribers whose receivers were dropped are pruned.
    pub fn publish(&self, notification: Notification) -> usize {
        let mut delivered = 0;
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subs.retain(|sub| {
            if sub.filter.matches(&notification) {
                let ok = sub.sender.send(notification).is_ok();
                if ok {
                    delivered += 1;
                }
                ok
            } else {
                sub.sender.receiver_count() > 0
            }
        });
        debug!(kind = %notification.kind(), delivered, "notification published");
        delivered
    }

    /// Current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(256)
    }
}
