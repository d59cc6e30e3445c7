//! Replay-one change notification.
//!
//! A [`Channel`] remembers the latest value it carried. A new subscriber is
//! called with that value immediately, then with every value emitted
//! afterwards, in emission order. Delivery is synchronous and in-process:
//! `emit` returns once every subscriber has run.

use std::fmt;

/// Identifies a subscription so that it can be cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Subscriber<T> = Box<dyn FnMut(&T) + Send>;

/// A synchronous multicast channel with replay-one semantics.
pub struct Channel<T> {
    latest: T,
    subscribers: Vec<(SubscriptionId, Subscriber<T>)>,
    next_id: u64,
}

impl <T> Channel<T> {

    /// Create a channel whose replayed value starts as `initial`.
    pub fn new(initial: T) -> Channel<T> {
        Channel { latest: initial, subscribers: Vec::new(), next_id: 0 }
    }

    /// The value a new subscriber would receive first.
    pub fn latest(&self) -> &T {
        &self.latest
    }

    /// Subscribe to the channel.
    ///
    /// `subscriber` is called with the latest value before this method
    /// returns, and then with each subsequently emitted value.
    ///
    /// ##### Example
    ///
    /// ```
    /// use std::sync::{Arc, Mutex};
    /// use lwwconfig::Channel;
    ///
    /// let mut channel = Channel::new("initial".to_string());
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    ///
    /// let sink = seen.clone();
    /// channel.subscribe(move |value: &String| sink.lock().unwrap().push(value.clone()));
    /// channel.emit("second".to_string());
    /// channel.emit("third".to_string());
    ///
    /// assert_eq!(vec!["initial", "second", "third"], *seen.lock().unwrap());
    /// ```
    pub fn subscribe<F>(&mut self, mut subscriber: F) -> SubscriptionId
    where F: FnMut(&T) + Send + 'static {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        subscriber(&self.latest);
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Cancel a subscription. Returns false if it was not active.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(subscription, _)| *subscription != id);
        self.subscribers.len() != before
    }

    /// Returns the number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `value` to every subscriber, in subscription order, and keep it
    /// for replay.
    pub fn emit(&mut self, value: T) {
        self.latest = value;
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&self.latest);
        }
    }
}

impl <T> fmt::Debug for Channel<T> where T: fmt::Debug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
         .field("latest", &self.latest)
         .field("subscribers", &self.subscribers.len())
         .finish()
    }
}
