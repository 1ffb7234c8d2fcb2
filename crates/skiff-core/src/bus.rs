use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::task::TaskQueue;

/// Opaque subscription identifier. Never reused within a bus.
pub type Token = u64;

/// Subscriber callback.
pub type Callback = Rc<dyn Fn(&Value)>;

struct Subscription {
    token: Token,
    callback: Callback,
}

#[derive(Default)]
struct Topics {
    lists: HashMap<String, Vec<Subscription>>,
}

impl Topics {
    fn callback_at(&self, topic: &str, index: usize) -> Option<Callback> {
        self.lists
            .get(topic)
            .and_then(|subs| subs.get(index))
            .map(|sub| sub.callback.clone())
    }

    fn count(&self, topic: &str) -> usize {
        self.lists.get(topic).map_or(0, Vec::len)
    }
}

/// Topic-based publish/subscribe.
///
/// Delivery is deferred onto a [`TaskQueue`], so `publish` always returns
/// before any subscriber runs. Subscribers are called newest first.
#[derive(Clone)]
pub struct TopicBus {
    topics: Rc<RefCell<Topics>>,
    next_token: Rc<Cell<Token>>,
    tasks: TaskQueue,
}

impl TopicBus {
    pub fn new(tasks: TaskQueue) -> Self {
        Self {
            topics: Rc::new(RefCell::new(Topics::default())),
            next_token: Rc::new(Cell::new(0)),
            tasks,
        }
    }

    /// Append a subscriber to `topic`, creating the topic if needed.
    pub fn subscribe(&self, topic: &str, callback: impl Fn(&Value) + 'static) -> Token {
        let token = self.next_token.get() + 1;
        self.next_token.set(token);
        self.topics
            .borrow_mut()
            .lists
            .entry(topic.to_string())
            .or_default()
            .push(Subscription {
                token,
                callback: Rc::new(callback),
            });
        tracing::debug!(topic, token, "subscribed");
        token
    }

    /// Remove the subscription holding `token`, wherever it lives.
    pub fn unsubscribe(&self, token: Token) -> Option<Token> {
        let mut topics = self.topics.borrow_mut();
        let mut emptied = None;
        let mut found = false;
        for (name, subs) in topics.lists.iter_mut() {
            if let Some(pos) = subs.iter().position(|sub| sub.token == token) {
                subs.remove(pos);
                found = true;
                if subs.is_empty() {
                    emptied = Some(name.clone());
                }
                break;
            }
        }
        if let Some(name) = emptied {
            topics.lists.remove(&name);
        }
        found.then_some(token)
    }

    /// Schedule delivery of `payload` to every subscriber of `topic`.
    ///
    /// Returns `false` without side effects when the topic has no
    /// subscribers. Delivery reads the live list when the task runs: anything
    /// subscribed or removed in between is included or skipped accordingly.
    pub fn publish(&self, topic: &str, payload: Value) -> bool {
        if !self.has_subscribers(topic) {
            tracing::debug!(topic, "publish to topic without subscribers");
            return false;
        }
        let topics = self.topics.clone();
        let topic = topic.to_string();
        self.tasks.schedule(move || deliver(&topics, &topic, &payload));
        true
    }

    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.subscriber_count(topic) > 0
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.borrow().count(topic)
    }

    /// Names of topics that currently have subscribers, sorted.
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.borrow().lists.keys().cloned().collect();
        names.sort();
        names
    }
}

fn deliver(topics: &Rc<RefCell<Topics>>, topic: &str, payload: &Value) {
    let mut remaining = topics.borrow().count(topic);
    tracing::debug!(topic, subscribers = remaining, "delivering");
    while remaining > 0 {
        remaining -= 1;
        // Re-borrow per step: callbacks may subscribe or unsubscribe.
        let callback = topics.borrow().callback_at(topic, remaining);
        if let Some(callback) = callback {
            callback(payload);
        }
    }
}
