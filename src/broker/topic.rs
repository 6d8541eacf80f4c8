//! Topic management
//!
//! A `Topic` holds the ids of the connections interested in one vehicle.
//! `TopicTable` maps topic keys to topics and never keeps an empty topic:
//! whichever operation removes the last member also removes the entry.
//!
//! Concurrency note: callers must synchronize access (the dispatcher keeps
//! the table inside its single broker lock).

use std::collections::{HashMap, HashSet};

use crate::client::ConnectionId;

/// Topic key for a vehicle's external id.
pub fn topic_key(vehicle_id: &str) -> String {
    format!("vehicle_{vehicle_id}")
}

#[derive(Debug, Default)]
pub struct Topic {
    pub key: String,
    pub members: HashSet<ConnectionId>,
}

impl Topic {
    /// Create a new, empty topic with the given key.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            members: HashSet::new(),
        }
    }

    /// Add a member to the topic. Duplicate adds are ignored.
    pub fn subscribe(&mut self, id: ConnectionId) {
        self.members.insert(id);
    }

    /// Remove a member. Returns whether it was present.
    pub fn unsubscribe(&mut self, id: &ConnectionId) -> bool {
        self.members.remove(id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }
}

#[derive(Debug, Default)]
pub struct TopicTable {
    topics: HashMap<String, Topic>,
}

impl TopicTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to the topic, creating the topic on first use.
    pub fn subscribe(&mut self, id: &ConnectionId, key: &str) {
        self.topics
            .entry(key.to_string())
            .or_insert_with(|| Topic::new(key))
            .subscribe(id.clone());
    }

    /// Remove `id` from the topic, dropping the topic once it is empty.
    /// Returns whether `id` was a member.
    pub fn unsubscribe(&mut self, id: &ConnectionId, key: &str) -> bool {
        let Some(topic) = self.topics.get_mut(key) else {
            return false;
        };
        let removed = topic.unsubscribe(id);
        if topic.is_empty() {
            self.topics.remove(key);
        }
        removed
    }

    /// Purge `id` from every topic, dropping topics left empty.
    /// Returns the keys it was removed from.
    pub fn remove_everywhere(&mut self, id: &ConnectionId) -> Vec<String> {
        let mut left = Vec::new();
        self.topics.retain(|key, topic| {
            if topic.unsubscribe(id) {
                left.push(key.clone());
            }
            !topic.is_empty()
        });
        left
    }

    pub fn get(&self, key: &str) -> Option<&Topic> {
        self.topics.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.topics.contains_key(key)
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.topics.get(key).map_or(0, Topic::len)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// `(key, member count)` for every topic, sorted by key.
    pub fn list_topics(&self) -> Vec<(String, usize)> {
        let mut listing: Vec<_> = self
            .topics
            .values()
            .map(|t| (t.key.clone(), t.len()))
            .collect();
        listing.sort();
        listing
    }

    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.values()
    }
}
