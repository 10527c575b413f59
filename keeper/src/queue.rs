//! Priority queue for tracking position health (min-heap by health).

use std::cmp::Reverse;
use std::collections::HashMap;

use cascade_common::UserId;
use priority_queue::PriorityQueue;

/// Position health snapshot.
#[derive(Debug, Clone)]
pub struct UserHealth {
    pub user: UserId,
    /// WAD-scaled, signed; negative means liquidatable.
    pub health: i128,
    pub debt: u128,
    /// Engine time of the snapshot.
    pub last_update: u64,
}

impl UserHealth {
    pub fn needs_liquidation(&self, threshold: i128) -> bool {
        self.health <= threshold
    }
}

/// Health-based priority queue (lowest health first).
#[derive(Default)]
pub struct HealthQueue {
    queue: PriorityQueue<UserId, Reverse<i128>>,
    map: HashMap<UserId, UserHealth>,
}

impl HealthQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push or update a snapshot.
    pub fn push(&mut self, user_health: UserHealth) {
        let user = user_health.user;
        let health = user_health.health;
        self.map.insert(user, user_health);
        self.queue.push(user, Reverse(health));
    }

    /// Pop the worst-health position.
    pub fn pop(&mut self) -> Option<UserHealth> {
        let (user, _priority) = self.queue.pop()?;
        self.map.remove(&user)
    }

    /// Peek at the worst-health position.
    pub fn peek(&self) -> Option<&UserHealth> {
        let (user, _priority) = self.queue.peek()?;
        self.map.get(user)
    }

    pub fn remove(&mut self, user: &UserId) {
        self.queue.remove(user);
        self.map.remove(user);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Snapshots at or below `threshold`, worst first.
    pub fn get_liquidatable(&self, threshold: i128) -> Vec<UserHealth> {
        let mut users: Vec<UserHealth> = self
            .map
            .values()
            .filter(|u| u.needs_liquidation(threshold))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.health);
        users
    }
}
