//! Device registry and per-device command mailboxes
//!
//! Polls (one axum task each) and the MQTT event loop hit the registry
//! concurrently. The map itself is a [`DashMap`], so get-or-insert is atomic
//! per shard and devices never contend on a global lock. Each mailbox has its
//! own mutex held for exactly one push or pop; a command queued while a poll
//! is in flight simply shows up on the following poll.
//!
//! Registration doubles as the "discovery sent" marker: a device that is new
//! to the registry gets its discovery config published. [`DeviceRegistry::reset`]
//! forgets everything, which is how discovery gets re-announced after the
//! broker connection comes back.

use super::{Command, DeviceId};
use chrono::{DateTime, Local, TimeDelta};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// State the bridge keeps for one device between polls
#[derive(Debug)]
pub struct DeviceContext {
    id: DeviceId,
    first_seen: DateTime<Local>,
    last_poll: Mutex<DateTime<Local>>,
    mailbox: Mutex<VecDeque<Command>>,
}

impl DeviceContext {
    fn new(id: DeviceId) -> Self {
        let now = Local::now();
        Self {
            id,
            first_seen: now,
            last_poll: Mutex::new(now),
            mailbox: Mutex::new(VecDeque::new()),
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn first_seen(&self) -> DateTime<Local> {
        self.first_seen
    }

    pub fn last_poll(&self) -> DateTime<Local> {
        *lock(&self.last_poll)
    }

    pub fn touch(&self) {
        *lock(&self.last_poll) = Local::now();
    }

    pub fn since_last_poll(&self) -> TimeDelta {
        Local::now() - self.last_poll()
    }

    pub fn push(&self, command: Command) {
        lock(&self.mailbox).push_back(command);
    }

    /// Oldest pending command, or the empty command
    pub fn pop(&self) -> Command {
        lock(&self.mailbox).pop_front().unwrap_or_default()
    }

    pub fn pending(&self) -> usize {
        lock(&self.mailbox).len()
    }
}

// Guards hold a single push, pop or assign, a poisoned lock has no partial state
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: DashMap<DeviceId, Arc<DeviceContext>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the device context and whether it was created by this call
    pub fn lookup_or_create(&self, id: &DeviceId) -> (Arc<DeviceContext>, bool) {
        match self.devices.entry(id.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let context = Arc::new(DeviceContext::new(id.clone()));
                entry.insert(Arc::clone(&context));
                (context, true)
            }
        }
    }

    /// Queues a command; unknown devices are not created, the command is dropped
    pub fn enqueue(&self, id: &DeviceId, command: Command) -> bool {
        match self.devices.get(id) {
            Some(context) => {
                context.push(command);
                debug!(
                    "{} pending for {}, last poll {}s ago",
                    context.pending(),
                    id,
                    context.since_last_poll().num_seconds()
                );
                true
            }
            None => false,
        }
    }

    pub fn dequeue(&self, id: &DeviceId) -> Command {
        self.devices
            .get(id)
            .map(|context| context.pop())
            .unwrap_or_default()
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Forgets every device, starting a new connection epoch
    pub fn reset(&self) {
        for entry in self.devices.iter() {
            let context = entry.value();
            let pending = context.pending();
            if pending > 0 {
                warn!(
                    "Dropping {} pending command(s) for {} (known since {})",
                    pending,
                    context.id(),
                    context.first_seen().format("%Y-%m-%d %H:%M:%S")
                );
            } else {
                debug!(
                    "Forgetting {} (known since {})",
                    context.id(),
                    context.first_seen().format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        self.devices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn id(raw: &str) -> DeviceId {
        DeviceId::parse(raw).unwrap()
    }

    #[test]
    fn first_lookup_creates_once() {
        let registry = DeviceRegistry::new();
        let (_, created) = registry.lookup_or_create(&id("ABC"));
        assert!(created);
        let (context, created) = registry.lookup_or_create(&id("ABC"));
        assert!(!created);
        assert_eq!(context.id(), &id("ABC"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn mailbox_is_fifo() {
        let registry = DeviceRegistry::new();
        let device = id("ABC");
        registry.lookup_or_create(&device);

        assert!(registry.enqueue(&device, Command::set_point(120)));
        assert!(registry.enqueue(&device, Command::update_rate(60)));

        assert_eq!(registry.dequeue(&device), Command::set_point(120));
        assert_eq!(registry.dequeue(&device), Command::update_rate(60));
        assert!(registry.dequeue(&device).is_empty());
    }

    #[test]
    fn enqueue_for_unknown_device_is_dropped() {
        let registry = DeviceRegistry::new();
        assert!(!registry.enqueue(&id("000000"), Command::set_point(120)));
        assert!(!registry.contains(&id("000000")));
        assert!(registry.is_empty());
        assert!(registry.dequeue(&id("000000")).is_empty());
    }

    #[test]
    fn reset_makes_devices_new_again() {
        let registry = DeviceRegistry::new();
        let device = id("ABC");
        registry.lookup_or_create(&device);
        registry.reset();
        assert!(registry.is_empty());
        let (_, created) = registry.lookup_or_create(&device);
        assert!(created);
    }

    #[test]
    fn touch_tracks_last_poll() {
        let registry = DeviceRegistry::new();
        let (context, _) = registry.lookup_or_create(&id("ABC"));
        assert_eq!(context.last_poll(), context.first_seen());

        thread::sleep(std::time::Duration::from_millis(5));
        context.touch();
        assert!(context.last_poll() > context.first_seen());
        assert!(context.since_last_poll() >= TimeDelta::zero());
    }

    #[test]
    fn reset_drops_pending_commands() {
        let registry = DeviceRegistry::new();
        let device = id("ABC");
        registry.lookup_or_create(&device);
        registry.enqueue(&device, Command::set_point(120));

        registry.reset();
        registry.lookup_or_create(&device);
        assert!(registry.dequeue(&device).is_empty());
    }

    #[test]
    fn concurrent_lookups_create_exactly_once() {
        let registry = Arc::new(DeviceRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.lookup_or_create(&id("ABCDEF")).1)
            })
            .collect();

        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|created| *created)
            .count();
        assert_eq!(created, 1);
    }

    #[test]
    fn concurrent_enqueues_are_not_lost() {
        let registry = Arc::new(DeviceRegistry::new());
        let device = id("ABC");
        let (context, _) = registry.lookup_or_create(&device);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let device = device.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        registry.enqueue(&device, Command::update_rate(30 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(context.pending(), 200);
    }
}
