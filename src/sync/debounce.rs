//! Keyed debounce timers.
//!
//! Each key owns at most one pending write. Scheduling again restarts the
//! quiet period and replaces the pending write; when the period elapses the
//! most recently scheduled write runs exactly once. Writes read their payload
//! when they run, not when they are scheduled.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Independently debounced groups of note fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    /// Title and description.
    Text,
    Color,
}

/// Debounce key used by the sync layer: one timer per note and field group.
pub type EditKey = (String, FieldGroup);

type Fire = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct Slot {
    generation: u64,
    flush: Arc<Notify>,
    // Set under the slots lock; checked by the timer task under the same lock.
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Slot {
    fn abort(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

struct Slots<K> {
    pending: HashMap<K, Slot>,
    next_generation: u64,
}

impl<K> Drop for Slots<K> {
    fn drop(&mut self) {
        for (_, slot) in self.pending.drain() {
            slot.abort();
        }
    }
}

/// Quiet-period scheduler keyed by `K`.
///
/// Cloning shares the pending timers. Dropping the last clone cancels every
/// write that has not started yet.
pub struct Debouncer<K> {
    slots: Arc<Mutex<Slots<K>>>,
    delay: Duration,
}

impl<K> Clone for Debouncer<K> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            delay: self.delay,
        }
    }
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                pending: HashMap::new(),
                next_generation: 0,
            })),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending write for `key` with `fire` and restart its timer.
    pub fn schedule<F>(&self, key: K, fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let fire: Fire = Box::pin(fire);
        let mut slots = self.lock();

        let generation = slots.next_generation;
        slots.next_generation += 1;

        if let Some(previous) = slots.pending.remove(&key) {
            previous.abort();
            tracing::trace!(?key, "debounce timer restarted");
        }

        let flush = Arc::new(Notify::new());
        let cancelled = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_slot(
            Arc::downgrade(&self.slots),
            key.clone(),
            generation,
            self.delay,
            flush.clone(),
            cancelled.clone(),
            fire,
        ));

        slots.pending.insert(
            key,
            Slot {
                generation,
                flush,
                cancelled,
                task,
            },
        );
    }

    /// Drop the pending write for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &K) -> bool {
        match self.lock().pending.remove(key) {
            Some(slot) => {
                slot.abort();
                tracing::debug!(?key, "debounced write dropped");
                true
            }
            None => false,
        }
    }

    /// Drop every pending write whose key matches.
    pub fn cancel_matching(&self, mut pred: impl FnMut(&K) -> bool) -> usize {
        let mut slots = self.lock();
        let keys: Vec<K> = slots.pending.keys().filter(|k| pred(k)).cloned().collect();
        for key in &keys {
            if let Some(slot) = slots.pending.remove(key) {
                slot.abort();
            }
        }
        if !keys.is_empty() {
            tracing::debug!(count = keys.len(), "debounced writes dropped");
        }
        keys.len()
    }

    /// Run the pending write for `key` now and wait for it to finish.
    pub async fn flush(&self, key: &K) -> bool {
        let slot = self.lock().pending.remove(key);
        match slot {
            Some(slot) => {
                finish(slot).await;
                true
            }
            None => false,
        }
    }

    /// Run every pending write whose key matches and wait for all of them.
    pub async fn flush_matching(&self, mut pred: impl FnMut(&K) -> bool) -> usize {
        let drained: Vec<Slot> = {
            let mut slots = self.lock();
            let keys: Vec<K> = slots.pending.keys().filter(|k| pred(k)).cloned().collect();
            keys.iter()
                .filter_map(|key| slots.pending.remove(key))
                .collect()
        };

        let count = drained.len();
        for slot in drained {
            finish(slot).await;
        }
        count
    }

    pub async fn flush_all(&self) -> usize {
        self.flush_matching(|_| true).await
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.lock().pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slots<K>> {
        self.slots.lock().expect("debouncer lock poisoned")
    }
}

async fn run_slot<K>(
    slots: Weak<Mutex<Slots<K>>>,
    key: K,
    generation: u64,
    delay: Duration,
    flush: Arc<Notify>,
    cancelled: Arc<AtomicBool>,
    fire: Fire,
) where
    K: Eq + Hash + Debug,
{
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = flush.notified() => {}
    }

    // Free the slot before writing so an edit made during the write starts a
    // fresh timer. A flush has already removed it.
    {
        let Some(slots) = slots.upgrade() else {
            return;
        };
        let mut slots = slots.lock().expect("debouncer lock poisoned");
        if cancelled.load(Ordering::SeqCst) {
            return;
        }
        if slots.pending.get(&key).map(|s| s.generation) == Some(generation) {
            slots.pending.remove(&key);
        }
    }

    tracing::trace!(?key, "debounced write firing");
    fire.await;
}

async fn finish(slot: Slot) {
    slot.flush.notify_one();
    if let Err(e) = slot.task.await {
        if e.is_panic() {
            tracing::error!("debounced write panicked: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> Fire) {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let make = move |value: u32| -> Fire {
            let sink = sink.clone();
            Box::pin(async move { sink.lock().unwrap().push(value) })
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_fires_once_with_last_value() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let (fired, fire) = recorder();

        for value in 1..=3 {
            debouncer.schedule("k", fire(value));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(fired.lock().unwrap().is_empty());
        assert!(debouncer.is_pending(&"k"));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*fired.lock().unwrap(), vec![3]);
        assert!(!debouncer.is_pending(&"k"));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let (fired, fire) = recorder();

        debouncer.schedule("text", fire(1));
        tokio::time::sleep(Duration::from_millis(300)).await;
        debouncer.schedule("color", fire(2));
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(*fired.lock().unwrap(), vec![1]);
        assert!(debouncer.is_pending(&"color"));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*fired.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_write() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let (fired, fire) = recorder();

        debouncer.schedule("k", fire(1));
        assert!(debouncer.cancel(&"k"));
        assert!(!debouncer.cancel(&"k"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(fired.lock().unwrap().is_empty());
        assert_eq!(debouncer.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_immediately() {
        let debouncer = Debouncer::new(Duration::from_secs(60));
        let (fired, fire) = recorder();

        debouncer.schedule("a", fire(1));
        debouncer.schedule("b", fire(2));
        assert_eq!(debouncer.flush_matching(|k| *k == "a").await, 1);
        assert_eq!(*fired.lock().unwrap(), vec![1]);

        assert_eq!(debouncer.flush_all().await, 1);
        assert_eq!(*fired.lock().unwrap(), vec![1, 2]);
        assert!(!debouncer.flush(&"a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_last_handle_cancels_pending_writes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let counter = calls.clone();
        debouncer.schedule(1u8, async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(debouncer);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
