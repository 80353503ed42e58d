use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct Inner<T> {
    items: VecDeque<T>,
    shutdown: bool,
}

/// Unbounded, thread-safe FIFO of owned items with batch dequeue.
///
/// Consumers always take the whole current contents in one call, which keeps
/// lock traffic low and preserves enqueue order within the batch.
pub struct SyncQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> SyncQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `item` at the tail and wake one waiter.
    pub fn enqueue(&self, item: T) {
        self.lock().items.push_back(item);
        self.available.notify_one();
    }

    /// Remove and return everything currently queued.
    ///
    /// With `wait == false` this never blocks and may return an empty batch.
    /// With `wait == true` it blocks until at least one item is present or the
    /// queue is shut down.
    pub fn dequeue_all(&self, wait: bool) -> VecDeque<T> {
        let mut inner = self.lock();
        if wait {
            inner = self
                .available
                .wait_while(inner, |i| i.items.is_empty() && !i.shutdown)
                .unwrap_or_else(PoisonError::into_inner);
        }
        std::mem::take(&mut inner.items)
    }

    /// Like `dequeue_all(true)` but gives up after `timeout`.
    pub fn dequeue_all_timeout(&self, timeout: Duration) -> VecDeque<T> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        while inner.items.is_empty() && !inner.shutdown {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            inner = self
                .available
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        std::mem::take(&mut inner.items)
    }

    /// Wake every waiter; later blocking dequeues return immediately.
    ///
    /// Items already queued stay available and `enqueue` keeps working.
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.available.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

impl<T> Default for SyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SyncQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SyncQueue")
            .field("len", &inner.items.len())
            .field("shutdown", &inner.shutdown)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn non_blocking_dequeue_on_empty_returns_nothing() {
        let queue: SyncQueue<u32> = SyncQueue::new();
        assert!(queue.dequeue_all(false).is_empty());
    }

    #[test]
    fn dequeue_returns_whole_batch_in_order() {
        let queue = SyncQueue::new();
        for i in 0..5 {
            queue.enqueue(i);
        }
        assert_eq!(queue.len(), 5);

        let batch: Vec<_> = queue.dequeue_all(false).into_iter().collect();
        assert_eq!(batch, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn blocking_dequeue_waits_for_producer() {
        let queue = Arc::new(SyncQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.enqueue("late");
            })
        };

        let batch = queue.dequeue_all(true);
        assert_eq!(batch.into_iter().collect::<Vec<_>>(), vec!["late"]);
        producer.join().unwrap();
    }

    #[test]
    fn timed_dequeue_gives_up() {
        let queue: SyncQueue<u8> = SyncQueue::new();
        let started = Instant::now();
        assert!(queue.dequeue_all_timeout(Duration::from_millis(30)).is_empty());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn shutdown_wakes_blocked_consumer() {
        let queue: Arc<SyncQueue<u8>> = Arc::new(SyncQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue_all(true))
        };

        thread::sleep(Duration::from_millis(20));
        queue.shutdown();
        assert!(consumer.join().unwrap().is_empty());
        assert!(queue.is_shutdown());

        queue.enqueue(7);
        assert_eq!(queue.dequeue_all(true).len(), 1);
        assert!(queue
            .dequeue_all_timeout(Duration::from_secs(5))
            .is_empty());
    }

    #[test]
    fn concurrent_producers_keep_per_thread_order() {
        let queue = Arc::new(SyncQueue::new());
        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..250u32 {
                        queue.enqueue((p, i));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let batch = queue.dequeue_all(false);
        assert_eq!(batch.len(), 1000);
        for p in 0..4u32 {
            let seen: Vec<u32> = batch
                .iter()
                .filter(|(producer, _)| *producer == p)
                .map(|(_, i)| *i)
                .collect();
            assert_eq!(seen, (0..250).collect::<Vec<_>>());
        }
    }
}
