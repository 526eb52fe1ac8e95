//! Awaitable proxy queue with a selectable ordering discipline.

use crate::proxy::Proxy;

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Semaphore;

/// Order in which queued proxies are handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOrder {
    /// Last in, first out. Favors the most recently refreshed proxies.
    Lifo,
    /// First in, first out. Spreads use evenly across proxies.
    Fifo,
}

/// Queue of proxies awaiting dispatch.
///
/// The semaphore holds exactly one permit per queued entry, so `pop` can
/// suspend the calling task until something is pushed.
#[derive(Debug)]
pub struct ProxyQueue {
    order: QueueOrder,
    items: Mutex<VecDeque<Proxy>>,
    available: Semaphore,
}

impl ProxyQueue {
    pub fn new(order: QueueOrder) -> Self {
        Self {
            order,
            items: Mutex::new(VecDeque::new()),
            available: Semaphore::new(0),
        }
    }

    pub fn order(&self) -> QueueOrder {
        self.order
    }

    pub fn push(&self, proxy: Proxy) {
        self.items.lock().push_back(proxy);
        self.available.add_permits(1);
    }

    /// Wait until an entry is available and take it.
    ///
    /// Cancel safe: dropping the future before it resolves consumes nothing.
    pub async fn pop(&self) -> Proxy {
        loop {
            let permit = match self.available.acquire().await {
                Ok(permit) => permit,
                // never closed
                Err(_) => continue,
            };
            permit.forget();
            if let Some(proxy) = self.take() {
                return proxy;
            }
        }
    }

    /// Take an entry without waiting.
    pub fn try_pop(&self) -> Option<Proxy> {
        let permit = self.available.try_acquire().ok()?;
        permit.forget();
        self.take()
    }

    fn take(&self) -> Option<Proxy> {
        let mut items = self.items.lock();
        match self.order {
            QueueOrder::Lifo => items.pop_back(),
            QueueOrder::Fifo => items.pop_front(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the queued entries, front first.
    pub fn snapshot(&self) -> Vec<Proxy> {
        self.items.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    fn proxy(port: u16) -> Proxy {
        Proxy::new("10.0.0.1", port).unwrap()
    }

    #[test]
    fn test_lifo_order() {
        let queue = ProxyQueue::new(QueueOrder::Lifo);
        queue.push(proxy(1));
        queue.push(proxy(2));
        queue.push(proxy(3));
        assert_eq!(queue.try_pop(), Some(proxy(3)));
        assert_eq!(queue.try_pop(), Some(proxy(2)));
        assert_eq!(queue.try_pop(), Some(proxy(1)));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_fifo_order() {
        let queue = ProxyQueue::new(QueueOrder::Fifo);
        queue.push(proxy(1));
        queue.push(proxy(2));
        queue.push(proxy(3));
        assert_eq!(queue.try_pop(), Some(proxy(1)));
        assert_eq!(queue.try_pop(), Some(proxy(2)));
        assert_eq!(queue.try_pop(), Some(proxy(3)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fanout_serves_three_then_blocks() {
        let queue = ProxyQueue::new(QueueOrder::Lifo);
        for _ in 0..3 {
            queue.push(proxy(8080));
        }

        for _ in 0..3 {
            let mut pop = task::spawn(queue.pop());
            assert_eq!(assert_ready!(pop.poll()), proxy(8080));
        }

        let mut fourth = task::spawn(queue.pop());
        assert_pending!(fourth.poll());

        queue.push(proxy(8080));
        assert!(fourth.is_woken());
        assert_eq!(assert_ready!(fourth.poll()), proxy(8080));
    }

    #[test]
    fn test_cancelled_pop_consumes_nothing() {
        let queue = ProxyQueue::new(QueueOrder::Fifo);
        {
            let mut pop = task::spawn(queue.pop());
            assert_pending!(pop.poll());
        }
        queue.push(proxy(1));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_pop(), Some(proxy(1)));
    }
}
