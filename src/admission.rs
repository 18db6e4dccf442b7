//! Rate-limited admission queue.
//!
//! A leaky-bucket FIFO: [`AdmissionQueue::enqueue`] accepts an item
//! immediately and never blocks (unbounded buffering), while the paired
//! [`AdmissionReceiver`] releases items to its single consumer at a
//! bounded rate: at most `burst_size` releases per `period`. The bucket
//! refills `burst_size` tokens each elapsed `period` and never holds more
//! than `burst_size`, so unused capacity does not accumulate. A token is
//! consumed at release time, not at enqueue time.
//!
//! # Example
//!
//! ```rust
//! use request_manager::admission::{admission_queue, AdmissionConfig};
//!
//! # async fn example() {
//! let (queue, mut receiver) = admission_queue::<u32>(AdmissionConfig::default());
//! queue.enqueue(1).ok();
//! let released = receiver.recv().await;
//! assert_eq!(released, Some(1));
//! # }
//! ```

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

/// Admission rate configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Maximum releases per window.
    pub burst_size: u32,
    /// Window length.
    pub period: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        // 10 releases per 500ms.
        Self {
            burst_size: 10,
            period: Duration::from_millis(500),
        }
    }
}

impl AdmissionConfig {
    /// Creates a config releasing at most `burst_size` items per `period`.
    #[must_use]
    pub fn new(burst_size: u32, period: Duration) -> Self {
        Self { burst_size, period }
    }
}

/// Creates a connected queue/receiver pair.
///
/// Cloned [`AdmissionQueue`] handles share the same FIFO; the stream ends
/// (`recv` returns `None`) once every handle is dropped and the buffer is
/// drained.
#[must_use]
pub fn admission_queue<T>(config: AdmissionConfig) -> (AdmissionQueue<T>, AdmissionReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        AdmissionQueue { tx },
        AdmissionReceiver {
            rx,
            bucket: Bucket::new(config),
        },
    )
}

/// Producer half: accepts items without blocking.
#[derive(Debug)]
pub struct AdmissionQueue<T> {
    tx: mpsc::UnboundedSender<T>,
}

// Manual impl: `#[derive(Clone)]` would require `T: Clone`.
impl<T> Clone for AdmissionQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> AdmissionQueue<T> {
    /// Appends an item to the tail of the queue.
    ///
    /// Never blocks and never rejects for capacity reasons. Returns the
    /// item back if the receiver has been dropped.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        self.tx.send(item).map_err(|err| err.0)
    }
}

/// Consumer half: yields items FIFO at the configured rate.
#[derive(Debug)]
pub struct AdmissionReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
    bucket: Bucket,
}

impl<T> AdmissionReceiver<T> {
    /// Waits for the next released item.
    ///
    /// Returns `None` once all producer handles are dropped and the buffer
    /// is empty.
    pub async fn recv(&mut self) -> Option<T> {
        let item = self.rx.recv().await?;
        self.bucket.acquire().await;
        Some(item)
    }
}

/// Token bucket driving the release rate.
#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
    config: AdmissionConfig,
}

impl Bucket {
    fn new(config: AdmissionConfig) -> Self {
        Self {
            tokens: config.burst_size,
            last_refill: Instant::now(),
            config,
        }
    }

    /// Adds `burst_size` tokens per fully elapsed period, capped at the
    /// bucket capacity.
    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed();
        if elapsed >= self.config.period {
            let periods = elapsed.as_secs_f64() / self.config.period.as_secs_f64();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let added = (periods * f64::from(self.config.burst_size)) as u32;
            self.tokens = (self.tokens.saturating_add(added)).min(self.config.burst_size);
            self.last_refill = Instant::now();
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Time until the next refill makes a token available.
    fn wait_time(&self) -> Duration {
        self.config
            .period
            .saturating_sub(self.last_refill.elapsed())
    }

    async fn acquire(&mut self) {
        loop {
            if self.try_consume() {
                return;
            }
            let wait = self.wait_time().max(Duration::from_millis(1));
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdmissionConfig::default();
        assert_eq!(config.burst_size, 10);
        assert_eq!(config.period, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_releases_preserve_fifo_order() {
        let (queue, mut receiver) = admission_queue(AdmissionConfig::new(10, Duration::from_millis(100)));
        for i in 0..5 {
            queue.enqueue(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(receiver.recv().await, Some(i));
        }
    }

    #[tokio::test]
    async fn test_recv_ends_when_producers_drop() {
        let (queue, mut receiver) = admission_queue(AdmissionConfig::default());
        queue.enqueue(7u32).unwrap();
        drop(queue);
        assert_eq!(receiver.recv().await, Some(7));
        assert_eq!(receiver.recv().await, None);
    }

    #[tokio::test]
    async fn test_enqueue_fails_after_receiver_drop() {
        let (queue, receiver) = admission_queue::<u32>(AdmissionConfig::default());
        drop(receiver);
        assert_eq!(queue.enqueue(1), Err(1));
    }

    #[tokio::test]
    async fn test_burst_released_without_delay() {
        let (queue, mut receiver) = admission_queue(AdmissionConfig::new(3, Duration::from_secs(1)));
        for i in 0..3 {
            queue.enqueue(i).unwrap();
        }
        let start = Instant::now();
        for _ in 0..3 {
            receiver.recv().await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_release_rate_is_bounded() {
        let (queue, mut receiver) = admission_queue(AdmissionConfig::new(2, Duration::from_millis(100)));
        for i in 0..6 {
            queue.enqueue(i).unwrap();
        }
        let start = Instant::now();
        for _ in 0..6 {
            receiver.recv().await.unwrap();
        }
        // 6 items at 2 per 100ms: the last release needs two full refills.
        assert!(start.elapsed() >= Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_no_carry_over_beyond_capacity() {
        let (queue, mut receiver) = admission_queue(AdmissionConfig::new(2, Duration::from_millis(50)));
        // Idle for several periods; capacity must still cap at burst_size.
        sleep(Duration::from_millis(200)).await;
        for i in 0..4 {
            queue.enqueue(i).unwrap();
        }
        let start = Instant::now();
        for _ in 0..4 {
            receiver.recv().await.unwrap();
        }
        // 4 items at 2 per 50ms needs at least one refill wait.
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
