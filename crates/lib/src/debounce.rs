//! Per-sender message debouncing: rapid bursts are coalesced into one turn.
//!
//! Each sender gets at most one open buffer with one pending timer. Every
//! admitted message restarts the timer (sliding window); on expiry the buffer
//! is removed atomically and delivered exactly once to the registered
//! consumer. Greeting-like messages bypass buffering entirely and are
//! dispatched by the caller; an open buffer for the same sender keeps running
//! on its own timer.
//!
//! If the consumer fails the turn is logged and lost: the buffer is already
//! gone and there is no redelivery. Availability over completeness.

use crate::channels::InboundMessage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Messages containing any of these are dispatched immediately, unbuffered.
const GREETINGS: &[&str] = &["hola", "buenas", "hey", "buenos dias", "buenas tardes"];

/// True when the message should skip the buffer (greeting-like content).
pub fn is_greeting(body: &str) -> bool {
    let lower = body.to_lowercase();
    GREETINGS.iter().any(|g| lower.contains(g))
}

/// Receives one flushed turn: the sender, the buffered messages in arrival
/// order, and their bodies joined with single spaces.
#[async_trait]
pub trait TurnConsumer: Send + Sync {
    async fn on_turn(
        &self,
        sender_id: &str,
        messages: Vec<InboundMessage>,
        combined_text: String,
    ) -> Result<(), String>;
}

struct SenderBuffer {
    messages: Vec<InboundMessage>,
    /// At most one pending timer; never Some while `messages` is empty.
    timer: Option<JoinHandle<()>>,
    opened_at: Instant,
}

struct Inner {
    buffers: Mutex<HashMap<String, SenderBuffer>>,
    delay: Duration,
    consumer: std::sync::RwLock<Option<Arc<dyn TurnConsumer>>>,
}

/// Sliding-window debouncer over per-sender buffers.
#[derive(Clone)]
pub struct MessageDebouncer {
    inner: Arc<Inner>,
}

/// Snapshot of one open buffer, for `stats`.
#[derive(Debug, Clone)]
pub struct BufferStat {
    pub sender_id: String,
    pub message_count: usize,
    pub age_ms: u128,
}

/// Snapshot of the debouncer, for admin introspection. No business effect.
#[derive(Debug, Clone, Default)]
pub struct DebouncerStats {
    pub active_buffers: usize,
    pub total_messages: usize,
    pub buffers: Vec<BufferStat>,
}

impl MessageDebouncer {
    /// `delay` is the quiet period after the most recent admitted message.
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                buffers: Mutex::new(HashMap::new()),
                delay,
                consumer: std::sync::RwLock::new(None),
            }),
        }
    }

    /// Register the consumer flushed turns are delivered to. Turns flushed
    /// while no consumer is registered are dropped with an error log.
    pub fn set_consumer(&self, consumer: Arc<dyn TurnConsumer>) {
        *self.inner.consumer.write().expect("consumer lock poisoned") = Some(consumer);
    }

    /// Admit one message. Returns false when the message matches the
    /// immediate-dispatch classifier: it was not buffered and the caller
    /// dispatches it directly. Otherwise the message joins the sender's
    /// buffer (created if absent) and the quiet-period timer restarts.
    pub async fn admit(&self, message: InboundMessage) -> bool {
        if is_greeting(&message.body) {
            log::debug!(
                "debounce: greeting from {}, dispatching unbuffered: {:.40}",
                message.sender_id,
                message.body
            );
            return false;
        }

        let sender_id = message.sender_id.clone();
        let mut buffers = self.inner.buffers.lock().await;
        let buffer = buffers.entry(sender_id.clone()).or_insert_with(|| SenderBuffer {
            messages: Vec::new(),
            timer: None,
            opened_at: Instant::now(),
        });
        buffer.messages.push(message);
        log::debug!(
            "debounce: buffered message from {}, buffer size {}",
            sender_id,
            buffer.messages.len()
        );

        if let Some(old) = buffer.timer.take() {
            old.abort();
        }
        let inner = self.inner.clone();
        let timer_sender = sender_id.clone();
        buffer.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            Inner::flush(inner.clone(), timer_sender).await;
        }));
        true
    }

    /// Flush a sender's buffer now, cancelling only the remaining wait. Same
    /// delivery contract as a timer expiry. No-op when no buffer is open.
    pub async fn force_flush(&self, sender_id: &str) {
        {
            let mut buffers = self.inner.buffers.lock().await;
            match buffers.get_mut(sender_id) {
                Some(buffer) => {
                    if let Some(timer) = buffer.timer.take() {
                        timer.abort();
                    }
                }
                None => return,
            }
        }
        Inner::flush(self.inner.clone(), sender_id.to_string()).await;
    }

    /// Drop all buffers and cancel their timers. Returns how many were open.
    pub async fn clear_all(&self) -> usize {
        let mut buffers = self.inner.buffers.lock().await;
        for buffer in buffers.values_mut() {
            if let Some(timer) = buffer.timer.take() {
                timer.abort();
            }
        }
        let count = buffers.len();
        buffers.clear();
        log::info!("debounce: cleared {} buffers", count);
        count
    }

    /// Snapshot of open buffers.
    pub async fn stats(&self) -> DebouncerStats {
        let buffers = self.inner.buffers.lock().await;
        let mut stats = DebouncerStats {
            active_buffers: buffers.len(),
            ..Default::default()
        };
        for (sender_id, buffer) in buffers.iter() {
            stats.total_messages += buffer.messages.len();
            stats.buffers.push(BufferStat {
                sender_id: sender_id.clone(),
                message_count: buffer.messages.len(),
                age_ms: buffer.opened_at.elapsed().as_millis(),
            });
        }
        stats
    }
}

impl Inner {
    /// Remove the sender's buffer and deliver it. Removal happens under the
    /// map lock, so admission for the same sender cannot interleave with it;
    /// delivery runs in its own task so a later admit cannot cancel an
    /// in-flight turn.
    async fn flush(inner: Arc<Inner>, sender_id: String) {
        let (messages, combined_text) = {
            let mut buffers = inner.buffers.lock().await;
            let Some(buffer) = buffers.remove(&sender_id) else {
                return;
            };
            if buffer.messages.is_empty() {
                return;
            }
            let combined = buffer
                .messages
                .iter()
                .map(|m| m.body.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            (buffer.messages, combined)
        };

        log::debug!(
            "debounce: flushing {} messages from {}: {:.60}",
            messages.len(),
            sender_id,
            combined_text
        );

        let consumer = inner
            .consumer
            .read()
            .expect("consumer lock poisoned")
            .clone();
        let Some(consumer) = consumer else {
            log::error!(
                "debounce: no consumer registered, turn lost for {}",
                sender_id
            );
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = consumer.on_turn(&sender_id, messages, combined_text).await {
                log::error!("debounce: consumer failed, turn lost for {}: {}", sender_id, e);
            }
        });
    }
}
