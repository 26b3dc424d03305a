//! Request-scoped cancellation, deadlines and values
//!
//! A `Context` is handed to every provider, resource and data source call.
//! Contexts derived with [`Context::with_timeout`] or [`Context::with_value`]
//! keep the values of their parent and are cancelled together with it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

type Values = HashMap<String, Arc<dyn Any + Send + Sync>>;

#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    values: Values,
    cancel: Arc<watch::Sender<bool>>,
    /// Keeps the cancel channel open while a context uses it
    _alive: watch::Receiver<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (cancel, alive) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                values: Values::new(),
                cancel: Arc::new(cancel),
                _alive: alive,
            }),
        }
    }

    /// Derive a context that is cancelled once `timeout` elapses
    ///
    /// The deadline never extends past the parent's. Cancelling the parent
    /// cancels the child, not the other way round. The timer stops once the
    /// child and everything derived from it is dropped. Must be called from
    /// within a tokio runtime.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = self.deadline().map_or(own, |parent| parent.min(own));

        let (cancel, alive) = watch::channel(false);
        let cancel = Arc::new(cancel);

        let parent = self.clone();
        let child_cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline.into()) => {}
                _ = parent.cancelled() => {}
                _ = child_cancel.closed() => return,
            }
            child_cancel.send_replace(true);
        });

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                values: self.inner.values.clone(),
                cancel,
                _alive: alive,
            }),
        }
    }

    /// Derive a context carrying `value` under `key`, sharing this one's cancellation
    pub fn with_value<T: Send + Sync + 'static>(&self, key: &str, value: T) -> Self {
        let mut values = self.inner.values.clone();
        values.insert(key.to_string(), Arc::new(value));
        Self {
            inner: Arc::new(ContextInner {
                deadline: self.inner.deadline,
                values,
                cancel: Arc::clone(&self.inner.cancel),
                _alive: self.inner.cancel.subscribe(),
            }),
        }
    }

    /// None when the key is missing or holds another type
    pub fn get_value<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.inner.values.get(key)?.downcast_ref::<T>().cloned()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub fn cancel(&self) {
        self.inner.cancel.send_replace(true);
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn cancelled(&self) {
        let mut done = self.inner.cancel.subscribe();
        // the sender lives in self, so the channel cannot close while waiting
        let _ = done.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn values_are_inherited() {
        let root = Context::new().with_value("project", "p-1".to_string());
        let child = root.with_timeout(Duration::from_secs(5)).with_value("attempt", 2u32);

        assert_eq!(child.get_value::<String>("project"), Some("p-1".to_string()));
        assert_eq!(child.get_value::<u32>("attempt"), Some(2));
        assert_eq!(root.get_value::<u32>("attempt"), None);
        // wrong type
        assert_eq!(child.get_value::<u32>("project"), None);
    }

    #[tokio::test]
    async fn timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));
        assert!(!ctx.is_cancelled());

        sleep(Duration::from_millis(120)).await;

        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn manual_cancel() {
        let ctx = Context::new();
        assert!(!ctx.is_cancelled());

        ctx.cancel();

        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let ctx = Context::new();
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        ctx.cancel();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("cancelled() did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn parent_cancel_reaches_child() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(60));

        parent.cancel();
        timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("child was not cancelled with its parent");

        let sibling = Context::new();
        let value_child = sibling.with_value("k", 1u8);
        value_child.cancel();
        assert!(sibling.is_cancelled());
    }

    #[tokio::test]
    async fn child_cancel_leaves_parent() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(60));

        child.cancel();

        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_child_stops_its_timer() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(1200)).with_value("k", 1u8);
        let timer = Arc::downgrade(&child.inner.cancel);

        drop(child);
        timeout(Duration::from_secs(1), async {
            while timer.upgrade().is_some() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timer task outlived its context");
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn deadline_never_extends_parent() {
        let ctx = Context::new();
        assert!(ctx.deadline().is_none());

        let short = ctx.with_timeout(Duration::from_secs(1));
        let long = short.with_timeout(Duration::from_secs(3600));

        assert!(short.deadline().is_some());
        assert_eq!(long.deadline(), short.deadline());
    }
}
