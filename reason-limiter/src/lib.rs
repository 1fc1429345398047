//! FIFO admission limiter (C2) — serves model-call permits in strict
//! arrival order under a bounded concurrency cap.
//!
//! # Model
//!
//! A single background dispatcher task owns the slot count. Waiters send
//! a request (carrying a one-shot reply channel) into an unbounded queue;
//! the dispatcher, whenever a slot is free, pops the oldest request and
//! hands it a [`Permit`]. A waiter whose future is dropped before it
//! receives a reply (cancellation) leaves its reply channel closed; the
//! dispatcher detects the closed channel on send failure and reclaims the
//! slot immediately rather than leaking it (§4.2).
//!
//! Setting the cap to 0 bypasses the limiter entirely: [`FifoLimiter::acquire`]
//! returns a no-op permit without ever talking to the dispatcher (§4.2
//! invariant iv).

use std::sync::{Arc, OnceLock, RwLock};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// A single-use admission permit. Dropping it releases the slot exactly
/// once — Rust's ownership model makes "release exactly once" a property
/// of the type rather than something callers must remember to do.
pub struct Permit {
    inner: PermitInner,
}

enum PermitInner {
    /// Bypass mode (cap == 0): holds nothing, releases nothing.
    NoOp,
    /// A real permit: notifies the dispatcher on drop.
    Real(mpsc::UnboundedSender<()>),
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let PermitInner::Real(tx) = &self.inner {
            // Dispatcher may already be gone (process shutdown); that's fine,
            // there's nothing left to release a slot for.
            let _ = tx.send(());
        }
    }
}

/// Error returned when the caller's cancellation token fires before a
/// permit is granted.
#[derive(Debug, thiserror::Error)]
#[error("acquire cancelled")]
pub struct Cancelled;

struct Waiter {
    reply: oneshot::Sender<Permit>,
}

enum DispatchMsg {
    Acquire(Waiter),
}

/// A FIFO admission limiter with a fixed concurrency cap.
///
/// Clone is cheap (an `Arc` around a single sender); all clones share the
/// same dispatcher and slot pool.
#[derive(Clone)]
pub struct FifoLimiter {
    tx: Option<mpsc::UnboundedSender<DispatchMsg>>,
}

impl FifoLimiter {
    /// Create a limiter with the given concurrency cap. `cap == 0` means
    /// unlimited — every `acquire` short-circuits to a no-op permit.
    #[must_use]
    pub fn new(cap: u32) -> Self {
        if cap == 0 {
            return Self { tx: None };
        }
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatcher_loop(rx, cap));
        Self { tx: Some(tx) }
    }

    /// Acquire a permit, honoring `cancel`. Returns [`Cancelled`] if
    /// `cancel` fires before a slot is granted — no slot is ever held in
    /// that case (§8 cancellation law).
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Permit, Cancelled> {
        let Some(tx) = &self.tx else {
            return Ok(Permit {
                inner: PermitInner::NoOp,
            });
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        // Send failure here means the dispatcher task is gone (process
        // shutting down); treat that the same as cancellation.
        if tx.send(DispatchMsg::Acquire(Waiter { reply: reply_tx })).is_err() {
            return Err(Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            permit = reply_rx => permit.map_err(|_| Cancelled),
        }
    }
}

async fn dispatcher_loop(mut rx: mpsc::UnboundedReceiver<DispatchMsg>, cap: u32) {
    let mut queue: std::collections::VecDeque<Waiter> = std::collections::VecDeque::new();
    let mut available: u32 = cap;

    // Granted permits report their release back to us over this channel,
    // distinct from the acquire-request channel above.
    let (self_release_tx, mut self_release_rx) = mpsc::unbounded_channel::<()>();

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(DispatchMsg::Acquire(w)) => queue.push_back(w),
                    None => return,
                }
            }
            Some(()) = self_release_rx.recv() => {
                available += 1;
            }
        }

        while available > 0 {
            let Some(waiter) = queue.pop_front() else {
                break;
            };
            let permit = Permit {
                inner: PermitInner::Real(self_release_tx.clone()),
            };
            match waiter.reply.send(permit) {
                Ok(()) => available -= 1,
                Err(orphaned_permit) => {
                    // Orphaned waiter: its receiver was dropped (cancelled)
                    // before we could hand it the permit. We never actually
                    // decremented `available` for this permit, so letting it
                    // `Drop` normally would send a spurious release and
                    // over-grant the cap by one. Forget it instead — no
                    // slot was spent, so none must be given back.
                    std::mem::forget(orphaned_permit);
                    tracing::debug!("reclaiming orphaned limiter slot");
                }
            }
        }
    }
}

/// Process-wide limiter singleton, sized from [`reason_core::Config::get`].
static SINGLETON: RwLock<Option<Arc<FifoLimiter>>> = RwLock::new(None);
static REGISTERED: OnceLock<()> = OnceLock::new();

/// Return the process-wide limiter, constructing it from the current
/// config on first call.
pub fn global() -> Arc<FifoLimiter> {
    REGISTERED.get_or_init(|| reason_core::register_limiter_reset(reset));
    {
        let guard = SINGLETON.read().expect("limiter lock poisoned");
        if let Some(l) = guard.as_ref() {
            return Arc::clone(l);
        }
    }
    let mut guard = SINGLETON.write().expect("limiter lock poisoned");
    if let Some(l) = guard.as_ref() {
        return Arc::clone(l);
    }
    let cap = reason_core::Config::get().max_concurrent_model_calls;
    let limiter = Arc::new(FifoLimiter::new(cap));
    *guard = Some(Arc::clone(&limiter));
    limiter
}

/// Tear down the singleton. Called by `reason_core::Config::reset`.
fn reset() {
    let mut guard = SINGLETON.write().expect("limiter lock poisoned");
    *guard = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn unlimited_bypasses_dispatcher() {
        let limiter = FifoLimiter::new(0);
        let cancel = CancellationToken::new();
        let p1 = limiter.acquire(&cancel).await.unwrap();
        let p2 = limiter.acquire(&cancel).await.unwrap();
        drop(p1);
        drop(p2);
    }

    #[tokio::test]
    async fn at_most_cap_permits_outstanding_at_once() {
        let limiter = FifoLimiter::new(2);
        let cancel = CancellationToken::new();
        let p1 = limiter.acquire(&cancel).await.unwrap();
        let p2 = limiter.acquire(&cancel).await.unwrap();

        let limiter2 = limiter.clone();
        let cancel2 = cancel.clone();
        let handle = tokio::spawn(async move { limiter2.acquire(&cancel2).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        drop(p1);
        let p3 = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("did not complete")
            .expect("task panicked")
            .expect("acquire failed");

        drop(p2);
        drop(p3);
    }

    #[tokio::test]
    async fn fifo_ordering_under_cap_one() {
        let limiter = Arc::new(FifoLimiter::new(1));
        let cancel = CancellationToken::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let first = limiter.acquire(&cancel).await.unwrap();

        let mut handles = Vec::new();
        for id in 0..10u32 {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(u64::from(id))).await;
                let permit = limiter.acquire(&cancel).await.unwrap();
                order.lock().unwrap().push(id);
                tokio::time::sleep(Duration::from_millis(5)).await;
                drop(permit);
            }));
        }

        // Give every waiter time to enqueue (in id order, since each sleeps
        // `id` ms before calling acquire) before we release the first
        // permit and let the FIFO queue drain.
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(first);

        for h in handles {
            h.await.unwrap();
        }

        let observed = order.lock().unwrap().clone();
        assert_eq!(observed, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn cancellation_returns_error_and_does_not_leak_slot() {
        let limiter = Arc::new(FifoLimiter::new(1));
        let cancel_holder = CancellationToken::new();
        let _held = limiter.acquire(&cancel_holder).await.unwrap();

        let waiter_cancel = CancellationToken::new();
        let limiter2 = Arc::clone(&limiter);
        let waiter_cancel2 = waiter_cancel.clone();
        let handle = tokio::spawn(async move { limiter2.acquire(&waiter_cancel2).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter_cancel.cancel();
        let result = handle.await.unwrap();
        assert!(result.is_err());

        // Dropping the held permit should now let a fresh acquire succeed
        // immediately, proving the cancelled waiter never held the slot.
        drop(_held);
        let fresh_cancel = CancellationToken::new();
        let fresh = tokio::time::timeout(Duration::from_secs(1), limiter.acquire(&fresh_cancel))
            .await
            .expect("acquire after cancellation timed out");
        assert!(fresh.is_ok());
    }

    #[tokio::test]
    async fn orphaned_cancellations_do_not_over_grant_the_cap() {
        // Hold the single slot, then queue a batch of waiters and cancel
        // every one of them before the dispatcher can serve any of them.
        // Each cancellation risks the dispatcher racing a `Permit` into
        // existence for an already-dropped reply channel; if that permit's
        // `Drop` fires a spurious release, `available` would be bumped once
        // per orphan with no matching acquire, over-granting the cap.
        let limiter = Arc::new(FifoLimiter::new(1));
        let held_cancel = CancellationToken::new();
        let held = limiter.acquire(&held_cancel).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = Arc::clone(&limiter);
            let cancel = CancellationToken::new();
            cancel.cancel();
            handles.push(tokio::spawn(async move { limiter.acquire(&cancel).await }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_err());
        }

        drop(held);

        // If an orphan over-granted the cap, two concurrent acquires could
        // both succeed immediately even with cap == 1.
        let cancel_a = CancellationToken::new();
        let cancel_b = CancellationToken::new();
        let permit_a = limiter.acquire(&cancel_a).await.unwrap();
        let limiter2 = Arc::clone(&limiter);
        let handle_b = tokio::spawn(async move { limiter2.acquire(&cancel_b).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle_b.is_finished(), "second acquire must block while the cap-1 slot is held");

        drop(permit_a);
        let permit_b = tokio::time::timeout(Duration::from_secs(1), handle_b)
            .await
            .expect("second acquire never completed")
            .expect("task panicked")
            .expect("acquire failed");
        drop(permit_b);
    }

    #[tokio::test]
    async fn permits_outstanding_never_exceed_cap() {
        let limiter = Arc::new(FifoLimiter::new(3));
        let cancel = CancellationToken::new();
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            let concurrent = Arc::clone(&concurrent);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire(&cancel).await.unwrap();
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) <= 3);
    }
}
