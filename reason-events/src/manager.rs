//! Per-run event bus (§4.5 "Event bus (C7)").
//!
//! Grounded on the teacher's `neuron-hooks::HookRegistry` /
//! `layer0::test_utils::LoggingHook` shape: a mutex-guarded append-only
//! record with synchronous callback dispatch, no cross-task fan-out.

use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use crate::event::Event;
use crate::stream_mode::StreamMode;

type ProgressCallback = Box<dyn FnMut(&Event) + Send>;
type TokenCallback = Box<dyn FnMut(&str) + Send>;

/// Per-run event bus: an append-only ring of [`Event`]s stamped with
/// elapsed time since this manager was created, plus optional `on_progress`
/// / `on_token` callbacks gated by [`StreamMode`].
///
/// Every method takes `&self` — the mutex is the synchronization point, not
/// exclusive ownership — so a `StreamingManager` can be shared behind an
/// `Arc` across the concurrent branches of a single run.
pub struct StreamingManager {
    start: OnceLock<Instant>,
    mode: StreamMode,
    events: Mutex<Vec<Event>>,
    on_progress: Mutex<Option<ProgressCallback>>,
    on_token: Mutex<Option<TokenCallback>>,
}

impl StreamingManager {
    /// Create a manager for a new run under the given [`StreamMode`].
    #[must_use]
    pub fn new(mode: StreamMode) -> Self {
        let start = OnceLock::new();
        let _ = start.set(Instant::now());
        Self {
            start,
            mode,
            events: Mutex::new(Vec::new()),
            on_progress: Mutex::new(None),
            on_token: Mutex::new(None),
        }
    }

    /// Register the progress callback, invoked synchronously for every
    /// event recorded while `mode.wants_events()`.
    pub fn set_on_progress(&self, callback: impl FnMut(&Event) + Send + 'static) {
        *self.on_progress.lock().expect("on_progress lock poisoned") = Some(Box::new(callback));
    }

    /// Register the token callback, invoked synchronously for every
    /// fragment published while `mode.wants_tokens()`.
    pub fn set_on_token(&self, callback: impl FnMut(&str) + Send + 'static) {
        *self.on_token.lock().expect("on_token lock poisoned") = Some(Box::new(callback));
    }

    fn elapsed_ms(&self) -> u64 {
        self.start
            .get()
            .expect("start is set in new()")
            .elapsed()
            .as_millis() as u64
    }

    /// Record an event: stamps `elapsed_ms`, appends it to the ring, and
    /// invokes `on_progress` — but only when the manager's mode calls for
    /// events at all. A run in `StreamMode::Tokens` or `StreamMode::None`
    /// never pays for the allocation or the lock.
    pub fn push(&self, mut event: Event) {
        if !self.mode.wants_events() {
            return;
        }
        event.elapsed_ms = self.elapsed_ms();
        if let Some(cb) = self.on_progress.lock().expect("on_progress lock poisoned").as_mut() {
            cb(&event);
        }
        self.events.lock().expect("events lock poisoned").push(event);
    }

    /// Publish a token fragment. Invokes `on_token` when the mode calls for
    /// tokens; never touches the event ring.
    pub fn token(&self, fragment: &str) {
        if !self.mode.wants_tokens() {
            return;
        }
        if let Some(cb) = self.on_token.lock().expect("on_token lock poisoned").as_mut() {
            cb(fragment);
        }
    }

    /// Drop every recorded event. Callbacks stay registered.
    pub fn clear(&self) {
        self.events.lock().expect("events lock poisoned").clear();
    }

    /// Snapshot every event recorded so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("events lock poisoned").clone()
    }

    /// Snapshot the most recent `n` events, oldest first. Returns fewer than
    /// `n` if the ring holds fewer.
    #[must_use]
    pub fn last_n(&self, n: usize) -> Vec<Event> {
        let guard = self.events.lock().expect("events lock poisoned");
        let start = guard.len().saturating_sub(n);
        guard[start..].to_vec()
    }

    /// The mode this manager was created with.
    #[must_use]
    pub fn mode(&self) -> StreamMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use std::sync::{Arc, Mutex as StdMutex};

    #[test]
    fn events_mode_records_and_calls_on_progress() {
        let mgr = StreamingManager::new(StreamMode::Events);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        mgr.set_on_progress(move |e| seen2.lock().unwrap().push(e.content.clone()));

        mgr.push(Event::new(EventType::Thought).with_content("step one"));
        mgr.push(Event::new(EventType::Thought).with_content("step two"));

        assert_eq!(mgr.events().len(), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("step one".to_string()), Some("step two".to_string())]
        );
    }

    #[test]
    fn none_mode_records_nothing() {
        let mgr = StreamingManager::new(StreamMode::None);
        mgr.push(Event::new(EventType::Thought).with_content("ignored"));
        assert!(mgr.events().is_empty());
    }

    #[test]
    fn tokens_mode_ignores_events_but_calls_on_token() {
        let mgr = StreamingManager::new(StreamMode::Tokens);
        let seen = Arc::new(StdMutex::new(String::new()));
        let seen2 = Arc::clone(&seen);
        mgr.set_on_token(move |t| seen2.lock().unwrap().push_str(t));

        mgr.push(Event::new(EventType::Thought).with_content("should not record"));
        mgr.token("Hel");
        mgr.token("lo");

        assert!(mgr.events().is_empty());
        assert_eq!(*seen.lock().unwrap(), "Hello");
    }

    #[test]
    fn both_mode_records_events_and_tokens() {
        let mgr = StreamingManager::new(StreamMode::Both);
        mgr.push(Event::new(EventType::Solution).with_is_solution(true));
        mgr.token("x");
        assert_eq!(mgr.events().len(), 1);
    }

    #[test]
    fn clear_empties_the_ring() {
        let mgr = StreamingManager::new(StreamMode::Events);
        mgr.push(Event::new(EventType::Progress));
        mgr.clear();
        assert!(mgr.events().is_empty());
    }

    #[test]
    fn last_n_returns_most_recent_in_order() {
        let mgr = StreamingManager::new(StreamMode::Events);
        for i in 0..5 {
            mgr.push(Event::new(EventType::Thought).with_content(i.to_string()));
        }
        let last = mgr.last_n(2);
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].content.as_deref(), Some("3"));
        assert_eq!(last[1].content.as_deref(), Some("4"));
    }

    #[test]
    fn last_n_saturates_when_fewer_events_than_requested() {
        let mgr = StreamingManager::new(StreamMode::Events);
        mgr.push(Event::new(EventType::Progress));
        assert_eq!(mgr.last_n(10).len(), 1);
    }

    #[test]
    fn elapsed_ms_is_monotonic_nondecreasing_across_pushes() {
        let mgr = StreamingManager::new(StreamMode::Events);
        mgr.push(Event::new(EventType::Progress));
        std::thread::sleep(std::time::Duration::from_millis(5));
        mgr.push(Event::new(EventType::Progress));
        let events = mgr.events();
        assert!(events[1].elapsed_ms >= events[0].elapsed_ms);
    }
}
