use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::agency::Agency;
use crate::common::error::{ArangoError, Result};

/// Shortest TTL a lock may use
pub const MIN_LOCK_TTL: Duration = Duration::from_secs(5);

const RETRY_BASE: Duration = Duration::from_millis(100);
const RETRY_MAX: Duration = Duration::from_secs(1);

/// Distributed lock stored as `key -> id` in the agency.
///
/// While held, a background task rewrites the entry every `ttl / 2` so it
/// does not expire. If another party replaces the entry the lock is
/// considered lost and `is_locked` turns false.
pub struct Lock {
    agency: Agency,
    key: Vec<String>,
    id: String,
    ttl: Duration,
    held: Mutex<Option<Held>>,
}

/// One acquisition. Each gets its own flag so a renewal task left from an
/// earlier acquisition cannot touch a later one.
struct Held {
    alive: Arc<AtomicBool>,
    /// Dropping the sender stops the renewal task
    _stop: oneshot::Sender<()>,
}

impl Lock {
    /// An empty `id` is replaced by a random one; `ttl` is raised to
    /// `MIN_LOCK_TTL` when shorter.
    pub fn new(agency: Agency, key: &[&str], id: &str, ttl: Duration) -> Result<Self> {
        if key.is_empty() || key.iter().any(|part| part.is_empty()) {
            return Err(ArangoError::invalid_argument("lock key cannot be empty"));
        }
        let id = if id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            id.to_string()
        };
        Ok(Lock {
            agency,
            key: key.iter().map(|s| s.to_string()).collect(),
            id,
            ttl: ttl.max(MIN_LOCK_TTL),
            held: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key(&self) -> String {
        super::key_path(&self.key_parts())
    }

    /// Held by this instance and not taken over
    pub fn is_locked(&self) -> bool {
        self.current().is_some()
    }

    fn key_parts(&self) -> Vec<&str> {
        self.key.iter().map(String::as_str).collect()
    }

    /// Flag of the current acquisition while it is still alive
    fn current(&self) -> Option<Arc<AtomicBool>> {
        self.held
            .lock()
            .as_ref()
            .filter(|held| held.alive.load(Ordering::SeqCst))
            .map(|held| held.alive.clone())
    }

    /// Acquire the lock. Fails with `AlreadyLocked` when this instance
    /// holds it or the key is held by someone else.
    pub async fn lock(&self) -> Result<()> {
        if self.is_locked() {
            return Err(ArangoError::AlreadyLocked);
        }
        match self.agency.write_key_if_empty(&self.key_parts(), &self.id, Some(self.ttl)).await {
            Ok(()) => {}
            Err(e) if e.is_precondition_failed() => return Err(ArangoError::AlreadyLocked),
            Err(e) => return Err(e),
        }
        info!(key = %self.key(), id = %self.id, ttl = ?self.ttl, "acquired lock");

        let alive = Arc::new(AtomicBool::new(true));
        let (stop_tx, stop_rx) = oneshot::channel();
        let renewal = Renewal {
            agency: self.agency.clone(),
            key: self.key.clone(),
            id: self.id.clone(),
            ttl: self.ttl,
            alive: alive.clone(),
        };
        tokio::spawn(renewal.run(stop_rx));
        // replacing an earlier acquisition stops its renewal task
        *self.held.lock() = Some(Held { alive, _stop: stop_tx });
        Ok(())
    }

    /// Release the lock. Fails with `NotLocked` when it is not held.
    pub async fn unlock(&self) -> Result<()> {
        let Some(alive) = self.current() else {
            self.held.lock().take();
            return Err(ArangoError::NotLocked);
        };
        match self.agency.remove_key_if_equal_to(&self.key_parts(), &self.id).await {
            Ok(()) => {}
            Err(e) if e.is_precondition_failed() => {
                self.release_local(&alive);
                warn!(key = %self.key(), "lock was taken over before unlock");
                return Err(ArangoError::NotLocked);
            }
            Err(e) => return Err(e),
        }
        self.release_local(&alive);
        info!(key = %self.key(), id = %self.id, "released lock");
        Ok(())
    }

    /// Forget the acquisition owning `alive` and stop its renewal
    fn release_local(&self, alive: &Arc<AtomicBool>) {
        alive.store(false, Ordering::SeqCst);
        let mut held = self.held.lock();
        if held.as_ref().is_some_and(|h| Arc::ptr_eq(&h.alive, alive)) {
            held.take();
        }
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if let Some(held) = self.held.get_mut().take() {
            if held.alive.load(Ordering::SeqCst) {
                debug!(key = %self.key(), "lock dropped while held, stopping renewal");
            }
        }
    }
}

impl std::fmt::Debug for Lock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lock")
            .field("key", &self.key())
            .field("id", &self.id)
            .field("ttl", &self.ttl)
            .field("locked", &self.is_locked())
            .finish()
    }
}

struct Renewal {
    agency: Agency,
    key: Vec<String>,
    id: String,
    ttl: Duration,
    alive: Arc<AtomicBool>,
}

enum RenewOutcome {
    Renewed,
    Lost,
    Stopped,
}

impl Renewal {
    async fn run(self, mut stop: oneshot::Receiver<()>) {
        let interval = self.ttl / 2;
        let mut expires_at = Instant::now() + self.ttl;
        loop {
            tokio::select! {
                _ = &mut stop => return,
                _ = tokio::time::sleep(interval) => {}
            }
            match self.renew(&mut stop, expires_at).await {
                RenewOutcome::Renewed => expires_at = Instant::now() + self.ttl,
                RenewOutcome::Lost => {
                    // a released or replaced acquisition is not marked lost
                    if matches!(stop.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
                        self.alive.store(false, Ordering::SeqCst);
                    }
                    return;
                }
                RenewOutcome::Stopped => return,
            }
        }
    }

    /// Rewrite the entry, retrying transient failures until the current
    /// entry would have expired.
    async fn renew(&self, stop: &mut oneshot::Receiver<()>, expires_at: Instant) -> RenewOutcome {
        let key: Vec<&str> = self.key.iter().map(String::as_str).collect();
        let mut attempt: u32 = 0;
        loop {
            let result = tokio::select! {
                _ = &mut *stop => return RenewOutcome::Stopped,
                result = self.agency.write_key_if_equal_to(&key, &self.id, &self.id, Some(self.ttl)) => result,
            };
            match result {
                Ok(()) => {
                    debug!(key = %super::key_path(&key), "renewed lock");
                    return RenewOutcome::Renewed;
                }
                Err(e) if e.is_precondition_failed() => {
                    warn!(key = %super::key_path(&key), "lock taken over by another party");
                    return RenewOutcome::Lost;
                }
                Err(e) => {
                    if Instant::now() >= expires_at {
                        warn!(key = %super::key_path(&key), error = %e, "lock expired while renewal kept failing");
                        return RenewOutcome::Lost;
                    }
                    let delay = backoff(attempt);
                    attempt = attempt.saturating_add(1);
                    debug!(key = %super::key_path(&key), error = %e, ?delay, "lock renewal failed, retrying");
                    tokio::select! {
                        _ = &mut *stop => return RenewOutcome::Stopped,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// Exponential backoff with jitter, capped at `RETRY_MAX`
fn backoff(attempt: u32) -> Duration {
    let exp = RETRY_BASE.saturating_mul(1u32 << attempt.min(4));
    let base = exp.min(RETRY_MAX);
    let jitter = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
    (base + Duration::from_millis(jitter)).min(RETRY_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use async_trait::async_trait;
    use crate::connection::mock::MockConnection;
    use crate::connection::{Authentication, Connection, Request, Response};

    /// Answers like the inner mock but holds each reply for the next
    /// scripted delay
    struct Delayed {
        inner: Arc<MockConnection>,
        delays: parking_lot::Mutex<VecDeque<Duration>>,
    }

    #[async_trait]
    impl Connection for Delayed {
        async fn execute(&self, request: Request) -> Result<Response> {
            let resp = self.inner.execute(request).await;
            let delay = self.delays.lock().pop_front().unwrap_or_default();
            tokio::time::sleep(delay).await;
            resp
        }

        fn endpoints(&self) -> Vec<String> {
            self.inner.endpoints()
        }

        fn update_endpoints(&self, endpoints: &[String]) -> Result<()> {
            self.inner.update_endpoints(endpoints)
        }

        fn set_authentication(&self, auth: Authentication) -> Result<()> {
            self.inner.set_authentication(auth)
        }
    }

    fn agency(conn: &Arc<MockConnection>) -> Agency {
        Agency::new(conn.clone())
    }

    fn ok() -> serde_json::Value {
        json!({"results": [1]})
    }

    fn precondition_failed() -> Response {
        Response::new(412).with_body(r#"{"results":[0]}"#)
    }

    #[test]
    fn test_new_defaults() {
        let conn = MockConnection::new();
        let lock = Lock::new(agency(&conn), &["locks", "job"], "", Duration::from_secs(1)).unwrap();
        assert_eq!(lock.ttl(), MIN_LOCK_TTL);
        assert!(Uuid::parse_str(lock.id()).is_ok());
        assert_eq!(lock.key(), "/locks/job");
        assert!(!lock.is_locked());
        assert!(Lock::new(agency(&conn), &[], "x", Duration::from_secs(10)).is_err());
    }

    #[test]
    fn test_backoff_bounds() {
        for attempt in 0..10 {
            let delay = backoff(attempt);
            assert!(delay >= RETRY_BASE);
            assert!(delay <= RETRY_MAX);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_renew_unlock() {
        let conn = MockConnection::new();
        conn.push_json(200, ok());
        conn.push_json(200, ok());
        conn.push_json(200, ok());
        let lock = Lock::new(agency(&conn), &["locks", "job"], "me", Duration::from_secs(10)).unwrap();

        lock.lock().await.unwrap();
        assert!(lock.is_locked());
        assert_eq!(conn.last_request().body_json().unwrap(), json!([[
            {"/locks/job": {"op": "set", "new": "me", "ttl": 10}},
            {"/locks/job": {"oldEmpty": true}}
        ]]));
        assert!(lock.lock().await.unwrap_err().is_already_locked());
        assert_eq!(conn.request_count(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(conn.request_count(), 2);
        assert_eq!(conn.last_request().body_json().unwrap(), json!([[
            {"/locks/job": {"op": "set", "new": "me", "ttl": 10}},
            {"/locks/job": {"old": "me"}}
        ]]));

        lock.unlock().await.unwrap();
        assert!(!lock.is_locked());
        assert_eq!(conn.last_request().body_json().unwrap(), json!([[
            {"/locks/job": {"op": "delete"}},
            {"/locks/job": {"old": "me"}}
        ]]));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(conn.request_count(), 3);
        assert!(lock.unlock().await.unwrap_err().is_not_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_contended() {
        let conn = MockConnection::new();
        conn.push(precondition_failed());
        let lock = Lock::new(agency(&conn), &["locks", "job"], "me", Duration::from_secs(10)).unwrap();
        assert!(lock.lock().await.unwrap_err().is_already_locked());
        assert!(!lock.is_locked());
        assert!(lock.unlock().await.unwrap_err().is_not_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_takeover_detected() {
        let conn = MockConnection::new();
        conn.push_json(200, ok());
        conn.push(precondition_failed());
        let lock = Lock::new(agency(&conn), &["locks", "job"], "me", Duration::from_secs(10)).unwrap();

        lock.lock().await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!lock.is_locked());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(conn.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_retries_transient_errors() {
        let conn = MockConnection::new();
        conn.push_json(200, ok());
        conn.push_error(ArangoError::transport("connection reset"));
        conn.push_json(200, ok());
        let lock = Lock::new(agency(&conn), &["locks", "job"], "me", Duration::from_secs(10)).unwrap();

        lock.lock().await.unwrap();
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(conn.request_count(), 3);
        assert!(lock.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_gives_up_after_expiry() {
        let conn = MockConnection::new();
        conn.push_json(200, ok());
        let lock = Lock::new(agency(&conn), &["locks", "job"], "me", Duration::from_secs(10)).unwrap();

        lock.lock().await.unwrap();
        // every renewal attempt now fails with a transport error
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(!lock.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_renewal() {
        let conn = MockConnection::new();
        conn.push_json(200, ok());
        let lock = Lock::new(agency(&conn), &["locks", "job"], "me", Duration::from_secs(10)).unwrap();
        lock.lock().await.unwrap();
        drop(lock);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(conn.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relock_while_old_renewal_in_flight() {
        let conn = MockConnection::new();
        conn.push_json(200, ok());
        // renewal of the first acquisition, answered late with a takeover
        conn.push(precondition_failed());
        conn.push_json(200, ok());
        conn.push_json(200, ok());
        conn.push_json(200, ok());
        conn.push_json(200, ok());
        let delayed = Arc::new(Delayed {
            inner: conn.clone(),
            delays: parking_lot::Mutex::new(VecDeque::from([Duration::ZERO, Duration::from_secs(5)])),
        });
        let lock = Lock::new(Agency::new(delayed), &["locks", "job"], "me", Duration::from_secs(10)).unwrap();

        lock.lock().await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(conn.request_count(), 2);

        lock.unlock().await.unwrap();
        lock.lock().await.unwrap();
        assert!(lock.is_locked());

        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert!(lock.is_locked());
        assert_eq!(conn.request_count(), 4);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(conn.request_count(), 5);
        assert!(lock.is_locked());

        lock.unlock().await.unwrap();
        assert!(!lock.is_locked());
        assert_eq!(conn.last_request().body_json().unwrap(), json!([[
            {"/locks/job": {"op": "delete"}},
            {"/locks/job": {"old": "me"}}
        ]]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_after_takeover() {
        let conn = MockConnection::new();
        conn.push_json(200, ok());
        conn.push(precondition_failed());
        let lock = Lock::new(agency(&conn), &["locks", "job"], "me", Duration::from_secs(10)).unwrap();

        lock.lock().await.unwrap();
        assert!(lock.unlock().await.unwrap_err().is_not_locked());
        assert!(!lock.is_locked());
        assert_eq!(conn.request_count(), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(conn.request_count(), 2);
        assert!(lock.unlock().await.unwrap_err().is_not_locked());
        assert_eq!(conn.request_count(), 2);
    }
}
