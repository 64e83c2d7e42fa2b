use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

/// Per-device sliding-window admission control.
///
/// Each device owns an ordered sequence of admission timestamps. Timestamps
/// are appended in increasing order, so eviction is a prefix trim. State is
/// process-local and lost on restart.
pub struct RateLimiter {
    window_secs: i64,
    max_events: usize,
    buckets: RwLock<HashMap<String, Arc<Mutex<VecDeque<i64>>>>>,
}

impl RateLimiter {
    pub fn new(window_secs: i64, max_events: usize) -> Self {
        Self {
            window_secs,
            max_events,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Returns false when the device has already been admitted `max_events`
    /// times within the trailing window. Rejection is a normal outcome, not
    /// an error. Calls for the same device serialize on that device's bucket;
    /// distinct devices do not contend.
    pub fn admit(&self, device_id: &str, now: i64) -> bool {
        let bucket = self.bucket(device_id);
        let mut timestamps = bucket.lock().unwrap();

        while timestamps
            .front()
            .is_some_and(|&t| t < now - self.window_secs)
        {
            timestamps.pop_front();
        }

        if timestamps.len() >= self.max_events {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    fn bucket(&self, device_id: &str) -> Arc<Mutex<VecDeque<i64>>> {
        if let Some(bucket) = self.buckets.read().unwrap().get(device_id) {
            return bucket.clone();
        }
        let mut table = self.buckets.write().unwrap();
        table
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_admits() {
        let limiter = RateLimiter::new(60, 30);
        assert!(limiter.admit("dev-1", 0));
    }

    #[test]
    fn test_rejects_after_max_events() {
        let limiter = RateLimiter::new(60, 2);
        assert!(limiter.admit("dev-1", 0));
        assert!(limiter.admit("dev-1", 1));
        assert!(!limiter.admit("dev-1", 2));
    }

    #[test]
    fn test_admits_again_after_window_expires() {
        let limiter = RateLimiter::new(60, 2);
        assert!(limiter.admit("dev-1", 0));
        assert!(limiter.admit("dev-1", 1));
        assert!(!limiter.admit("dev-1", 2));

        // t=0 has aged out at t=61, t=1 has not
        assert!(limiter.admit("dev-1", 61));
        assert!(!limiter.admit("dev-1", 61));

        // everything has aged out by t=122
        assert!(limiter.admit("dev-1", 122));
    }

    #[test]
    fn test_devices_are_independent() {
        let limiter = RateLimiter::new(60, 1);
        assert!(limiter.admit("dev-1", 0));
        assert!(!limiter.admit("dev-1", 0));
        assert!(limiter.admit("dev-2", 0));
    }

    #[test]
    fn test_rejected_call_does_not_consume_slot() {
        let limiter = RateLimiter::new(60, 1);
        assert!(limiter.admit("dev-1", 0));
        assert!(!limiter.admit("dev-1", 10));
        // the rejected call at t=10 must not extend the window
        assert!(limiter.admit("dev-1", 61));
    }

    #[test]
    fn test_concurrent_same_device_admits_exactly_max() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let limiter = Arc::new(RateLimiter::new(60, 10));
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        if limiter.admit("dev-1", 0) {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 10);
    }
}
