//! # PIN Rate Limiter
//!
//! In-memory fixed-window limiter keyed by source IP: at most 10 PIN
//! attempts per 5 minutes. Buckets are process-local (not persistent) and
//! purged lazily when their window expires.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Attempts allowed per window.
const MAX_ATTEMPTS: u32 = 10;

/// Window length.
const WINDOW: Duration = Duration::from_secs(5 * 60);

/// Sweep the whole map once it grows past this many buckets.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window rate limiter for PIN attempts.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<IpAddr, Bucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attempt from `ip`. Returns `false` when the caller is over
    /// the limit (every call counts, correct PIN or not).
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());

        if buckets.len() > SWEEP_THRESHOLD {
            buckets.retain(|_, bucket| bucket.reset_at > now);
        }

        let bucket = buckets.entry(ip).or_insert(Bucket {
            count: 0,
            reset_at: now + WINDOW,
        });

        if bucket.reset_at <= now {
            bucket.count = 0;
            bucket.reset_at = now + WINDOW;
        }

        bucket.count += 1;
        bucket.count <= MAX_ATTEMPTS
    }
}

// =============================================================================
// Tests
// =============================================================================
