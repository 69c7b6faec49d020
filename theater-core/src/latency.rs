//! Latency sampling per audience member
//!
//! Measures round-trip time over one connection using liveness probes and
//! keeps a bounded rolling window of samples. The results feed the stats
//! endpoint only; the reconciliation algorithm never reads them.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Number of RTT samples to keep
const MAX_SAMPLES: usize = 100;

/// Probe ids wrap below this bound
const PROBE_ID_SPAN: u32 = 10_000;

/// Probes unanswered for this long are forgotten
const STALE_PROBE_MS: u64 = 10_000;

/// Number of histogram buckets spanning the sample range
const HISTOGRAM_BUCKETS: usize = 8;

/// How often the transport layer should start a new probe cycle
pub const PROBE_INTERVAL: Duration = Duration::from_secs(20);

/// RTT history for one connection
#[derive(Debug, Default)]
pub struct LatencySampler {
    samples: VecDeque<u64>,
    /// Pending probes awaiting an ack, keyed by probe id, valued by send time
    pending: HashMap<u32, u64>,
    next_probe_id: u32,
}

impl LatencySampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a probe id and record its send time. Returns the id to include
    /// in the outgoing probe message.
    pub fn begin_probe(&mut self, now_ms: u64) -> u32 {
        let probe_id = self.next_probe_id;
        self.next_probe_id = (self.next_probe_id + 1) % PROBE_ID_SPAN;
        self.pending
            .retain(|_, sent_ms| now_ms.saturating_sub(*sent_ms) < STALE_PROBE_MS);
        self.pending.insert(probe_id, now_ms);
        probe_id
    }

    /// Record the matching ack. Returns the measured RTT if the probe id was
    /// still live.
    pub fn complete_probe(&mut self, probe_id: u32, now_ms: u64) -> Option<u64> {
        let sent_ms = self.pending.remove(&probe_id)?;
        let rtt_ms = now_ms.saturating_sub(sent_ms);
        if self.samples.len() >= MAX_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt_ms);
        tracing::trace!("latency sample recorded: {}ms", rtt_ms);
        Some(rtt_ms)
    }

    /// Most recent RTT sample
    pub fn last_sample(&self) -> Option<u64> {
        self.samples.back().copied()
    }

    /// Mean RTT over the current window
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().sum();
        Some(sum as f64 / self.samples.len() as f64)
    }

    /// Fixed-bucket histogram over the current samples: eight buckets
    /// spanning `[min, max]`, each labeled with its lower bound. Empty until
    /// at least two samples exist.
    pub fn histogram(&self) -> (Vec<u32>, Vec<String>) {
        if self.samples.len() < 2 {
            return (Vec::new(), Vec::new());
        }
        let mut min = u64::MAX;
        let mut max = 0u64;
        for &sample in &self.samples {
            min = min.min(sample);
            max = max.max(sample);
        }
        let interval = (max - min + 1) as f64 / HISTOGRAM_BUCKETS as f64;
        let labels = (0..HISTOGRAM_BUCKETS)
            .map(|i| format!("{:.0}ms", min as f64 + i as f64 * interval))
            .collect();
        let mut buckets = vec![0u32; HISTOGRAM_BUCKETS];
        for &sample in &self.samples {
            let bucket = ((sample - min) as f64 / interval) as usize;
            buckets[bucket.min(HISTOGRAM_BUCKETS - 1)] += 1;
        }
        (buckets, labels)
    }
}
