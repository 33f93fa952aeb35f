//! Per-peer and node-level runtime statistics: bounded ring buffers of
//! request processing durations, Result-Code bucket counters over sliding
//! windows, and periodic snapshots for history.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

const SAMPLE_CAPACITY: usize = 1024;
const HISTORY_CAPACITY: usize = 1440;
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(60);

const WINDOW_SHORT: Duration = Duration::from_secs(60);
const WINDOW_MEDIUM: Duration = Duration::from_secs(300);
const WINDOW_LONG: Duration = Duration::from_secs(900);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCodeBuckets {
    pub r1xxx: u64,
    pub r2xxx: u64,
    pub r3xxx: u64,
    pub r4xxx: u64,
    pub r5xxx: u64,
}

impl ResultCodeBuckets {
    fn record(&mut self, result_code: u32) {
        match result_code / 1000 {
            1 => self.r1xxx += 1,
            2 => self.r2xxx += 1,
            3 => self.r3xxx += 1,
            4 => self.r4xxx += 1,
            5 => self.r5xxx += 1,
            _ => {}
        }
    }
}

struct RequestSample {
    request_type: String,
    duration: Duration,
}

/// Per-peer ring buffer of processed-request samples plus a sliding-window
/// log of observed Result-Codes.
pub struct PeerStatistics {
    samples: Mutex<VecDeque<RequestSample>>,
    results: Mutex<VecDeque<(Instant, u32)>>,
}

impl Default for PeerStatistics {
    fn default() -> Self {
        PeerStatistics {
            samples: Mutex::new(VecDeque::with_capacity(SAMPLE_CAPACITY)),
            results: Mutex::new(VecDeque::new()),
        }
    }
}

impl PeerStatistics {
    pub fn new() -> PeerStatistics {
        PeerStatistics::default()
    }

    pub fn record_request(&self, request_type: impl Into<String>, duration: Duration) {
        let mut samples = self.samples.lock().unwrap();
        if samples.len() == SAMPLE_CAPACITY {
            samples.pop_front();
        }
        samples.push_back(RequestSample {
            request_type: request_type.into(),
            duration,
        });
    }

    pub fn record_result(&self, result_code: u32) {
        let mut results = self.results.lock().unwrap();
        results.push_back((Instant::now(), result_code));
        trim_older_than(&mut results, WINDOW_LONG);
    }

    /// Mean duration across samples of `request_type`, or `None` if none recorded.
    pub fn average_response_time(&self, request_type: &str) -> Option<Duration> {
        let samples = self.samples.lock().unwrap();
        mean_duration(samples.iter().filter(|s| s.request_type == request_type))
    }

    pub fn overall_average_response_time(&self) -> Option<Duration> {
        let samples = self.samples.lock().unwrap();
        mean_duration(samples.iter())
    }

    /// Requests per second for `request_type`: count / sum(durations).
    pub fn rate(&self, request_type: &str) -> Option<f64> {
        let samples = self.samples.lock().unwrap();
        rate_of(samples.iter().filter(|s| s.request_type == request_type))
    }

    pub fn overall_rate(&self) -> Option<f64> {
        let samples = self.samples.lock().unwrap();
        rate_of(samples.iter())
    }

    pub fn result_code_buckets(&self, window: Duration) -> ResultCodeBuckets {
        let mut results = self.results.lock().unwrap();
        trim_older_than(&mut results, WINDOW_LONG);
        let cutoff = Instant::now().checked_sub(window);
        let mut buckets = ResultCodeBuckets::default();
        for (at, code) in results.iter() {
            if cutoff.map(|c| *at >= c).unwrap_or(true) {
                buckets.record(*code);
            }
        }
        buckets
    }

    fn per_type_average(&self) -> HashMap<String, Duration> {
        let samples = self.samples.lock().unwrap();
        let mut totals: HashMap<String, (Duration, u32)> = HashMap::new();
        for s in samples.iter() {
            let entry = totals.entry(s.request_type.clone()).or_default();
            entry.0 += s.duration;
            entry.1 += 1;
        }
        totals
            .into_iter()
            .map(|(k, (total, count))| (k, total / count))
            .collect()
    }
}

fn trim_older_than(results: &mut VecDeque<(Instant, u32)>, window: Duration) {
    let cutoff = Instant::now().checked_sub(window);
    while let Some((at, _)) = results.front() {
        if cutoff.map(|c| *at < c).unwrap_or(false) {
            results.pop_front();
        } else {
            break;
        }
    }
}

fn mean_duration<'a>(samples: impl Iterator<Item = &'a RequestSample>) -> Option<Duration> {
    let (total, count) = samples.fold((Duration::ZERO, 0u32), |(total, count), s| {
        (total + s.duration, count + 1)
    });
    if count == 0 {
        None
    } else {
        Some(total / count)
    }
}

fn rate_of<'a>(samples: impl Iterator<Item = &'a RequestSample>) -> Option<f64> {
    let (total, count) = samples.fold((Duration::ZERO, 0u32), |(total, count), s| {
        (total + s.duration, count + 1)
    });
    if count == 0 || total.is_zero() {
        None
    } else {
        Some(count as f64 / total.as_secs_f64())
    }
}

/// One 60-second snapshot of the node-level aggregate view.
#[derive(Debug, Clone)]
pub struct StatisticsSnapshot {
    pub taken_at: SystemTime,
    pub per_type_average_response_time: HashMap<String, Duration>,
    pub overall_average_response_time: Option<Duration>,
    pub result_codes_60s: ResultCodeBuckets,
    pub result_codes_300s: ResultCodeBuckets,
    pub result_codes_900s: ResultCodeBuckets,
}

/// Aggregates `PeerStatistics` across every peer known to a node, plus the
/// rolling snapshot history.
pub struct NodeStatistics {
    history: Mutex<VecDeque<StatisticsSnapshot>>,
}

impl Default for NodeStatistics {
    fn default() -> Self {
        NodeStatistics {
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }
}

impl NodeStatistics {
    pub fn new() -> NodeStatistics {
        NodeStatistics::default()
    }

    pub fn snapshot_interval() -> Duration {
        SNAPSHOT_INTERVAL
    }

    /// Builds the current aggregate view across `peers` without recording it.
    pub fn aggregate<'a>(
        &self,
        peers: impl Iterator<Item = &'a PeerStatistics>,
        now: SystemTime,
    ) -> StatisticsSnapshot {
        let peers: Vec<&PeerStatistics> = peers.collect();

        let mut totals: HashMap<String, (Duration, u32)> = HashMap::new();
        let mut overall_total = Duration::ZERO;
        let mut overall_count = 0u32;
        for peer in &peers {
            for (request_type, avg) in peer.per_type_average() {
                let entry = totals.entry(request_type).or_default();
                entry.0 += avg;
                entry.1 += 1;
            }
            if let Some(avg) = peer.overall_average_response_time() {
                overall_total += avg;
                overall_count += 1;
            }
        }
        let per_type_average_response_time = totals
            .into_iter()
            .map(|(k, (total, count))| (k, total / count))
            .collect();
        let overall_average_response_time = if overall_count == 0 {
            None
        } else {
            Some(overall_total / overall_count)
        };

        let mut result_codes_60s = ResultCodeBuckets::default();
        let mut result_codes_300s = ResultCodeBuckets::default();
        let mut result_codes_900s = ResultCodeBuckets::default();
        for peer in &peers {
            let b60 = peer.result_code_buckets(WINDOW_SHORT);
            let b300 = peer.result_code_buckets(WINDOW_MEDIUM);
            let b900 = peer.result_code_buckets(WINDOW_LONG);
            result_codes_60s.r1xxx += b60.r1xxx;
            result_codes_60s.r2xxx += b60.r2xxx;
            result_codes_60s.r3xxx += b60.r3xxx;
            result_codes_60s.r4xxx += b60.r4xxx;
            result_codes_60s.r5xxx += b60.r5xxx;
            result_codes_300s.r1xxx += b300.r1xxx;
            result_codes_300s.r2xxx += b300.r2xxx;
            result_codes_300s.r3xxx += b300.r3xxx;
            result_codes_300s.r4xxx += b300.r4xxx;
            result_codes_300s.r5xxx += b300.r5xxx;
            result_codes_900s.r1xxx += b900.r1xxx;
            result_codes_900s.r2xxx += b900.r2xxx;
            result_codes_900s.r3xxx += b900.r3xxx;
            result_codes_900s.r4xxx += b900.r4xxx;
            result_codes_900s.r5xxx += b900.r5xxx;
        }

        StatisticsSnapshot {
            taken_at: now,
            per_type_average_response_time,
            overall_average_response_time,
            result_codes_60s,
            result_codes_300s,
            result_codes_900s,
        }
    }

    pub fn push_snapshot(&self, snapshot: StatisticsSnapshot) {
        let mut history = self.history.lock().unwrap();
        if history.len() == HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(snapshot);
    }

    pub fn history(&self) -> Vec<StatisticsSnapshot> {
        self.history.lock().unwrap().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_and_rate_per_type() {
        let stats = PeerStatistics::new();
        stats.record_request("CCR", Duration::from_millis(100));
        stats.record_request("CCR", Duration::from_millis(300));
        stats.record_request("CER", Duration::from_millis(10));

        assert_eq!(
            stats.average_response_time("CCR"),
            Some(Duration::from_millis(200))
        );
        let rate = stats.rate("CCR").unwrap();
        assert!((rate - (2.0 / 0.4)).abs() < 1e-6);
    }

    #[test]
    fn test_ring_buffer_caps_at_capacity() {
        let stats = PeerStatistics::new();
        for _ in 0..(SAMPLE_CAPACITY + 10) {
            stats.record_request("CCR", Duration::from_millis(1));
        }
        assert_eq!(stats.samples.lock().unwrap().len(), SAMPLE_CAPACITY);
    }

    #[test]
    fn test_result_code_bucketing() {
        let stats = PeerStatistics::new();
        stats.record_result(2001);
        stats.record_result(3007);
        stats.record_result(3010);
        stats.record_result(5012);

        let buckets = stats.result_code_buckets(WINDOW_LONG);
        assert_eq!(buckets.r2xxx, 1);
        assert_eq!(buckets.r3xxx, 2);
        assert_eq!(buckets.r5xxx, 1);
        assert_eq!(buckets.r1xxx, 0);
    }

    #[test]
    fn test_node_aggregate_sums_across_peers() {
        let a = PeerStatistics::new();
        let b = PeerStatistics::new();
        a.record_request("CCR", Duration::from_millis(100));
        b.record_request("CCR", Duration::from_millis(300));
        a.record_result(2001);
        b.record_result(2001);
        b.record_result(4002);

        let node_stats = NodeStatistics::new();
        let snapshot = node_stats.aggregate(vec![&a, &b].into_iter(), SystemTime::now());
        assert_eq!(snapshot.result_codes_60s.r2xxx, 2);
        assert_eq!(snapshot.result_codes_60s.r4xxx, 1);
        assert!(snapshot.overall_average_response_time.is_some());
    }

    #[test]
    fn test_history_caps_and_preserves_order() {
        let node_stats = NodeStatistics::new();
        for i in 0..3 {
            node_stats.push_snapshot(StatisticsSnapshot {
                taken_at: SystemTime::now(),
                per_type_average_response_time: HashMap::new(),
                overall_average_response_time: None,
                result_codes_60s: ResultCodeBuckets {
                    r2xxx: i,
                    ..Default::default()
                },
                result_codes_300s: ResultCodeBuckets::default(),
                result_codes_900s: ResultCodeBuckets::default(),
            });
        }
        let history = node_stats.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].result_codes_60s.r2xxx, 0);
        assert_eq!(history[2].result_codes_60s.r2xxx, 2);
    }
}
