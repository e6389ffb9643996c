//! Fixed-size ring buffers over multiple time windows, used to turn a
//! stream of per-tick deltas (e.g. files processed since the last sample)
//! into short/medium/long rate estimates for the interim statistics
//! printout.

use std::collections::VecDeque;
use std::time::Duration;

struct Window {
    size: Duration,
    capacity: usize,
    samples: VecDeque<u64>,
    sum: u64,
}

impl Window {
    fn new(size: Duration, sample_interval: Duration) -> Self {
        let capacity = (size.as_secs_f64() / sample_interval.as_secs_f64())
            .round()
            .max(1.0) as usize;
        Self {
            size,
            capacity,
            samples: VecDeque::with_capacity(capacity),
            sum: 0,
        }
    }

    fn add_sample(&mut self, delta: u64) {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
        self.samples.push_back(delta);
        self.sum += delta;
    }
}

/// Tracks one running sum per configured window size. Every call to
/// [`add_sample`](SlidingWindowStats::add_sample) is assumed to represent
/// one `sample_interval` tick; windows narrower than one tick degrade to a
/// single-sample capacity.
pub struct SlidingWindowStats {
    sample_interval: Duration,
    windows: Vec<Window>,
}

impl SlidingWindowStats {
    pub fn new(buckets: &[Duration], sample_interval: Duration) -> Self {
        Self {
            sample_interval,
            windows: buckets
                .iter()
                .map(|&size| Window::new(size, sample_interval))
                .collect(),
        }
    }

    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    /// Records one observation for the tick that just elapsed, across every
    /// configured window.
    pub fn add_sample(&mut self, delta: u64) {
        for window in &mut self.windows {
            window.add_sample(delta);
        }
    }

    /// Sum over the trailing `size / sample_interval` samples, one entry
    /// per configured window, in the order `buckets` was given.
    pub fn get_all_windows(&self) -> Vec<u64> {
        self.windows.iter().map(|w| w.sum).collect()
    }

    pub fn get_window_sizes(&self) -> Vec<Duration> {
        self.windows.iter().map(|w| w.size).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_within_capacity() {
        let mut stats =
            SlidingWindowStats::new(&[Duration::from_secs(3)], Duration::from_secs(1));
        stats.add_sample(10);
        stats.add_sample(20);
        stats.add_sample(30);
        assert_eq!(stats.get_all_windows(), vec![60]);
    }

    #[test]
    fn drops_oldest_sample_past_capacity() {
        let mut stats =
            SlidingWindowStats::new(&[Duration::from_secs(2)], Duration::from_secs(1));
        stats.add_sample(10);
        stats.add_sample(20);
        stats.add_sample(30);
        // capacity 2: window now holds [20, 30]
        assert_eq!(stats.get_all_windows(), vec![50]);
    }

    #[test]
    fn independent_windows_track_separately() {
        let mut stats = SlidingWindowStats::new(
            &[Duration::from_secs(1), Duration::from_secs(3)],
            Duration::from_secs(1),
        );
        for sample in [5, 5, 5, 5] {
            stats.add_sample(sample);
        }
        let sums = stats.get_all_windows();
        assert_eq!(sums[0], 5);
        assert_eq!(sums[1], 15);
    }

    #[test]
    fn window_sizes_preserve_order() {
        let buckets = vec![Duration::from_secs(60), Duration::from_secs(300)];
        let stats = SlidingWindowStats::new(&buckets, Duration::from_secs(1));
        assert_eq!(stats.get_window_sizes(), buckets);
    }
}
