/// Running metric meters and periodic progress logging
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

/// Tracks a window of recent values and a count-weighted global series
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    window: VecDeque<f64>,
    window_size: usize,
    total: f64,
    count: usize,
}

impl SmoothedValue {
    /// Create a meter that smooths over the last `window_size` updates
    pub fn new(window_size: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
            total: 0.0,
            count: 0,
        }
    }

    /// Record `value` observed over `n` samples
    pub fn update(&mut self, value: f64, n: usize) {
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(value);
        self.count += n;
        self.total += value * n as f64;
    }

    /// Median of the window
    pub fn median(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.window.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        // lower median for even-sized windows
        sorted[(sorted.len() - 1) / 2]
    }

    /// Mean of the window
    pub fn avg(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    /// Count-weighted mean over every update
    pub fn global_avg(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total / self.count as f64
    }

    /// Max of the window
    pub fn max(&self) -> f64 {
        self.window.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Most recent value
    pub fn value(&self) -> f64 {
        self.window.back().copied().unwrap_or(0.0)
    }

    /// Number of samples recorded
    pub fn count(&self) -> usize {
        self.count
    }
}

impl fmt::Display for SmoothedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} ({:.4})", self.median(), self.global_avg())
    }
}

/// Global averages of every meter at the end of an epoch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpochStats {
    values: BTreeMap<String, f64>,
}

impl EpochStats {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for EpochStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(name, value)| format!("{}: {:.4}", name, value))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Named meters plus iteration timing for one pass over a data loader
pub struct MetricLogger {
    meters: BTreeMap<String, SmoothedValue>,
    delimiter: String,
    window_size: usize,
    start: Instant,
    last_tick: Instant,
    data_ready: Option<Instant>,
    iter_time: SmoothedValue,
    data_time: SmoothedValue,
}

impl MetricLogger {
    pub fn new(delimiter: impl Into<String>, window_size: usize) -> Self {
        let now = Instant::now();
        Self {
            meters: BTreeMap::new(),
            delimiter: delimiter.into(),
            window_size,
            start: now,
            last_tick: now,
            data_ready: None,
            iter_time: SmoothedValue::new(window_size),
            data_time: SmoothedValue::new(window_size),
        }
    }

    /// Get a meter, creating it on first use
    pub fn meter(&mut self, name: &str) -> &mut SmoothedValue {
        let window_size = self.window_size;
        self.meters
            .entry(name.to_string())
            .or_insert_with(|| SmoothedValue::new(window_size))
    }

    /// Record a per-batch value with weight 1
    pub fn update(&mut self, name: &str, value: f64) {
        self.update_n(name, value, 1);
    }

    /// Record a value observed over `n` samples
    pub fn update_n(&mut self, name: &str, value: f64, n: usize) {
        self.meter(name).update(value, n);
    }

    pub fn get(&self, name: &str) -> Option<&SmoothedValue> {
        self.meters.get(name)
    }

    /// Global average of every meter
    pub fn global_averages(&self) -> EpochStats {
        EpochStats {
            values: self
                .meters
                .iter()
                .map(|(name, meter)| (name.clone(), meter.global_avg()))
                .collect(),
        }
    }

    /// Mark that the current batch has been loaded
    pub fn data_loaded(&mut self) {
        self.data_ready = Some(Instant::now());
    }

    /// Close out batch `i` of `total`, logging every `print_freq` batches
    /// and on the last one.
    pub fn step(&mut self, header: &str, i: usize, total: usize, print_freq: usize) {
        let now = Instant::now();
        let data_secs = self
            .data_ready
            .take()
            .map_or(0.0, |ready| ready.duration_since(self.last_tick).as_secs_f64());
        self.data_time.update(data_secs, 1);
        self.iter_time.update(now.duration_since(self.last_tick).as_secs_f64(), 1);
        self.last_tick = now;

        if should_log(i, total, print_freq) {
            let remaining = total.saturating_sub(i + 1) as f64;
            let eta = Duration::from_secs_f64(self.iter_time.global_avg() * remaining);
            let width = total.to_string().len();
            log::info!(
                "{} [{:>width$}/{}]{}eta: {}{}{}{}time: {:.4}{}data: {:.4}",
                header,
                i,
                total,
                self.delimiter,
                format_duration(eta),
                self.delimiter,
                self,
                self.delimiter,
                self.iter_time.avg(),
                self.delimiter,
                self.data_time.avg(),
                width = width,
            );
        }
    }

    /// Log the total time spent in this pass
    pub fn finish(&self, header: &str, total: usize) {
        let elapsed = self.start.elapsed();
        log::info!(
            "{} Total time: {} ({:.4} s / it)",
            header,
            format_duration(elapsed),
            elapsed.as_secs_f64() / total.max(1) as f64
        );
    }
}

impl fmt::Display for MetricLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .meters
            .iter()
            .map(|(name, meter)| format!("{}: {}", name, meter))
            .collect();
        write!(f, "{}", parts.join(&self.delimiter))
    }
}

/// Progress lines go out every `print_freq` batches and on the last one
pub fn should_log(i: usize, total: usize, print_freq: usize) -> bool {
    i % print_freq.max(1) == 0 || i + 1 == total
}

/// `H:MM:SS`
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
