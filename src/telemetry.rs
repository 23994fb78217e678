//! OpenTelemetry instruments for the background flush and mirror jobs.

use std::sync::OnceLock;
use std::time::Duration;

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

static FLUSH_METRICS: OnceLock<FlushMetrics> = OnceLock::new();
static MIRROR_METRICS: OnceLock<MirrorMetrics> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Success,
    Skipped,
    Error,
}

impl CycleOutcome {
    fn as_str(self) -> &'static str {
        match self {
            CycleOutcome::Success => "success",
            CycleOutcome::Skipped => "skipped",
            CycleOutcome::Error => "error",
        }
    }
}

#[derive(Clone)]
pub struct FlushMetrics {
    cycle_duration_ms: Histogram<f64>,
    cycle_total: Counter<u64>,
    flushed_buckets: Histogram<u64>,
}

impl FlushMetrics {
    const METER_NAME: &'static str = "signing-telemetry.flush";

    fn new(meter: Meter) -> Self {
        let cycle_duration_ms = meter
            .f64_histogram("signing_telemetry.flush.cycle_duration_ms")
            .with_description("Duration of signing rate flush cycles in milliseconds")
            .with_unit("ms")
            .build();
        let cycle_total = meter
            .u64_counter("signing_telemetry.flush.cycle_total")
            .with_description("Total number of flush cycles grouped by outcome")
            .with_unit("1")
            .build();
        let flushed_buckets = meter
            .u64_histogram("signing_telemetry.flush.buckets")
            .with_description("Number of buckets persisted per successful flush cycle")
            .with_unit("1")
            .build();

        Self {
            cycle_duration_ms,
            cycle_total,
            flushed_buckets,
        }
    }

    pub fn global() -> &'static Self {
        FLUSH_METRICS.get_or_init(|| Self::new(global::meter(Self::METER_NAME)))
    }

    pub fn record_cycle(&self, outcome: CycleOutcome, duration: Duration, flushed: Option<u64>) {
        let attrs = [KeyValue::new("outcome", outcome.as_str())];
        self.cycle_duration_ms
            .record(duration.as_secs_f64() * 1_000.0, &attrs);
        self.cycle_total.add(1, &attrs);
        if let Some(buckets) = flushed {
            self.flushed_buckets.record(buckets, &[]);
        }
    }
}

#[derive(Clone)]
pub struct MirrorMetrics {
    cycle_duration_ms: Histogram<f64>,
    cycle_total: Counter<u64>,
    scraped_buckets: Histogram<u64>,
}

impl MirrorMetrics {
    const METER_NAME: &'static str = "signing-telemetry.mirror";

    fn new(meter: Meter) -> Self {
        let cycle_duration_ms = meter
            .f64_histogram("signing_telemetry.mirror.cycle_duration_ms")
            .with_description("Duration of mirror scrape cycles in milliseconds")
            .with_unit("ms")
            .build();
        let cycle_total = meter
            .u64_counter("signing_telemetry.mirror.cycle_total")
            .with_description("Total number of mirror cycles grouped by outcome")
            .with_unit("1")
            .build();
        let scraped_buckets = meter
            .u64_histogram("signing_telemetry.mirror.buckets")
            .with_description("Number of buckets replayed per successful mirror cycle")
            .with_unit("1")
            .build();

        Self {
            cycle_duration_ms,
            cycle_total,
            scraped_buckets,
        }
    }

    pub fn global() -> &'static Self {
        MIRROR_METRICS.get_or_init(|| Self::new(global::meter(Self::METER_NAME)))
    }

    pub fn record_cycle(&self, outcome: CycleOutcome, duration: Duration, scraped: Option<u64>) {
        let attrs = [KeyValue::new("outcome", outcome.as_str())];
        self.cycle_duration_ms
            .record(duration.as_secs_f64() * 1_000.0, &attrs);
        self.cycle_total.add(1, &attrs);
        if let Some(buckets) = scraped {
            self.scraped_buckets.record(buckets, &[]);
        }
    }
}
