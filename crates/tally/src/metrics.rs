use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Coordinator-level prometheus metrics.
pub struct CountingMetrics {
    /// Counts accepted across all guilds.
    pub accepted: IntCounter,
    /// Counts rejected (sequence breaks) across all guilds.
    pub rejected: IntCounter,
    /// Messages that did not participate (no token, wrong channel, no
    /// configured channel).
    pub ignored: IntCounter,
    /// Guild lease acquisitions that timed out.
    pub lock_timeouts: IntCounter,
    /// Guilds with an event lease in this process.
    pub guilds: IntGauge,
}

impl CountingMetrics {
    /// Create metrics and register them with the given prometheus registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let accepted = IntCounter::with_opts(Opts::new(
            "counting_accepted_total",
            "Counts accepted across all guilds",
        ))?;
        let rejected = IntCounter::with_opts(Opts::new(
            "counting_rejected_total",
            "Counts rejected (sequence breaks) across all guilds",
        ))?;
        let ignored = IntCounter::with_opts(Opts::new(
            "counting_ignored_total",
            "Messages that did not participate in the game",
        ))?;
        let lock_timeouts = IntCounter::with_opts(Opts::new(
            "counting_lock_timeouts_total",
            "Guild lease acquisitions that timed out",
        ))?;
        let guilds = IntGauge::with_opts(Opts::new(
            "counting_guilds",
            "Guilds with an event lease in this process",
        ))?;

        registry.register(Box::new(accepted.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(ignored.clone()))?;
        registry.register(Box::new(lock_timeouts.clone()))?;
        registry.register(Box::new(guilds.clone()))?;

        Ok(Self {
            accepted,
            rejected,
            ignored,
            lock_timeouts,
            guilds,
        })
    }

    /// Create metrics without registering (for testing).
    pub fn unregistered() -> Self {
        Self {
            accepted: IntCounter::new("counting_accepted_total", "accepted")
                .expect("valid metric name"),
            rejected: IntCounter::new("counting_rejected_total", "rejected")
                .expect("valid metric name"),
            ignored: IntCounter::new("counting_ignored_total", "ignored")
                .expect("valid metric name"),
            lock_timeouts: IntCounter::new("counting_lock_timeouts_total", "lock timeouts")
                .expect("valid metric name"),
            guilds: IntGauge::new("counting_guilds", "guilds").expect("valid metric name"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_metrics_work() {
        let m = CountingMetrics::unregistered();
        m.accepted.inc();
        m.accepted.inc();
        assert_eq!(m.accepted.get(), 2);
        m.guilds.set(3);
        assert_eq!(m.guilds.get(), 3);
    }

    #[test]
    fn registered_metrics_work() {
        let registry = Registry::new();
        let m = CountingMetrics::new(&registry).unwrap();
        m.rejected.inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "counting_rejected_total"));
    }
}
