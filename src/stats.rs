//! Optional link statistics, kept for diagnostics only — nothing in the
//! protocol's correctness depends on these counters.

/// Running counters a [`crate::stream::StreamChannel`] can track when
/// constructed with `collect_stats: true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub rx_timeouts: u32,
    pub tx_timeouts: u32,
    pub rx_all: u32,
    pub rx_data: u32,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }

    pub fn record_rx_timeout(&mut self) {
        self.rx_timeouts = self.rx_timeouts.saturating_add(1);
    }

    pub fn record_tx_timeout(&mut self) {
        self.tx_timeouts = self.tx_timeouts.saturating_add(1);
    }

    pub fn record_rx(&mut self, data_bytes: usize) {
        self.rx_all = self.rx_all.saturating_add(1);
        if data_bytes > 0 {
            self.rx_data = self.rx_data.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = Stats::new();
        assert_eq!(stats.rx_timeouts, 0);
        assert_eq!(stats.tx_timeouts, 0);
        assert_eq!(stats.rx_all, 0);
        assert_eq!(stats.rx_data, 0);
    }

    #[test]
    fn record_rx_only_counts_data_when_nonempty() {
        let mut stats = Stats::new();
        stats.record_rx(0);
        stats.record_rx(5);
        assert_eq!(stats.rx_all, 2);
        assert_eq!(stats.rx_data, 1);
    }
}
