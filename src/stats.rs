/// Assembly statistics tracking and reporting
use log::info;

/// Counters for one assembly run. The engine is single-threaded, so plain
/// integers suffice.
#[derive(Debug, Default)]
pub struct AssemblyStats {
    /// Hits accepted from the input stream
    pub hits: u64,
    /// Bundles processed
    pub bundles: u64,
    /// Retained junctions across all bundles
    pub junctions: u64,
    /// Transcripts written
    pub transcripts: u64,
    /// Router balancing failures (vertices left unbalanced)
    pub solver_failures: u64,
    /// Bundles whose iteration hit the watchdog cap
    pub watchdog_trips: u64,
}

impl AssemblyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print summary statistics to log
    pub fn print_summary(&self) {
        info!("=== Assembly Summary ===");
        info!("Input hits: {}", self.hits);
        info!("Bundles: {}", self.bundles);
        info!("Junctions: {}", self.junctions);
        info!("Transcripts: {}", self.transcripts);
        if self.solver_failures > 0 {
            info!("Unbalanced vertices: {}", self.solver_failures);
        }
        if self.watchdog_trips > 0 {
            info!("Greedy fallbacks: {}", self.watchdog_trips);
        }
    }

    /// Average transcripts per bundle
    pub fn transcripts_per_bundle(&self) -> f64 {
        if self.bundles == 0 {
            0.0
        } else {
            self.transcripts as f64 / self.bundles as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default() {
        let stats = AssemblyStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.bundles, 0);
        assert_eq!(stats.transcripts, 0);
        assert_eq!(stats.transcripts_per_bundle(), 0.0);
    }

    #[test]
    fn test_transcripts_per_bundle() {
        let mut stats = AssemblyStats::new();
        stats.bundles = 4;
        stats.transcripts = 10;
        assert!((stats.transcripts_per_bundle() - 2.5).abs() < 1e-9);
    }
}
