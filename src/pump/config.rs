//! Pump configuration

/// Pump configuration options
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// Maximum bytes requested from the source per read
    pub chunk_size: usize,

    /// Queued bytes at which the sink reports itself full
    pub high_water_mark: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,      // 64KB
            high_water_mark: 64 * 1024, // 64KB
        }
    }
}

impl PumpConfig {
    /// Set the read chunk size (at least 1 byte)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the sink high-water mark (at least 1 byte)
    pub fn high_water_mark(mut self, size: usize) -> Self {
        self.high_water_mark = size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PumpConfig::default();

        assert_eq!(config.chunk_size, 65536);
        assert_eq!(config.high_water_mark, 65536);
    }

    #[test]
    fn test_builder_clamps_zero() {
        let config = PumpConfig::default().chunk_size(0).high_water_mark(0);

        assert_eq!(config.chunk_size, 1);
        assert_eq!(config.high_water_mark, 1);
    }
}
