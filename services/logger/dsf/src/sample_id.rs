//! Sample id extension.
//!
//! Sensor reports carry an 8-bit sequence number that wraps every 256
//! samples. [`SampleIdExtender::extend`] rebuilds a 64-bit id by counting
//! wraps: any decrease of the raw value is taken as exactly one wrap. Losing
//! more than 128 consecutive samples of one stream therefore corrupts the
//! reconstructed ids, and nothing at this layer can detect it.

/// Per-stream sample id state
#[derive(Debug, Clone, Default)]
pub struct SampleIdExtender {
    initialized: bool,
    high: u64,
    low: u8,
}

impl SampleIdExtender {
    /// Create an extender that has seen no samples
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend a raw 8-bit sequence number
    pub fn extend(&mut self, seq: u8) -> u64 {
        if self.initialized && seq < self.low {
            self.high += 1;
        }
        self.initialized = true;
        self.low = seq;
        (self.high << 8) | seq as u64
    }

    /// Next id for streams without their own counter, starting at 1
    pub fn increment(&mut self) -> u64 {
        self.initialized = true;
        self.high += 1;
        self.high
    }

    /// True until the first `extend` or `increment`
    pub fn is_empty(&self) -> bool {
        !self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_across_wrap() {
        let mut ext = SampleIdExtender::new();
        let raw = (0..=255u8).chain([0, 1, 2]);
        let ids: Vec<u64> = raw.map(|s| ext.extend(s)).collect();

        let expected: Vec<u64> = (0..=258).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_extend_first_value_is_baseline() {
        let mut ext = SampleIdExtender::new();
        assert_eq!(ext.extend(200), 200);
        assert_eq!(ext.extend(201), 201);
        assert_eq!(ext.extend(3), 256 + 3);
    }

    #[test]
    fn test_extend_repeated_value_does_not_wrap() {
        let mut ext = SampleIdExtender::new();
        assert_eq!(ext.extend(10), 10);
        assert_eq!(ext.extend(10), 10);
    }

    #[test]
    fn test_extend_large_gap_miscounts() {
        // 300 lost samples look like a forward step of 44
        let mut ext = SampleIdExtender::new();
        ext.extend(0);
        assert_eq!(ext.extend((300 % 256) as u8), 44);
    }

    #[test]
    fn test_is_empty() {
        let mut ext = SampleIdExtender::new();
        assert!(ext.is_empty());
        ext.extend(0);
        assert!(!ext.is_empty());

        let mut ext = SampleIdExtender::new();
        ext.increment();
        assert!(!ext.is_empty());
    }

    #[test]
    fn test_increment_sequence() {
        let mut ext = SampleIdExtender::new();
        let ids: Vec<u64> = (0..5).map(|_| ext.increment()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }
}
