// 🔢 Sequence Tracker
// One per output file. Starts at 1, never skips, never goes back.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceTracker {
    current: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        SequenceTracker { current: 1 }
    }

    /// Value the next rendered record will carry
    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn advance(&mut self) {
        self.current += 1;
    }

    /// Number of records already stamped
    pub fn issued(&self) -> u64 {
        self.current - 1
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_one_and_counts_up() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.current(), 1);
        assert_eq!(tracker.issued(), 0);

        tracker.advance();
        tracker.advance();

        assert_eq!(tracker.current(), 3);
        assert_eq!(tracker.issued(), 2);
    }
}
