//! Configuration types for mirrorsync
//!
//! Validated newtypes shared by the config loader and the engine.

/// Number of concurrent workers per task category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerCount(usize);

impl WorkerCount {
    /// Minimum worker count
    pub const MIN: usize = 1;
    /// Maximum worker count
    pub const MAX: usize = 256;
    /// Default worker count
    pub const DEFAULT: usize = 4;

    /// Create a new worker count with validation
    pub fn new(count: usize) -> Result<Self, String> {
        if count < Self::MIN {
            Err(format!("Worker count {} is below minimum {}", count, Self::MIN))
        } else if count > Self::MAX {
            Err(format!("Worker count {} exceeds maximum {}", count, Self::MAX))
        } else {
            Ok(Self(count))
        }
    }

    /// Get the worker count value
    pub fn get(self) -> usize {
        self.0
    }

    /// Check a deserialized value, which bypasses [`WorkerCount::new`]
    pub fn validate(self) -> Result<Self, String> {
        Self::new(self.0)
    }
}

impl Default for WorkerCount {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, true)]
    #[case(4, true)]
    #[case(256, true)]
    #[case(0, false)]
    #[case(257, false)]
    fn test_worker_count_bounds(#[case] count: usize, #[case] valid: bool) {
        assert_eq!(WorkerCount::new(count).is_ok(), valid);
    }

    #[test]
    fn test_worker_count_default() {
        assert_eq!(WorkerCount::default().get(), 4);
    }
}
