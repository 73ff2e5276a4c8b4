//! Named expiry tiers.

use std::time::Duration;

/// How long a cached value stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Five minutes. Volatile listings such as top charts.
    Short,
    /// Thirty minutes. Search results.
    Medium,
    /// Two hours. Genre and category listings.
    Long,
    /// One day. Parsed feed episode lists.
    Persistent,
    /// Any other lifetime.
    Custom(Duration),
}

impl CacheTtl {
    pub fn as_secs(&self) -> u64 {
        match self {
            CacheTtl::Short => 300,
            CacheTtl::Medium => 1800,
            CacheTtl::Long => 7200,
            CacheTtl::Persistent => 86_400,
            CacheTtl::Custom(duration) => duration.as_secs(),
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.as_secs())
    }
}

impl From<Duration> for CacheTtl {
    fn from(duration: Duration) -> Self {
        CacheTtl::Custom(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert_eq!(CacheTtl::Short.as_secs(), 300);
        assert_eq!(CacheTtl::Medium.as_secs(), 1800);
        assert_eq!(CacheTtl::Long.as_secs(), 7200);
        assert_eq!(CacheTtl::Persistent.as_duration(), Duration::from_secs(86_400));
    }

    #[test]
    fn custom_durations_truncate_to_seconds() {
        let ttl: CacheTtl = Duration::from_millis(1500).into();
        assert_eq!(ttl.as_secs(), 1);
    }
}
