//! Now-playing surface for desktop hosts without a system media session.

use bridge_traits::{
    error::Result,
    playback::{NowPlayingCenter, NowPlayingInfo},
};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Records the latest now-playing metadata and mirrors changes to `tracing`.
///
/// Desktop shells that integrate with MPRIS or SMTC can poll
/// [`current`](Self::current) instead of implementing the trait themselves.
#[derive(Debug, Default)]
pub struct TracingNowPlayingCenter {
    current: Mutex<Option<NowPlayingInfo>>,
}

impl TracingNowPlayingCenter {
    /// Create a new now-playing center.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published metadata, if any.
    pub fn current(&self) -> Option<NowPlayingInfo> {
        self.current.lock().clone()
    }
}

impl NowPlayingCenter for TracingNowPlayingCenter {
    fn publish(&self, info: NowPlayingInfo) -> Result<()> {
        let mut current = self.current.lock();
        let title_changed = current.as_ref().map(|c| c.title != info.title).unwrap_or(true);

        if title_changed {
            info!(title = %info.title, artist = %info.artist, "Now playing");
        } else {
            debug!(
                elapsed = info.elapsed,
                duration = info.duration,
                rate = info.rate,
                "Now playing updated"
            );
        }

        *current = Some(info);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.current.lock().take().is_some() {
            debug!("Now playing cleared");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(title: &str, elapsed: f64, rate: f64) -> NowPlayingInfo {
        NowPlayingInfo {
            title: title.to_string(),
            artist: "Hardcore History".to_string(),
            duration: 600.0,
            elapsed,
            rate,
        }
    }

    #[test]
    fn keeps_latest_published_info() {
        let center = TracingNowPlayingCenter::new();
        assert!(center.current().is_none());

        center.publish(info("Episode 1", 0.0, 0.0)).unwrap();
        center.publish(info("Episode 1", 12.5, 1.0)).unwrap();

        let current = center.current().unwrap();
        assert_eq!(current.elapsed, 12.5);
        assert_eq!(current.rate, 1.0);
    }

    #[test]
    fn clear_forgets_info() {
        let center = TracingNowPlayingCenter::new();
        center.publish(info("Episode 1", 0.0, 0.0)).unwrap();
        center.clear().unwrap();
        assert!(center.current().is_none());
    }
}
