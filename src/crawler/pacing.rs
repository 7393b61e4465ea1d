use crate::config::PolitenessConfig;
use crate::crawler::task::TaskKind;
use std::time::Duration;

/// Draws the mandatory politeness delay before a fetch
#[derive(Debug, Clone)]
pub struct Pacer {
    listing_ms: [u64; 2],
    detail_ms: [u64; 2],
}

impl Pacer {
    pub fn from_config(config: &PolitenessConfig) -> Self {
        Self {
            listing_ms: config.listing_delay_ms,
            detail_ms: config.detail_delay_ms,
        }
    }

    /// Minimum delay for the transition into a task of this kind
    pub fn min_delay(&self, kind: &TaskKind) -> Duration {
        match kind {
            TaskKind::ListingPage { .. } => Duration::from_millis(self.listing_ms[0]),
            TaskKind::DetailPage { .. } => Duration::from_millis(self.detail_ms[0]),
            TaskKind::Done => Duration::ZERO,
        }
    }

    /// Uniform draw from the range configured for the next task's kind
    pub fn delay_before(&self, kind: &TaskKind) -> Duration {
        let [min, max] = match kind {
            TaskKind::ListingPage { .. } => self.listing_ms,
            TaskKind::DetailPage { .. } => self.detail_ms,
            TaskKind::Done => return Duration::ZERO,
        };
        if min >= max {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::random_range(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::Listing;

    fn pacer() -> Pacer {
        Pacer::from_config(&PolitenessConfig {
            listing_delay_ms: [2000, 5000],
            detail_delay_ms: [1000, 3000],
        })
    }

    fn detail_kind() -> TaskKind {
        TaskKind::DetailPage {
            listing: Box::new(
                Listing::preview("https://www.immobiliare.it/annunci/1/", "seed").unwrap(),
            ),
        }
    }

    #[test]
    fn test_listing_delay_in_range() {
        let pacer = pacer();
        for _ in 0..100 {
            let delay = pacer.delay_before(&TaskKind::ListingPage { page: 2 });
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(5000));
        }
    }

    #[test]
    fn test_detail_delay_in_range() {
        let pacer = pacer();
        let kind = detail_kind();
        for _ in 0..100 {
            let delay = pacer.delay_before(&kind);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(3000));
        }
        assert_eq!(pacer.min_delay(&kind), Duration::from_millis(1000));
    }

    #[test]
    fn test_degenerate_range() {
        let pacer = Pacer::from_config(&PolitenessConfig {
            listing_delay_ms: [50, 50],
            detail_delay_ms: [0, 0],
        });
        assert_eq!(
            pacer.delay_before(&TaskKind::ListingPage { page: 1 }),
            Duration::from_millis(50)
        );
        assert_eq!(pacer.delay_before(&detail_kind()), Duration::ZERO);
    }

    #[test]
    fn test_done_has_no_delay() {
        assert_eq!(pacer().delay_before(&TaskKind::Done), Duration::ZERO);
    }
}
