use crate::config::BlockingConfig;

/// Detects anti-bot challenge pages by case-insensitive body markers
#[derive(Debug, Clone)]
pub struct BlockDetector {
    markers: Vec<String>,
}

impl BlockDetector {
    pub fn new<S: AsRef<str>>(markers: &[S]) -> Self {
        Self {
            markers: markers
                .iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &BlockingConfig) -> Self {
        Self::new(&config.markers)
    }

    /// Returns the first marker found in the body, if any
    pub fn detect(&self, body: &str) -> Option<&str> {
        if self.markers.is_empty() {
            return None;
        }
        let lowered = body.to_lowercase();
        self.markers
            .iter()
            .find(|marker| lowered.contains(marker.as_str()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_marker_case_insensitively() {
        let detector = BlockDetector::new(&["captcha", "Are you a robot"]);
        assert_eq!(
            detector.detect("<div id=\"CAPTCHA-box\">Verify</div>"),
            Some("captcha")
        );
        assert_eq!(
            detector.detect("<h1>ARE YOU A ROBOT?</h1>"),
            Some("are you a robot")
        );
    }

    #[test]
    fn test_clean_page_passes() {
        let detector = BlockDetector::from_config(&BlockingConfig::default());
        assert_eq!(
            detector.detect("<html><body><h1>Trilocale in affitto</h1></body></html>"),
            None
        );
    }

    #[test]
    fn test_empty_markers_never_block() {
        let detector = BlockDetector::new::<&str>(&[]);
        assert_eq!(detector.detect("captcha"), None);
    }
}
