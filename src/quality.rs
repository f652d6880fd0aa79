//! Picking one video variant per class.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::course::Recording;

static RESOLUTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{3,4})\s*[pP]?").unwrap());

/// What to do when none of the preferred labels is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    #[default]
    Highest,
    Lowest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityPreference {
    /// Labels in order of preference, e.g. `["720p", "480p"]`.
    pub preferred: Vec<String>,
    pub fallback: Fallback,
}

impl Default for QualityPreference {
    fn default() -> Self {
        Self {
            preferred: vec!["720p".into(), "480p".into(), "360p".into()],
            fallback: Fallback::Highest,
        }
    }
}

impl QualityPreference {
    /// Select exactly one recording, or `None` if there are none.
    pub fn select<'a>(&self, recordings: &'a [Recording]) -> Option<&'a Recording> {
        for wanted in &self.preferred {
            let wanted = normalize(wanted);
            if let Some(hit) = recordings.iter().find(|r| normalize(&r.quality) == wanted) {
                return Some(hit);
            }
        }

        // Ties keep the earlier recording.
        let mut best: Option<(&Recording, Option<u32>)> = None;
        for rec in recordings {
            let res = resolution(&rec.quality);
            let better = match best {
                None => true,
                Some((_, current)) => match self.fallback {
                    Fallback::Highest => res > current,
                    Fallback::Lowest => match (res, current) {
                        (Some(a), Some(b)) => a < b,
                        (Some(_), None) => true,
                        _ => false,
                    },
                },
            };
            if better {
                best = Some((rec, res));
            }
        }
        best.map(|(rec, _)| rec)
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Vertical resolution in a label such as `720p`, `HD 1080p` or `480`.
pub fn resolution(label: &str) -> Option<u32> {
    RESOLUTION
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(quality: &str, url: &str) -> Recording {
        Recording {
            quality: quality.to_string(),
            size: None,
            url: url.to_string(),
        }
    }

    #[test]
    fn test_resolution_parsing() {
        assert_eq!(resolution("720p"), Some(720));
        assert_eq!(resolution("HD 1080p"), Some(1080));
        assert_eq!(resolution("480"), Some(480));
        assert_eq!(resolution("Unknown"), None);
        assert_eq!(resolution("hd"), None);
    }

    #[test]
    fn test_first_preferred_label_wins() {
        let recs = [rec("360p", "a"), rec("480p", "b"), rec("720p", "c")];
        let pref = QualityPreference::default();
        assert_eq!(pref.select(&recs).unwrap().url, "c");
    }

    #[test]
    fn test_preference_is_case_and_space_insensitive() {
        let recs = [rec(" 480P ", "b"), rec("1080p", "d")];
        let pref = QualityPreference {
            preferred: vec!["480p".into()],
            fallback: Fallback::Highest,
        };
        assert_eq!(pref.select(&recs).unwrap().url, "b");
    }

    #[test]
    fn test_duplicate_labels_pick_first() {
        let recs = [rec("720p", "first"), rec("720p", "second")];
        let pref = QualityPreference::default();
        assert_eq!(pref.select(&recs).unwrap().url, "first");
    }

    #[test]
    fn test_fallback_highest() {
        let recs = [rec("Unknown", "u"), rec("240p", "a"), rec("1080p", "d"), rec("1080p", "e")];
        let pref = QualityPreference::default();
        assert_eq!(pref.select(&recs).unwrap().url, "d");
    }

    #[test]
    fn test_fallback_lowest_ignores_unparsable() {
        let recs = [rec("Unknown", "u"), rec("1080p", "d"), rec("240p", "a")];
        let pref = QualityPreference {
            preferred: Vec::new(),
            fallback: Fallback::Lowest,
        };
        assert_eq!(pref.select(&recs).unwrap().url, "a");
    }

    #[test]
    fn test_unparsable_only_picks_first() {
        let recs = [rec("SD", "x"), rec("HD", "y")];
        let pref = QualityPreference::default();
        assert_eq!(pref.select(&recs).unwrap().url, "x");
    }

    #[test]
    fn test_empty_selects_nothing() {
        assert!(QualityPreference::default().select(&[]).is_none());
    }
}
