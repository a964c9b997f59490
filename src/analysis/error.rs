use thiserror::Error;

use crate::config::Locale;

/// Reasons an analysis is rejected outright.
///
/// Everything else (unreadable fields, unknown difficulty) degrades to a
/// fallback value and never surfaces here.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    /// No catalog jacket is close enough to the screenshot's jacket.
    #[error("jacket not recognized (closest distance: {})", fmt_distance(.best_distance))]
    SongNotRecognized { best_distance: Option<u32> },

    /// Different songs are equally close to the screenshot's jacket.
    #[error("jacket matches several songs at distance {distance}: {}", .titles.join(", "))]
    AmbiguousSong { distance: u32, titles: Vec<String> },
}

fn fmt_distance(distance: &Option<u32>) -> String {
    match distance {
        Some(d) => d.to_string(),
        None => "empty catalog".to_string(),
    }
}

impl AnalysisError {
    /// User-facing message in the configured language.
    pub fn localized(&self, locale: Locale) -> String {
        match (self, locale) {
            (AnalysisError::SongNotRecognized { .. }, Locale::Ko) => {
                "노래 재킷 인식 실패. 인식할 수 없는 화면이거나 노래가 아직 DB에 등록되지 않았습니다."
                    .to_string()
            }
            (AnalysisError::SongNotRecognized { .. }, Locale::En) => {
                "Failed to recognize the song jacket. The screen is not supported or the song is not registered in the DB yet."
                    .to_string()
            }
            (AnalysisError::AmbiguousSong { titles, .. }, Locale::Ko) => {
                format!(
                    "노래 재킷 인식 실패. 여러 곡과 일치합니다: {}",
                    titles.join(", ")
                )
            }
            (AnalysisError::AmbiguousSong { titles, .. }, Locale::En) => {
                format!(
                    "Failed to recognize the song jacket. It matches several songs: {}",
                    titles.join(", ")
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localized_messages() {
        let err = AnalysisError::SongNotRecognized {
            best_distance: Some(12),
        };
        assert!(err.localized(Locale::Ko).starts_with("노래 재킷 인식 실패"));
        assert!(err.localized(Locale::En).contains("not registered"));
        assert_eq!(err.to_string(), "jacket not recognized (closest distance: 12)");
    }

    #[test]
    fn test_ambiguous_lists_titles() {
        let err = AnalysisError::AmbiguousSong {
            distance: 2,
            titles: vec!["Alpha".to_string(), "Beta".to_string()],
        };
        assert!(err.to_string().ends_with("Alpha, Beta"));
        assert!(err.localized(Locale::En).ends_with("Alpha, Beta"));
    }
}
