//! Caption track selection by UI locale.
//!
//! Matching is on the primary language subtag only: a `en-US` locale matches
//! `en`, `en-GB` and `en-US` tracks alike. Tracks whose language does not
//! share the primary subtag are treated as unavailable.

/// One selectable caption track, as reported by a playback engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    /// BCP 47 language tag, e.g. `en` or `pt-BR`.
    pub language: String,
    /// Human-readable label, when the container carries one.
    pub title: Option<String>,
}

impl CaptionTrack {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            title: None,
        }
    }
}

/// The current UI locale, falling back to `en` when the system does not
/// report one.
pub fn current_locale() -> String {
    sys_locale::get_locale().unwrap_or_else(|| "en".to_string())
}

/// Primary language subtag of a locale identifier (`en-US` -> `en`).
/// Accepts both `-` and `_` separators.
pub fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Tracks whose primary subtag matches the locale's, in source order.
pub fn locale_matched<'a>(tracks: &'a [CaptionTrack], locale: &str) -> Vec<&'a CaptionTrack> {
    let wanted = primary_subtag(locale);
    tracks
        .iter()
        .filter(|t| primary_subtag(&t.language).eq_ignore_ascii_case(wanted))
        .collect()
}

/// First locale-matched track, the one selected when captions are enabled.
pub fn preferred<'a>(tracks: &'a [CaptionTrack], locale: &str) -> Option<&'a CaptionTrack> {
    locale_matched(tracks, locale).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks() -> Vec<CaptionTrack> {
        vec![
            CaptionTrack::new("de"),
            CaptionTrack::new("en-GB"),
            CaptionTrack::new("en"),
            CaptionTrack::new("pt-BR"),
        ]
    }

    #[test]
    fn primary_subtag_splits_both_separators() {
        assert_eq!(primary_subtag("en-US"), "en");
        assert_eq!(primary_subtag("en_US"), "en");
        assert_eq!(primary_subtag("en"), "en");
    }

    #[test]
    fn matching_ignores_region_and_case() {
        let tracks = tracks();
        let matched = locale_matched(&tracks, "EN-us");
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].language, "en-GB");
    }

    #[test]
    fn preferred_is_first_match_in_source_order() {
        let tracks = tracks();
        assert_eq!(preferred(&tracks, "pt-PT").unwrap().language, "pt-BR");
        assert!(preferred(&tracks, "fr").is_none());
    }

    #[test]
    fn no_tracks_means_no_preference() {
        assert!(preferred(&[], "en").is_none());
    }
}
