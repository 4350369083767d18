/// Turns free-text survey answers into interest keywords.
pub trait InterestExtractor: Send + Sync {
    fn interests(&self, survey_text: &str) -> Vec<String>;
}

const KEYWORD_INTERESTS: [(&str, &str); 4] = [
    ("sports", "exercise"),
    ("reading", "literature"),
    ("math", "problem solving"),
    ("art", "creativity"),
];

/// Case-insensitive substring match against a fixed keyword table.
#[derive(Debug, Clone, Default)]
pub struct KeywordInterestExtractor;

impl InterestExtractor for KeywordInterestExtractor {
    fn interests(&self, survey_text: &str) -> Vec<String> {
        let lowered = survey_text.to_lowercase();
        KEYWORD_INTERESTS
            .iter()
            .filter(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, interest)| interest.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_keywords_in_table_order() {
        let extracted = KeywordInterestExtractor.interests("I love ART, Reading and Sports");
        assert_eq!(extracted, vec!["exercise", "literature", "creativity"]);
    }

    #[test]
    fn no_match_yields_empty_list() {
        assert!(KeywordInterestExtractor.interests("music and chess").is_empty());
        assert!(KeywordInterestExtractor.interests("").is_empty());
    }
}
