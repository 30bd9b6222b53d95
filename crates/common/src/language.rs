//! Answer language detection and localized user-facing messages

use serde::{Deserialize, Serialize};

/// Languages the service answers in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Korean,
    English,
}

impl Language {
    /// Detect from script: any Hangul syllable makes the text Korean.
    pub fn detect(text: &str) -> Self {
        if text.chars().any(|c| ('\u{AC00}'..='\u{D7A3}').contains(&c)) {
            Language::Korean
        } else {
            Language::English
        }
    }

    /// Parse a caller-supplied language hint ("한국어", "Korean", "ko", ...).
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint.trim().to_lowercase().as_str() {
            "한국어" | "korean" | "ko" | "ko-kr" | "kr" => Some(Language::Korean),
            "english" | "영어" | "en" | "en-us" | "en-gb" => Some(Language::English),
            _ => None,
        }
    }

    /// Name used inside prompts.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Korean => "Korean",
            Language::English => "English",
        }
    }

    /// User-facing message in this language.
    pub fn message(&self, message: Message) -> &'static str {
        use Message::*;
        match (self, message) {
            (Language::Korean, Translating) => "질문 이해 중...",
            (Language::Korean, Embedding) => "벡터 변환 중...",
            (Language::Korean, Searching) => "문헌 검색 중...",
            (Language::Korean, Generating) => "답변 생성 중...",
            (Language::Korean, Done) => "완료",
            (Language::Korean, NoEvidence) => "관련 문헌을 찾을 수 없습니다. 다른 질문을 시도해주세요.",
            (Language::Korean, OutOfScope) => "질문이 제공된 문서의 범위를 벗어났습니다.",
            (Language::Korean, AnswerFailed) => "죄송합니다. 답변 생성 중 오류가 발생했습니다.",
            (Language::Korean, ServiceError) => "오류가 발생했습니다. 다시 시도해주세요.",
            (Language::Korean, NewConversation) => "새 대화",

            (Language::English, Translating) => "Understanding the question...",
            (Language::English, Embedding) => "Converting to vectors...",
            (Language::English, Searching) => "Searching the literature...",
            (Language::English, Generating) => "Generating the answer...",
            (Language::English, Done) => "Done",
            (Language::English, NoEvidence) => "No relevant literature was found. Please try a different question.",
            (Language::English, OutOfScope) => "The question is outside the scope of the available documents.",
            (Language::English, AnswerFailed) => "Sorry, an error occurred while generating the answer.",
            (Language::English, ServiceError) => "An error occurred. Please try again.",
            (Language::English, NewConversation) => "New conversation",
        }
    }
}

/// Catalogue of user-facing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Translating,
    Embedding,
    Searching,
    Generating,
    Done,
    NoEvidence,
    OutOfScope,
    AnswerFailed,
    ServiceError,
    NewConversation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_hangul() {
        assert_eq!(Language::detect("고양이 만성 신장병 치료는?"), Language::Korean);
        assert_eq!(Language::detect("CKD in cats (고양이)"), Language::Korean);
        assert_eq!(Language::detect("How is feline CKD staged?"), Language::English);
        // Jamo alone are not syllables
        assert_eq!(Language::detect("ㅋㅋ"), Language::English);
    }

    #[test]
    fn test_hint_parsing() {
        assert_eq!(Language::from_hint("한국어"), Some(Language::Korean));
        assert_eq!(Language::from_hint(" English "), Some(Language::English));
        assert_eq!(Language::from_hint("klingon"), None);
    }

    #[test]
    fn test_messages_localized() {
        assert_ne!(
            Language::Korean.message(Message::NoEvidence),
            Language::English.message(Message::NoEvidence)
        );
    }
}
