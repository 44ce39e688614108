//! Text analysis for analyzed (`text`) fields.
//!
//! The pipeline is:
//! 1. `SimpleTokenizer` - splits on whitespace and punctuation
//! 2. `LowerCaser` - converts tokens to lowercase
//! 3. `RemoveLongFilter` - removes tokens longer than 40 bytes
//! 4. `Stemmer` - language-specific stemming, unless the stemmer is `none`
//!
//! The same analyzer tokenizes documents, full-text filters and suggestion input, so that all
//! three agree on what a term is.

use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer, TokenStream,
};

use crate::IndexError;

/// Name of the custom tokenizer registered with Tantivy.
pub const CRIX_TOKENIZER: &str = "crix_text";

/// Stemmer setting that disables stemming.
pub const NO_STEMMER: &str = "none";

/// Maximum token length in bytes before filtering.
const MAX_TOKEN_LENGTH: usize = 40;

/// A token produced by the analyzer, with offsets in characters of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedToken {
    /// Normalized token text.
    pub text: String,
    /// Character offset of the token in the input.
    pub offset: usize,
    /// Length of the token in the input, in characters.
    pub length: usize,
}

/// Parses a stemmer setting. `none` yields `None`.
pub fn parse_language(name: &str) -> Result<Option<Language>, IndexError> {
    let language = match name.to_lowercase().as_str() {
        NO_STEMMER => return Ok(None),
        "arabic" => Language::Arabic,
        "danish" => Language::Danish,
        "dutch" => Language::Dutch,
        "english" => Language::English,
        "finnish" => Language::Finnish,
        "french" => Language::French,
        "german" => Language::German,
        "greek" => Language::Greek,
        "hungarian" => Language::Hungarian,
        "italian" => Language::Italian,
        "norwegian" => Language::Norwegian,
        "portuguese" => Language::Portuguese,
        "romanian" => Language::Romanian,
        "russian" => Language::Russian,
        "spanish" => Language::Spanish,
        "swedish" => Language::Swedish,
        "tamil" => Language::Tamil,
        "turkish" => Language::Turkish,
        other => return Err(IndexError::InvalidLanguage(other.to_string())),
    };
    Ok(Some(language))
}

/// Builds the analyzer, stemming with `language` when given.
pub fn build_analyzer(language: Option<Language>) -> TextAnalyzer {
    match language {
        Some(language) => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
            .filter(Stemmer::new(language))
            .build(),
        None => TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(LowerCaser)
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LENGTH))
            .build(),
    }
}

/// Builds the analyzer from a stemmer setting.
pub fn build_analyzer_from_name(stemmer: &str) -> Result<TextAnalyzer, IndexError> {
    Ok(build_analyzer(parse_language(stemmer)?))
}

/// Runs `text` through the analyzer.
pub fn analyze(analyzer: &mut TextAnalyzer, text: &str) -> Vec<AnalyzedToken> {
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while let Some(token) = stream.next() {
        let start = token.offset_from.min(text.len());
        let end = token.offset_to.clamp(start, text.len());
        tokens.push(AnalyzedToken {
            text: token.text.clone(),
            offset: char_count(text, 0, start),
            length: char_count(text, start, end),
        });
    }
    tokens
}

/// Counts the characters of `text[start..end]`, tolerating offsets inside a character.
fn char_count(text: &str, start: usize, end: usize) -> usize {
    text.get(start..end)
        .map_or(end - start, |slice| slice.chars().count())
}

#[cfg(test)]
mod test {
    use std::iter;

    use super::*;

    #[test]
    fn parse_known_languages() {
        assert_eq!(parse_language("english").unwrap(), Some(Language::English));
        assert_eq!(parse_language("GeRmAn").unwrap(), Some(Language::German));
        assert_eq!(parse_language("turkish").unwrap(), Some(Language::Turkish));
    }

    #[test]
    fn parse_none_disables_stemming() {
        assert_eq!(parse_language("none").unwrap(), None);
        assert_eq!(parse_language("None").unwrap(), None);
    }

    #[test]
    fn parse_invalid_language() {
        let err = parse_language("klingon").unwrap_err();
        assert!(err.to_string().contains("klingon"));
    }

    #[test]
    fn analyzer_without_stemmer_keeps_words() {
        let mut analyzer = build_analyzer(None);
        let mut stream = analyzer.token_stream("Chickens RUNNING");
        let tokens: Vec<_> = iter::from_fn(|| stream.next().map(|t| t.text.clone())).collect();
        assert_eq!(tokens, vec!["chickens", "running"]);
    }

    #[test]
    fn analyzer_stems_english() {
        let mut analyzer = build_analyzer_from_name("english").unwrap();
        let tokens: Vec<_> = analyze(&mut analyzer, "handling running")
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(tokens, vec!["handl", "run"]);
    }

    #[test]
    fn analyzer_removes_long_tokens() {
        let mut analyzer = build_analyzer(None);
        let text = format!("short {} word", "a".repeat(50));
        let tokens: Vec<_> = analyze(&mut analyzer, &text)
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(tokens, vec!["short", "word"]);
    }

    #[test]
    fn analyze_reports_character_offsets() {
        let mut analyzer = build_analyzer(None);
        let tokens = analyze(&mut analyzer, "Größe chickn");
        assert_eq!(tokens[0].text, "größe");
        assert_eq!((tokens[0].offset, tokens[0].length), (0, 5));
        assert_eq!(tokens[1].text, "chickn");
        assert_eq!((tokens[1].offset, tokens[1].length), (6, 6));
    }

    #[test]
    fn build_from_invalid_name() {
        assert!(build_analyzer_from_name("invalid").is_err());
    }
}
