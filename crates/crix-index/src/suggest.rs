//! Term suggester.
//!
//! For each input token, candidate terms are read from the field's term dictionary with a
//! Levenshtein automaton, then counted within the query scope. Scoring follows the usual
//! term suggester convention: `1 - edits / min(token length, candidate length)`.

use std::{cmp::Ordering, collections::BTreeSet, str};

use crix_config::SuggestSettings;
use levenshtein_automata::{DFA, Distance, LevenshteinAutomatonBuilder, SINK_STATE};
use tantivy::{
    Searcher, Term,
    collector::Count,
    query::{BooleanQuery, Occur, Query, TermQuery},
    schema::{Field, IndexRecordOption},
};
use tantivy_fst::Automaton;

use crate::{
    IndexError,
    analyzer::AnalyzedToken,
    result::{SuggestionEntry, SuggestionOption},
    translate::CompiledSuggestion,
};

/// Wrapper that implements `tantivy_fst::Automaton` for `levenshtein_automata::DFA`.
struct LevenshteinDfa(DFA);

impl Automaton for LevenshteinDfa {
    type State = u32;

    fn start(&self) -> Self::State {
        self.0.initial_state()
    }

    fn is_match(&self, state: &Self::State) -> bool {
        matches!(self.0.distance(*state), Distance::Exact(_))
    }

    fn can_match(&self, state: &Self::State) -> bool {
        *state != SINK_STATE
    }

    fn accept(&self, state: &Self::State, byte: u8) -> Self::State {
        self.0.transition(*state, byte)
    }
}

/// Computes suggestion entries for one request, counting frequencies within `scope`.
pub fn suggest(
    searcher: &Searcher,
    scope: &dyn Query,
    request: &CompiledSuggestion,
    settings: &SuggestSettings,
    index: &str,
) -> Result<Vec<SuggestionEntry>, IndexError> {
    let builder = LevenshteinAutomatonBuilder::new(settings.max_edits, true);
    let suggester = TokenSuggester {
        searcher,
        scope,
        field: request.field,
        settings,
        index,
        builder: &builder,
    };

    request
        .tokens
        .iter()
        .map(|token| {
            Ok(SuggestionEntry {
                text: token.text.clone(),
                offset: token.offset,
                length: token.length,
                options: suggester.options(token)?,
            })
        })
        .collect()
}

/// Per-request state shared across tokens.
struct TokenSuggester<'a> {
    /// Point-in-time view of the index.
    searcher: &'a Searcher,
    /// Query scope for frequencies.
    scope: &'a dyn Query,
    /// Field whose terms are suggested.
    field: Field,
    /// Suggester tuning.
    settings: &'a SuggestSettings,
    /// Physical index name, for errors.
    index: &'a str,
    /// Automaton builder for the configured edit distance.
    builder: &'a LevenshteinAutomatonBuilder,
}

impl TokenSuggester<'_> {
    /// Options for one token, best first.
    fn options(&self, token: &AnalyzedToken) -> Result<Vec<SuggestionOption>, IndexError> {
        let token_len = token.text.chars().count();
        if token_len < self.settings.min_word_length {
            return Ok(Vec::new());
        }
        // Only tokens missing from the scope get suggestions
        if self.scoped_frequency(&token.text)? > 0 {
            return Ok(Vec::new());
        }

        let dfa = self.builder.build_dfa(&token.text);
        let mut options = Vec::new();
        for candidate in self.candidates(&token.text)? {
            if !shares_prefix(&token.text, &candidate, self.settings.prefix_length) {
                continue;
            }
            let Distance::Exact(edits) = dfa.eval(&candidate) else {
                continue;
            };
            let freq = self.scoped_frequency(&candidate)?;
            if freq == 0 {
                continue;
            }
            let shortest = token_len.min(candidate.chars().count()).max(1);
            options.push(SuggestionOption {
                score: 1.0 - f32::from(edits) / shortest as f32,
                text: candidate,
                freq,
            });
        }

        options.sort_by(compare_options);
        options.truncate(self.settings.size);
        Ok(options)
    }

    /// Terms of the field within the edit distance of `token`, excluding `token` itself.
    fn candidates(&self, token: &str) -> Result<BTreeSet<String>, IndexError> {
        let mut candidates = BTreeSet::new();
        for segment_reader in self.searcher.segment_readers() {
            let inverted_index = segment_reader.inverted_index(self.field).map_err(|e| {
                IndexError::BackendUnavailable {
                    index: self.index.to_string(),
                    message: e.to_string(),
                }
            })?;
            let dfa = LevenshteinDfa(self.builder.build_dfa(token));
            let mut stream = inverted_index.terms().search(dfa).into_stream()?;
            while stream.advance() {
                if let Ok(term) = str::from_utf8(stream.key())
                    && term != token
                {
                    candidates.insert(term.to_string());
                }
            }
        }
        Ok(candidates)
    }

    /// Number of live documents in scope containing `term`.
    fn scoped_frequency(&self, term: &str) -> Result<u64, IndexError> {
        let term_query: Box<dyn Query> = Box::new(TermQuery::new(
            Term::from_field_text(self.field, term),
            IndexRecordOption::Basic,
        ));
        let query = BooleanQuery::new(vec![
            (Occur::Must, self.scope.box_clone()),
            (Occur::Must, term_query),
        ]);
        let count = self
            .searcher
            .search(&query, &Count)
            .map_err(|e| IndexError::backend(self.index, &e))?;
        Ok(count as u64)
    }
}

/// Returns true if both strings share their first `prefix_length` characters.
fn shares_prefix(token: &str, candidate: &str, prefix_length: usize) -> bool {
    let mut token_chars = token.chars();
    let mut candidate_chars = candidate.chars();
    (0..prefix_length).all(|_| match (token_chars.next(), candidate_chars.next()) {
        (Some(a), Some(b)) => a == b,
        (None, None) => true,
        _ => false,
    })
}

/// Score descending, then frequency descending, then text.
fn compare_options(a: &SuggestionOption, b: &SuggestionOption) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.freq.cmp(&a.freq))
        .then_with(|| a.text.cmp(&b.text))
}

#[cfg(test)]
mod test {
    use super::*;

    fn option(text: &str, freq: u64, score: f32) -> SuggestionOption {
        SuggestionOption {
            text: text.to_string(),
            freq,
            score,
        }
    }

    #[test]
    fn prefix_matching() {
        assert!(shares_prefix("chickn", "chicken", 1));
        assert!(shares_prefix("chickn", "chicken", 4));
        assert!(!shares_prefix("chickn", "thicken", 1));
        assert!(shares_prefix("chickn", "thicken", 0));
        assert!(shares_prefix("äpfel", "äpfl", 1));
    }

    #[test]
    fn options_order() {
        let mut options = vec![
            option("b", 1, 0.5),
            option("a", 1, 0.5),
            option("c", 5, 0.5),
            option("d", 1, 0.8),
        ];
        options.sort_by(compare_options);
        let texts: Vec<&str> = options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["d", "c", "a", "b"]);
    }

    #[test]
    fn dfa_distance_counts_transpositions_once() {
        let builder = LevenshteinAutomatonBuilder::new(2, true);
        let dfa = builder.build_dfa("chikcen");
        assert_eq!(dfa.eval("chicken"), Distance::Exact(1));
        let dfa = builder.build_dfa("chickn");
        assert_eq!(dfa.eval("chicken"), Distance::Exact(1));
        assert_eq!(dfa.eval("egg"), Distance::AtLeast(3));
    }
}
