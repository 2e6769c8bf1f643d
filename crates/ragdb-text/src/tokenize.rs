//! Tokenization shared by indexing and querying.
//!
//! Words in space-delimited scripts split on non-alphanumeric boundaries.
//! Scripts written without spaces (CJK ideographs, kana, Thai) have no word
//! boundaries to split on, so each run is emitted as single characters plus
//! overlapping character bigrams.

use tantivy::tokenizer::{LowerCaser, StopWordFilter, TextAnalyzer, Token, TokenStream, Tokenizer};

/// Name the analyzer is registered under in every lexical index.
pub const ANALYZER_NAME: &str = "script_aware";

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of",
    "on", "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they", "them",
    "their", "there", "then", "than", "so", "if", "when", "where", "why", "how", "what", "which", "who", "whom",
    "whose", "can", "could", "should", "would", "may", "might", "must", "shall", "do", "does", "did", "have",
    "had", "having",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Word,
    Unsegmented,
    Separator,
}

fn classify(c: char) -> CharClass {
    let cp = c as u32;
    let unsegmented = matches!(cp,
        0x0E00..=0x0E7F      // Thai
        | 0x3040..=0x30FF    // Hiragana, Katakana
        | 0x31F0..=0x31FF    // Katakana phonetic extensions
        | 0x3400..=0x4DBF    // CJK extension A
        | 0x4E00..=0x9FFF    // CJK unified ideographs
        | 0xF900..=0xFAFF    // CJK compatibility ideographs
        | 0xFF66..=0xFF9F    // Halfwidth katakana
        | 0x20000..=0x2FFFF  // CJK extensions B and beyond
    );
    if unsegmented {
        CharClass::Unsegmented
    } else if c.is_alphanumeric() {
        CharClass::Word
    } else {
        CharClass::Separator
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScriptAwareTokenizer;

pub struct ScriptAwareTokenStream {
    tokens: std::vec::IntoIter<Token>,
    current: Token,
}

impl Tokenizer for ScriptAwareTokenizer {
    type TokenStream<'a> = ScriptAwareTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        ScriptAwareTokenStream { tokens: segment(text).into_iter(), current: Token::default() }
    }
}

impl TokenStream for ScriptAwareTokenStream {
    fn advance(&mut self) -> bool {
        match self.tokens.next() {
            Some(token) => {
                self.current = token;
                true
            }
            None => false,
        }
    }

    fn token(&self) -> &Token {
        &self.current
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.current
    }
}

fn segment(text: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut position = 0usize;
    let mut push = |out: &mut Vec<Token>, from: usize, to: usize| {
        out.push(Token {
            offset_from: from,
            offset_to: to,
            position,
            text: text[from..to].to_string(),
            position_length: 1,
        });
        position += 1;
    };

    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match classify(c) {
            CharClass::Separator => {}
            CharClass::Word => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if classify(next) != CharClass::Word {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                push(&mut out, start, end);
            }
            CharClass::Unsegmented => {
                let mut run = vec![(start, start + c.len_utf8())];
                while let Some(&(i, next)) = chars.peek() {
                    if classify(next) != CharClass::Unsegmented {
                        break;
                    }
                    run.push((i, i + next.len_utf8()));
                    chars.next();
                }
                for (n, &(from, to)) in run.iter().enumerate() {
                    push(&mut out, from, to);
                    if let Some(&(_, next_to)) = run.get(n + 1) {
                        push(&mut out, from, next_to);
                    }
                }
            }
        }
    }
    out
}

/// Script-aware tokenizer followed by lowercasing and English stop-word removal.
pub fn script_aware_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(ScriptAwareTokenizer)
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
        .build()
}

/// Terms `text` produces under [`script_aware_analyzer`], in order.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut analyzer = script_aware_analyzer();
    let mut stream = analyzer.token_stream(text);
    let mut terms = Vec::new();
    while stream.advance() {
        terms.push(stream.token().text.clone());
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_words_lowercased_without_stop_words() {
        assert_eq!(tokenize("The Pump-Motor is OFF"), vec!["pump", "motor", "off"]);
    }

    #[test]
    fn cjk_runs_emit_unigrams_and_bigrams() {
        assert_eq!(tokenize("水泵"), vec!["水", "水泵", "泵"]);
        assert_eq!(tokenize("启动水泵"), vec!["启", "启动", "动", "动水", "水", "水泵", "泵"]);
    }

    #[test]
    fn mixed_scripts_split_at_script_boundaries() {
        assert_eq!(tokenize("型号ABC123说明"), vec!["型", "型号", "号", "abc123", "说", "说明", "明"]);
    }

    #[test]
    fn kana_and_thai_are_unsegmented() {
        assert_eq!(tokenize("ポンプ"), vec!["ポ", "ポン", "ン", "ンプ", "プ"]);
        assert_eq!(tokenize("ไฟ").len(), 3);
    }

    #[test]
    fn punctuation_only_yields_nothing() {
        assert!(tokenize("  ,.;!? 。、 ").is_empty());
        assert!(tokenize("").is_empty());
    }
}
