//! # Tokenizer
//!
//! Splits review text into word and punctuation tokens while keeping track of
//! both character and byte offsets into the original string.

use regex::Regex;

use crate::error::Result;

/// A token extracted from a text with positional information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token text content, exactly as it appears in the input
    pub text: String,
    /// Start position in the original string, in characters
    pub start: usize,
    /// End position in the original string, in characters (exclusive)
    pub end: usize,
    /// Start position in the original string, in bytes
    pub byte_start: usize,
    /// End position in the original string, in bytes (exclusive)
    pub byte_end: usize,
    /// Token index in the sequence
    pub index: usize,
}

/// Contractions, words, then any single non-space character.
const TOKEN_PATTERN: &str = r"'\p{L}+|[\p{L}\p{N}]+|[^\s\p{L}\p{N}]";

/// Rule-based tokenizer shared by every pipeline.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pattern: Regex,
}

impl Tokenizer {
    /// Create a new tokenizer instance.
    ///
    /// # Errors
    ///
    /// Returns `UmamiError::RegexError` if the token pattern fails to compile
    /// (should never happen with the static pattern defined here).
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(TOKEN_PATTERN)?,
        })
    }

    /// Tokenize a text into a sequence of tokens.
    ///
    /// # Examples
    /// ```
    /// use umami_core::tokenizer::Tokenizer;
    ///
    /// let tokenizer = Tokenizer::new().unwrap();
    /// let tokens = tokenizer.tokenize("The pickles were great addition.");
    /// assert_eq!(tokens.len(), 6);
    /// assert_eq!(tokens[3].text, "great");
    /// assert_eq!((tokens[3].start, tokens[3].end), (17, 22));
    /// ```
    pub fn tokenize(&self, input: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut chars_seen = 0;
        let mut bytes_seen = 0;

        for (index, m) in self.pattern.find_iter(input).enumerate() {
            chars_seen += input[bytes_seen..m.start()].chars().count();
            let start = chars_seen;
            let text = m.as_str();
            chars_seen += text.chars().count();
            bytes_seen = m.end();

            tokens.push(Token {
                text: text.to_string(),
                start,
                end: chars_seen,
                byte_start: m.start(),
                byte_end: m.end(),
                index,
            });
        }

        tokens
    }
}
