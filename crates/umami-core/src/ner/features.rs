//! Token feature extraction for the entity recognizer.
//!
//! Every token is described by a fixed number of string features (word form,
//! affixes, shape and a window of neighbours). Each feature is hashed into one
//! of `n_buckets` rows of the model's weight matrix.

use crate::tokenizer::Token;

/// Number of features produced per token.
pub const FEATURES_PER_TOKEN: usize = 14;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a; hashes must stay identical across builds so saved weights keep
/// their meaning.
fn fnv1a(template: u8, value: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in std::iter::once(template).chain(value.bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Orthographic shape of a word: `Xxxxx`, `dd`, `xxx'x` and so on. Runs of
/// the same class are cut after four characters.
pub fn word_shape(text: &str) -> String {
    let mut shape = String::with_capacity(text.len());
    let mut last = None;
    let mut run = 0;

    for c in text.chars() {
        let class = if c.is_uppercase() {
            'X'
        } else if c.is_lowercase() {
            'x'
        } else if c.is_numeric() {
            'd'
        } else {
            c
        };

        if Some(class) == last {
            run += 1;
        } else {
            last = Some(class);
            run = 1;
        }
        if run <= 4 {
            shape.push(class);
        }
    }

    shape
}

fn prefix(lower: &str, n: usize) -> &str {
    match lower.char_indices().nth(n) {
        Some((idx, _)) => &lower[..idx],
        None => lower,
    }
}

fn suffix(lower: &str, n: usize) -> &str {
    let count = lower.chars().count();
    if count <= n {
        return lower;
    }
    match lower.char_indices().nth(count - n) {
        Some((idx, _)) => &lower[idx..],
        None => lower,
    }
}

fn flags(token: &str) -> String {
    let is_alpha = token.chars().all(char::is_alphabetic);
    let is_upper = is_alpha && token.chars().all(char::is_uppercase);
    let is_title = token.chars().next().is_some_and(char::is_uppercase) && !is_upper;
    let is_digit = token.chars().all(|c| c.is_ascii_digit());
    let is_punct = token.chars().all(|c| !c.is_alphanumeric());
    let long_token = token.chars().count() > 3;

    [is_alpha, is_upper, is_title, is_digit, is_punct, long_token]
        .iter()
        .map(|&flag| if flag { '1' } else { '0' })
        .collect()
}

/// Hashes token windows into weight-matrix rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureExtractor {
    n_buckets: usize,
}

impl FeatureExtractor {
    pub fn new(n_buckets: usize) -> Self {
        Self {
            n_buckets: n_buckets.max(1),
        }
    }

    pub fn n_buckets(&self) -> usize {
        self.n_buckets
    }

    /// Raw feature strings for the token at `i`, as `(template, value)`.
    pub fn token_features(&self, tokens: &[Token], i: usize) -> Vec<(u8, String)> {
        let lower_at = |j: Option<usize>| -> String {
            match j.and_then(|j| tokens.get(j)) {
                Some(token) => token.text.to_lowercase(),
                None => match j {
                    Some(j) if j >= tokens.len() => "</s>".to_string(),
                    _ => "<s>".to_string(),
                },
            }
        };

        let token = &tokens[i].text;
        let lower = token.to_lowercase();
        let prev = lower_at(i.checked_sub(1));
        let prev2 = lower_at(i.checked_sub(2));
        let next = lower_at(Some(i + 1));
        let next2 = lower_at(Some(i + 2));

        vec![
            (b'b', String::new()),
            (b'w', lower.clone()),
            (b'p', prefix(&lower, 3).to_string()),
            (b's', suffix(&lower, 3).to_string()),
            (b'h', word_shape(token)),
            (b'<', prev.clone()),
            (b'>', next.clone()),
            (b'{', suffix(&prev, 3).to_string()),
            (b'}', suffix(&next, 3).to_string()),
            (b'f', flags(token)),
            (b'[', prev2),
            (b']', next2),
            (b'+', format!("{lower}|{next}")),
            (b'-', format!("{prev}|{lower}")),
        ]
    }

    /// Bucket ids for every token, flattened row-major as
    /// `[token0 feature0, token0 feature1, ..., token1 feature0, ...]`.
    pub fn extract(&self, tokens: &[Token]) -> Vec<u32> {
        let mut ids = Vec::with_capacity(tokens.len() * FEATURES_PER_TOKEN);
        for i in 0..tokens.len() {
            for (template, value) in self.token_features(tokens, i) {
                ids.push((fnv1a(template, &value) % self.n_buckets as u64) as u32);
            }
        }
        ids
    }
}
