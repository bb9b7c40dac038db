//! Tokenizer trait for segmenting text before lexical indexing and querying.

/// Segments text into an ordered token sequence.
///
/// Implementations must be deterministic: identical input and configuration
/// always yield identical tokens. The [`name`](Tokenizer::name) is persisted
/// with lexical collections and checked when they are reopened.
pub trait Tokenizer: Send + Sync {
    /// Stable identifier of this tokenizer and its configuration.
    fn name(&self) -> &str;

    /// Split `text` into tokens.
    fn segment(&self, text: &str) -> Vec<String>;
}

/// Lowercases text and splits it into runs of Unicode alphanumeric characters.
///
/// Suitable for whitespace-delimited languages. Scripts without word
/// boundaries need a dictionary tokenizer plugged in through [`Tokenizer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTokenizer;

impl SimpleTokenizer {
    /// Identifier persisted with collections built by this tokenizer.
    pub const NAME: &'static str = "simple";
}

impl Tokenizer for SimpleTokenizer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn segment(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}
