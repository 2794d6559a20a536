use mnemo_core::Result;

/// Judges whether two pattern descriptions denote the same behavior.
///
/// Implementations usually call out to an LLM and may block or fail. Callers in
/// this crate treat any error as "not similar".
pub trait SimilarityOracle: Send + Sync {
    fn compare(&self, candidate: &str, existing: &str) -> Result<bool>;
}

impl<F> SimilarityOracle for F
where
    F: Fn(&str, &str) -> Result<bool> + Send + Sync,
{
    fn compare(&self, candidate: &str, existing: &str) -> Result<bool> {
        self(candidate, existing)
    }
}

/// Lexical oracle: two texts match when their lowercase word sequences are
/// identical once punctuation is stripped.
///
/// Used for manually entered observations where no LLM is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedTextOracle;

impl NormalizedTextOracle {
    pub fn normalize(text: &str) -> String {
        text.to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl SimilarityOracle for NormalizedTextOracle {
    fn compare(&self, candidate: &str, existing: &str) -> Result<bool> {
        Ok(Self::normalize(candidate) == Self::normalize(existing))
    }
}
