//! Local token counting

/// Approximate bytes per token
pub const BYTES_PER_TOKEN: usize = 4;

/// Estimate the token count of `text`
///
/// Rough approximation used when a provider reports no usage.
#[inline]
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    text.len().div_ceil(BYTES_PER_TOKEN)
}

/// Estimate tokens across several texts
#[must_use]
pub fn count_tokens_all<'a>(texts: impl IntoIterator<Item = &'a str>) -> usize {
    texts.into_iter().map(count_tokens).sum()
}
