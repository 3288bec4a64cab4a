//! Key normalization

/// Normalize a variable key or role name.
///
/// Surrounding whitespace is trimmed and a single leading `:` is dropped, so
/// `":deploy_to"` and `"deploy_to"` address the same slot.
pub fn normalize_key(key: &str) -> String {
    let trimmed = key.trim();
    trimmed.strip_prefix(':').unwrap_or(trimmed).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("deploy_to", "deploy_to")]
    #[case(":deploy_to", "deploy_to")]
    #[case("  app ", "app")]
    #[case("::odd", ":odd")]
    fn normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_key(input), expected);
    }
}
