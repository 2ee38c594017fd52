use std::sync::LazyLock;

use regex::Regex;
use tidemark_common::{Error, Result};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

const MAX_IDENTIFIER_LEN: usize = 64;

/// Validate that `name` can be interpolated into SQL as a bare identifier.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config("table name cannot be empty".into()));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::Config(format!("table name too long: {name}")));
    }
    if !IDENTIFIER.is_match(name) {
        return Err(Error::Config(format!(
            "table name must be a plain identifier: {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_identifier;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(validate_identifier("migrations").is_ok());
        assert!(validate_identifier("_schema_version2").is_ok());
    }

    #[test]
    fn rejects_injection_and_odd_names() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1migrations").is_err());
        assert!(validate_identifier("m; DROP TABLE users").is_err());
        assert!(validate_identifier("schema.version").is_err());
        assert!(validate_identifier(&"a".repeat(65)).is_err());
    }
}
