//! Identifier quoting.
//!
//! Identifiers cannot be bound as parameters, so the few statements that must name an
//! object (`SHOW CREATE ...`, `CREATE TABLE`, previews) build it here and nowhere else.
//! Names headed for execution are checked against an allow-list first.

use crate::error::BurrowError;

/// Letters, digits and underscores, not starting with a digit.
pub fn is_valid_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Return `ident` unchanged if it passes the allow-list.
pub fn validate_identifier(ident: &str) -> Result<&str, BurrowError> {
    if is_valid_identifier(ident) {
        Ok(ident)
    } else {
        Err(BurrowError::invalid_identifier(ident))
    }
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Validated `"schema"."name"`.
pub fn qualified(schema: &str, name: &str) -> Result<String, BurrowError> {
    Ok(format!(
        "{}.{}",
        quote_ident(validate_identifier(schema)?),
        quote_ident(validate_identifier(name)?)
    ))
}
