use thiserror::Error;

/// The caller-supplied phone number contains no digits.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("phone number contains no digits")]
pub struct AddressError;

/// Normalized recipient identifier the platform driver accepts.
///
/// Built from a caller-supplied phone number by stripping everything but
/// ASCII digits and appending `@` + the platform domain suffix.
/// Normalization is idempotent: feeding an already-normalized address back
/// in yields the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientAddress(String);

impl RecipientAddress {
    pub fn normalize(phone: &str, suffix: &str) -> Result<Self, AddressError> {
        // Accept already-normalized input: drop the suffix before filtering
        // so a digit-bearing suffix can never leak into the local part.
        let local = phone
            .strip_suffix(&format!("@{suffix}"))
            .unwrap_or(phone);
        let digits: String = local.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(AddressError);
        }
        Ok(Self(format!("{digits}@{suffix}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecipientAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
