//! Patient code derivation.
//!
//! A code is the first two characters of the full name (upper-cased), the
//! last three of the aadhaar number and the last three of the phone number.

use thiserror::Error;

/// Length of every well-formed patient code (2 + 3 + 3).
pub const PATIENT_CODE_LEN: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("full name must have at least 2 characters")]
    FullnameTooShort,
    #[error("aadhaar number must have at least 3 characters")]
    AadhaarTooShort,
    #[error("phone number must have at least 3 characters")]
    PhoneTooShort,
}

/// Derive the patient code for a registration.
pub fn derive_patient_code(fullname: &str, aadhaar: &str, phone: &str) -> Result<String, CodeError> {
    let name_part = head(fullname, 2).ok_or(CodeError::FullnameTooShort)?;
    let aadhaar_part = tail(aadhaar, 3).ok_or(CodeError::AadhaarTooShort)?;
    let phone_part = tail(phone, 3).ok_or(CodeError::PhoneTooShort)?;
    Ok(format!("{}{aadhaar_part}{phone_part}", name_part.to_uppercase()))
}

/// Whether `code` has the length every derived code has.
pub fn has_code_length(code: &str) -> bool {
    code.chars().count() == PATIENT_CODE_LEN
}

fn head(s: &str, n: usize) -> Option<&str> {
    match s.char_indices().nth(n) {
        Some((end, _)) => Some(&s[..end]),
        None if s.chars().count() == n => Some(s),
        None => None,
    }
}

fn tail(s: &str, n: usize) -> Option<&str> {
    let len = s.chars().count();
    let skip = len.checked_sub(n)?;
    let start = s.char_indices().nth(skip).map(|(i, _)| i)?;
    Some(&s[start..])
}
