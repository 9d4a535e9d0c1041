//! Field Validation
//!
//! Pure validation rules for the fields a member record is built from.
//! Every failure here is fatal: these rules guard invariants (handle
//! uniqueness constraints are checked separately, against the directory).

use thiserror::Error;

use crate::category::Category;
use crate::member::ExternalId;
use crate::policy::Severity;

/// A field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Handle is longer than the historical 8-character limit.
    #[error("Handle '{0}' can not be longer than 8 characters")]
    HandleTooLong(String),

    /// Handle contains a character outside `[a-z0-9._-]`.
    #[error("Handle '{0}' must contain only lowercase letters, numbers, '.', '_' or '-'")]
    HandleBadChar(String),

    /// Handle contains no letter at all.
    #[error("Handle '{0}' must contain at least one letter")]
    HandleNoLetter(String),

    /// Handle starts with punctuation.
    #[error("Handle '{0}' must begin with a letter or number")]
    HandleBadStart(String),

    /// ID number is not exactly 8 digits.
    #[error("Invalid ID number: {0}")]
    BadExternalId(String),

    /// Category requires an ID number and none was given.
    #[error("An ID number is required for {0} accounts")]
    ExternalIdRequired(Category),

    /// Years-paid balance below the arrears floor.
    #[error("Years paid must be -1 or above, got {0}")]
    YearsPaidTooLow(i32),

    /// Category does not renew (no years-paid balance).
    #[error("Category {0} is not a paying category and can not be renewed")]
    NotRenewable(Category),

    /// Only the ordinary membership categories may become committee.
    #[error("{0} accounts cannot convert to committee")]
    CommitteeConversion(Category),
}

impl ValidationError {
    /// All validation failures block the operation.
    #[must_use]
    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }

    /// Stable identifier for log correlation.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::HandleTooLong(_) => "VALIDATE_HANDLE_TOO_LONG",
            ValidationError::HandleBadChar(_) => "VALIDATE_HANDLE_BAD_CHAR",
            ValidationError::HandleNoLetter(_) => "VALIDATE_HANDLE_NO_LETTER",
            ValidationError::HandleBadStart(_) => "VALIDATE_HANDLE_BAD_START",
            ValidationError::BadExternalId(_) => "VALIDATE_BAD_EXTERNAL_ID",
            ValidationError::ExternalIdRequired(_) => "VALIDATE_EXTERNAL_ID_REQUIRED",
            ValidationError::YearsPaidTooLow(_) => "VALIDATE_YEARS_PAID_TOO_LOW",
            ValidationError::NotRenewable(_) => "VALIDATE_NOT_RENEWABLE",
            ValidationError::CommitteeConversion(_) => "VALIDATE_COMMITTEE_CONVERSION",
        }
    }
}

/// Validate a handle against the account-name rules.
///
/// At most 8 characters, lowercase letters/digits/`._-` only, at least
/// one letter, and the first character must be a letter or digit.
pub fn check_handle(handle: &str) -> Result<(), ValidationError> {
    if handle.len() > 8 {
        return Err(ValidationError::HandleTooLong(handle.to_string()));
    }
    if handle
        .bytes()
        .any(|b| !(b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'-')))
    {
        return Err(ValidationError::HandleBadChar(handle.to_string()));
    }
    if !handle.bytes().any(|b| b.is_ascii_lowercase()) {
        return Err(ValidationError::HandleNoLetter(handle.to_string()));
    }
    match handle.bytes().next() {
        Some(b) if b.is_ascii_lowercase() || b.is_ascii_digit() => Ok(()),
        // Unreachable for the empty string: no-letter fires first.
        _ => Err(ValidationError::HandleBadStart(handle.to_string())),
    }
}

/// Parse and validate an ID number from its text form.
pub fn check_external_id(raw: &str) -> Result<ExternalId, ValidationError> {
    raw.parse()
        .map_err(|_| ValidationError::BadExternalId(raw.to_string()))
}

/// Affiliated categories must carry an ID number.
pub fn check_required_external_id(
    category: Category,
    id: Option<ExternalId>,
) -> Result<(), ValidationError> {
    if category.is_affiliated() && id.is_none() {
        return Err(ValidationError::ExternalIdRequired(category));
    }
    Ok(())
}

/// Years paid may go to -1 (arrears past grace) but no further.
pub fn check_years_paid(years: i32) -> Result<(), ValidationError> {
    if years < -1 {
        return Err(ValidationError::YearsPaidTooLow(years));
    }
    Ok(())
}

/// Only paying categories can be renewed.
pub fn check_renewal_category(category: Category) -> Result<(), ValidationError> {
    if !category.is_paying() {
        return Err(ValidationError::NotRenewable(category));
    }
    Ok(())
}

/// Committee is for people, not societies or clubs: conversion into it
/// is only allowed from member, staff or committee itself.
pub fn check_conversion(from: Category, to: Category) -> Result<(), ValidationError> {
    if to == Category::Committee
        && !matches!(from, Category::Member | Category::Staff | Category::Committee)
    {
        return Err(ValidationError::CommitteeConversion(from));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_handles() {
        for handle in ["fred", "a", "a1", "f.o-o_1", "12345a78", "x2", "mike-f"] {
            assert!(check_handle(handle).is_ok(), "expected '{handle}' valid");
        }
    }

    #[test]
    fn test_handle_too_long() {
        assert_eq!(
            check_handle("ninechars"),
            Err(ValidationError::HandleTooLong("ninechars".into()))
        );
    }

    #[test]
    fn test_handle_bad_chars() {
        for handle in ["Fred", "fr ed", "fr:ed", "fréd", "fred!"] {
            assert!(matches!(
                check_handle(handle),
                Err(ValidationError::HandleBadChar(_))
            ));
        }
    }

    #[test]
    fn test_handle_needs_letter() {
        assert!(matches!(
            check_handle("12345678"),
            Err(ValidationError::HandleNoLetter(_))
        ));
        assert!(matches!(
            check_handle(""),
            Err(ValidationError::HandleNoLetter(_))
        ));
    }

    #[test]
    fn test_handle_bad_start() {
        for handle in [".fred", "-fred", "_fred"] {
            assert!(matches!(
                check_handle(handle),
                Err(ValidationError::HandleBadStart(_))
            ));
        }
        // Digit start is fine as long as a letter appears somewhere.
        assert!(check_handle("9fred").is_ok());
    }

    #[test]
    fn test_external_id_parse() {
        assert!(check_external_id("15358462").is_ok());
        assert!(matches!(
            check_external_id("1535846"),
            Err(ValidationError::BadExternalId(_))
        ));
    }

    #[test]
    fn test_required_external_id() {
        assert!(check_required_external_id(Category::Member, None).is_err());
        assert!(check_required_external_id(Category::Society, None).is_ok());
        assert!(
            check_required_external_id(Category::Member, ExternalId::new(12_345_678)).is_ok()
        );
    }

    #[test]
    fn test_years_paid_floor() {
        assert!(check_years_paid(5).is_ok());
        assert!(check_years_paid(0).is_ok());
        assert!(check_years_paid(-1).is_ok());
        assert_eq!(check_years_paid(-2), Err(ValidationError::YearsPaidTooLow(-2)));
    }

    #[test]
    fn test_renewal_category() {
        assert!(check_renewal_category(Category::Member).is_ok());
        assert!(check_renewal_category(Category::Guest).is_ok());
        assert!(matches!(
            check_renewal_category(Category::Society),
            Err(ValidationError::NotRenewable(Category::Society))
        ));
    }

    #[test]
    fn test_committee_conversion_guard() {
        assert!(check_conversion(Category::Member, Category::Committee).is_ok());
        assert!(check_conversion(Category::Staff, Category::Committee).is_ok());
        assert!(check_conversion(Category::Society, Category::Club).is_ok());
        assert_eq!(
            check_conversion(Category::Guest, Category::Committee),
            Err(ValidationError::CommitteeConversion(Category::Guest))
        );
    }

    #[test]
    fn test_severity_and_codes() {
        let err = ValidationError::HandleTooLong("ninechars".into());
        assert_eq!(err.severity(), Severity::Fatal);
        assert_eq!(err.error_code(), "VALIDATE_HANDLE_TOO_LONG");
    }
}
