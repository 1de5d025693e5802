//! Domain validation rules shared by the catalog, grant and bulk paths.
//!
//! Failures are reported as `validator::ValidationErrors` so they render as
//! 422 with field detail, like derive-based DTO validation.

use once_cell::sync::Lazy;
use regex::Regex;
use service_core::error::AppError;
use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors};

use crate::models::ActionSet;

/// Lowercase kebab case, e.g. `document-issuance`.
pub static SLUG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("slug pattern is valid")
});

/// Dotted identifier with at least two segments, e.g. `users.access`.
pub static CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_]+(\.[a-z0-9_]+)+$").expect("code pattern is valid")
});

pub const NAME_MAX_LEN: usize = 120;
pub const DESCRIPTION_MAX_LEN: usize = 1000;

pub fn violation(code: &'static str, message: impl Into<String>) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Owned(message.into()));
    error
}

/// Single-field rejection.
pub fn reject(field: &'static str, error: ValidationError) -> AppError {
    let mut errors = ValidationErrors::new();
    errors.add(field, error);
    AppError::ValidationError(errors)
}

pub fn into_result(errors: ValidationErrors) -> Result<(), AppError> {
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationError(errors))
    }
}

pub fn check_name(errors: &mut ValidationErrors, name: &str) {
    let len = name.trim().chars().count();
    if len == 0 || len > NAME_MAX_LEN {
        errors.add(
            "name",
            violation(
                "length",
                format!("name must be 1 to {} characters", NAME_MAX_LEN),
            ),
        );
    }
}

pub fn check_description(errors: &mut ValidationErrors, description: Option<&str>) {
    if description.is_some_and(|d| d.chars().count() > DESCRIPTION_MAX_LEN) {
        errors.add(
            "description",
            violation(
                "length",
                format!("description must be at most {} characters", DESCRIPTION_MAX_LEN),
            ),
        );
    }
}

pub fn check_slug(errors: &mut ValidationErrors, slug: &str) {
    if !SLUG_RE.is_match(slug) {
        errors.add(
            "slug",
            violation(
                "slug",
                format!("'{}' is not a lowercase kebab-case slug", slug),
            ),
        );
    }
}

pub fn check_code(errors: &mut ValidationErrors, code: &str) {
    if !CODE_RE.is_match(code) {
        errors.add(
            "code",
            violation(
                "code",
                format!("'{}' is not a dotted permission code", code),
            ),
        );
    }
}

/// Grant actions must stay within the permission's supported set.
pub fn check_actions_supported(
    field: &'static str,
    actions: &ActionSet,
    supported: &ActionSet,
) -> Result<(), AppError> {
    let excess = actions.excess_over(supported);
    if excess.is_empty() {
        Ok(())
    } else {
        Err(reject(
            field,
            violation(
                "unsupported_action",
                format!(
                    "actions {} are not supported (supported: {})",
                    excess, supported
                ),
            ),
        ))
    }
}

/// Parse raw action names, reporting the unknown one against `field`.
pub fn parse_actions<S: AsRef<str>>(field: &'static str, raw: &[S]) -> Result<ActionSet, AppError> {
    ActionSet::parse(raw).map_err(|e| reject(field, violation("unknown_action", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Action;

    #[test]
    fn slug_pattern() {
        for ok in ["users", "document-issuance", "v2"] {
            assert!(SLUG_RE.is_match(ok), "{}", ok);
        }
        for bad in ["Users", "doc_issuance", "-users", "users-", "a--b", ""] {
            assert!(!SLUG_RE.is_match(bad), "{}", bad);
        }
    }

    #[test]
    fn code_pattern() {
        assert!(CODE_RE.is_match("users.access"));
        assert!(CODE_RE.is_match("documents.constancias.issue"));
        assert!(!CODE_RE.is_match("users"));
        assert!(!CODE_RE.is_match("Users.Access"));
        assert!(!CODE_RE.is_match("users..access"));
    }

    #[test]
    fn name_length_bounds() {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, "   ");
        assert!(errors.errors().contains_key("name"));

        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &"x".repeat(NAME_MAX_LEN));
        assert!(errors.errors().is_empty());
    }

    #[test]
    fn unsupported_actions_rejected() {
        let supported = ActionSet::from([Action::Read]);
        assert!(check_actions_supported("actions", &ActionSet::from([Action::Read]), &supported).is_ok());
        let err = check_actions_supported("actions", &ActionSet::from([Action::Delete]), &supported)
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
