//! Domain name grammar shared by owner names and record targets

use crate::error::{ValidationError, ValidationErrorKind};
use std::net::IpAddr;

/// Longest name in presentation form, without the trailing dot (RFC 1035)
pub const MAX_NAME_LENGTH: usize = 253;

/// Longest single label (RFC 1035)
pub const MAX_LABEL_LENGTH: usize = 63;

/// Most labels a 255-octet wire name can hold
pub const MAX_LABEL_COUNT: usize = 127;

/// Rules a name must follow beyond the DNS-wide limits
#[derive(Debug, Clone, Copy, Default)]
pub struct NameRules {
    /// `*` may appear as the complete leftmost label
    pub allow_wildcard: bool,
}

/// Lowercase a name and give it exactly one trailing dot
pub fn canonical(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    let mut out = trimmed.to_ascii_lowercase();
    out.push('.');
    out
}

/// Normalize a zone apex to its canonical absolute form
pub fn normalize_apex(apex: &str) -> Result<String, ValidationError> {
    let apex = canonical(apex);
    if apex == "." {
        return Err(ValidationError::name(
            ValidationErrorKind::InvalidHostname,
            "zone apex cannot be the root",
        ));
    }
    check_name(&apex, NameRules::default())?;
    Ok(apex)
}

/// Qualify an owner name against a canonical apex.
///
/// `@` and the empty string denote the apex. Names with a trailing dot are
/// absolute and must fall inside the zone; names already ending in the apex
/// are kept, anything else is relative.
pub fn qualify(name: &str, apex: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() || name == "@" {
        return Ok(apex.to_string());
    }

    let absolute = name.ends_with('.');
    let lowered = canonical(name);
    if lowered == "." {
        return Err(ValidationError::name(
            ValidationErrorKind::OutOfZone,
            "the root name is outside every zone",
        ));
    }
    if is_within(&lowered, apex) {
        return Ok(lowered);
    }
    if absolute {
        return Err(ValidationError::name(
            ValidationErrorKind::OutOfZone,
            format!("{} is not inside zone {}", lowered, apex),
        ));
    }
    Ok(format!("{}{}", lowered, apex))
}

/// `name` is `apex` or one of its descendants; both must be canonical
pub fn is_within(name: &str, apex: &str) -> bool {
    name == apex || name.ends_with(&format!(".{}", apex))
}

/// Check a canonical name against the DNS-wide constraints
pub fn check_name(name: &str, rules: NameRules) -> Result<(), ValidationError> {
    let bare = name.strip_suffix('.').unwrap_or(name);
    if bare.is_empty() {
        return Ok(());
    }
    let labels: Vec<&str> = bare.split('.').collect();
    if labels.len() > MAX_LABEL_COUNT {
        return Err(ValidationError::name(
            ValidationErrorKind::TooManyLabels,
            format!("{} labels exceeds {}", labels.len(), MAX_LABEL_COUNT),
        ));
    }
    if bare.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::name(
            ValidationErrorKind::NameTooLong,
            format!("{} characters exceeds {}", bare.len(), MAX_NAME_LENGTH),
        ));
    }

    // RFC 2317 classless delegations use '/' inside reverse zones
    let reverse = bare.ends_with(".in-addr.arpa") || bare.ends_with(".ip6.arpa");

    for (index, label) in labels.iter().enumerate() {
        check_label(label, index, rules, reverse)?;
    }
    Ok(())
}

fn check_label(
    label: &str,
    index: usize,
    rules: NameRules,
    reverse: bool,
) -> Result<(), ValidationError> {
    if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
        return Err(ValidationError::name(
            ValidationErrorKind::LabelLength,
            format!("label '{}' must be 1 to {} characters", label, MAX_LABEL_LENGTH),
        ));
    }
    if label.contains('*') {
        if label == "*" && index == 0 && rules.allow_wildcard {
            return Ok(());
        }
        return Err(ValidationError::name(
            ValidationErrorKind::InvalidWildcard,
            "'*' is only allowed as the whole leftmost label",
        ));
    }
    let valid_char =
        |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || (reverse && c == '/');
    if !label.chars().all(valid_char) {
        return Err(ValidationError::name(
            ValidationErrorKind::InvalidCharacters,
            format!("label '{}' contains invalid characters", label),
        ));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(ValidationError::name(
            ValidationErrorKind::InvalidCharacters,
            format!("label '{}' cannot start or end with a hyphen", label),
        ));
    }
    Ok(())
}

/// Normalize a host target (NS, MX, CNAME, PTR, SRV data).
///
/// Targets are absolute whether or not they carry a trailing dot; `@`
/// refers to the apex. IP literals and the bare root are rejected; callers
/// that allow a null target handle `.` before calling this.
pub fn normalize_target(target: &str, apex: &str) -> Result<String, ValidationError> {
    let target = target.trim();
    if target == "@" {
        return Ok(apex.to_string());
    }
    if target.is_empty() {
        return Err(ValidationError::value(
            ValidationErrorKind::MissingField,
            "target host is empty",
        ));
    }
    if target.bytes().all(|b| b == b'.') {
        return Err(ValidationError::value(
            ValidationErrorKind::InvalidHostname,
            "the root is not a valid target host",
        ));
    }
    if target.trim_end_matches('.').parse::<IpAddr>().is_ok() {
        return Err(ValidationError::value(
            ValidationErrorKind::InvalidHostname,
            format!("{} is an address, not a hostname", target),
        ));
    }

    let canonical = canonical(target);
    check_name(&canonical, NameRules::default()).map_err(|mut e| {
        e.field = crate::error::RecordField::Value;
        e.kind = ValidationErrorKind::InvalidHostname;
        e
    })?;
    Ok(canonical)
}
