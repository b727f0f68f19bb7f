//! Per-type content rules. Each record type maps to one pure function.

use super::ValidatorConfig;
use super::text;
use crate::error::{RecordField, ValidationError, ValidationErrorKind};
use crate::zone::RecordType;
use crate::zone::constants::DEFAULT_PRIORITY;
use crate::zone::name::{self, NameRules};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// What a rule sees of the record being validated
pub(crate) struct RuleInput<'a> {
    pub rtype: RecordType,
    /// Canonical owner name
    pub owner: &'a str,
    /// Canonical zone apex
    pub apex: &'a str,
    pub content: &'a str,
    pub priority: Option<i64>,
}

/// Canonical content and priority produced by a rule
#[derive(Debug)]
pub(crate) struct RuleOutput {
    pub content: String,
    pub priority: Option<u16>,
}

impl RuleOutput {
    fn plain(content: String) -> Self {
        Self {
            content,
            priority: None,
        }
    }
}

type Rule = fn(&RuleInput<'_>, &ValidatorConfig) -> Result<RuleOutput, ValidationError>;

pub(crate) fn rule_for(rtype: RecordType) -> Rule {
    match rtype {
        RecordType::CAA => caa,
        RecordType::CNAME => cname,
        RecordType::DS => ds,
        RecordType::HINFO => hinfo,
        RecordType::LOC => loc,
        RecordType::MX => mx,
        RecordType::SOA => soa,
        RecordType::SPF => spf,
        RecordType::SRV => srv,
        other if other.has_address() => address,
        other if other.has_text() => txt,
        // NS and PTR
        _ => host_target,
    }
}

fn address(input: &RuleInput<'_>, _: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    let raw = input.content.trim();
    let (family, parsed) = if input.rtype == RecordType::AAAA {
        ("IPv6", raw.parse::<Ipv6Addr>().ok().map(IpAddr::V6))
    } else {
        ("IPv4", raw.parse::<Ipv4Addr>().ok().map(IpAddr::V4))
    };
    let addr = parsed.ok_or_else(|| {
        ValidationError::value(
            ValidationErrorKind::InvalidAddress,
            format!("'{}' is not an {} address", raw, family),
        )
    })?;
    Ok(RuleOutput::plain(addr.to_string()))
}

fn host_target(input: &RuleInput<'_>, _: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    let fields = split_fields(input.content, 1, 1)?;
    Ok(RuleOutput::plain(name::normalize_target(
        fields[0],
        input.apex,
    )?))
}

fn cname(input: &RuleInput<'_>, config: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    if input.owner == input.apex {
        return Err(ValidationError::name(
            ValidationErrorKind::ApexAlias,
            "a CNAME cannot be placed at the zone apex",
        ));
    }
    let output = host_target(input, config)?;
    if output.content == input.owner {
        return Err(ValidationError::value(
            ValidationErrorKind::InvalidHostname,
            "a CNAME cannot point to itself",
        ));
    }
    Ok(output)
}

fn mx(input: &RuleInput<'_>, _: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    let fields = split_fields(input.content, 1, 2)?;
    let (inline, exchange) = if fields.len() == 2 {
        (Some(fields[0]), fields[1])
    } else {
        (None, fields[0])
    };
    // "." is a null MX (RFC 7505)
    let exchange = if exchange == "." {
        ".".to_string()
    } else {
        name::normalize_target(exchange, input.apex)?
    };
    Ok(RuleOutput {
        content: exchange,
        priority: Some(resolve_priority(input.priority, inline)?),
    })
}

fn srv(input: &RuleInput<'_>, _: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    let mut labels = input.owner.split('.');
    let service_ok = labels.next().is_some_and(is_service_label);
    let proto_ok = labels.next().is_some_and(is_service_label);
    let has_host = labels.next().is_some_and(|label| !label.is_empty());
    if !(service_ok && proto_ok && has_host) {
        return Err(ValidationError::name(
            ValidationErrorKind::InvalidServiceName,
            "SRV names must have the form _service._protocol.host",
        ));
    }

    let fields = split_fields(input.content, 3, 4)?;
    // Four fields means the priority leads the content
    let (inline, rest) = if fields.len() == 4 {
        (Some(fields[0]), &fields[1..])
    } else {
        (None, &fields[..])
    };

    let weight = parse_u16(rest[0], "weight")?;
    let port = parse_u16(rest[1], "port")?;
    let target = rest[2];
    let target = if target == "." {
        ".".to_string()
    } else {
        name::normalize_target(target, input.apex)?
    };

    Ok(RuleOutput {
        content: format!("{} {} {}", weight, port, target),
        priority: Some(resolve_priority(input.priority, inline)?),
    })
}

fn txt(input: &RuleInput<'_>, config: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    let segments = text::parse_character_strings(input.content, config.txt_auto_quote)?;
    Ok(RuleOutput::plain(text::format_character_strings(&segments)))
}

/// SPF policy in quoted character strings (RFC 7208 §12 grammar)
fn spf(input: &RuleInput<'_>, _: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    let segments = text::parse_character_strings(input.content, false)?;
    let policy = segments.concat();
    let policy = std::str::from_utf8(&policy).map_err(|_| {
        ValidationError::value(ValidationErrorKind::InvalidText, "SPF policy must be ASCII")
    })?;

    let mut terms = policy.split(' ').filter(|term| !term.is_empty());
    if !terms.next().is_some_and(|v| v.eq_ignore_ascii_case("v=spf1")) {
        return Err(ValidationError::value(
            ValidationErrorKind::InvalidText,
            "SPF policy must start with v=spf1",
        ));
    }
    for term in terms {
        if !is_spf_term(term) {
            return Err(ValidationError::value(
                ValidationErrorKind::InvalidText,
                format!("'{}' is not a valid SPF mechanism or modifier", term),
            ));
        }
    }

    Ok(RuleOutput::plain(text::format_character_strings(&segments)))
}

fn is_spf_term(term: &str) -> bool {
    let body = term.strip_prefix(['+', '-', '?', '~']);
    let qualified = body.is_some();
    let body = body.unwrap_or(term);

    let split = body.find([':', '/']).unwrap_or(body.len());
    let (mechanism, rest) = body.split_at(split);
    match mechanism.to_ascii_lowercase().as_str() {
        "all" => rest.is_empty(),
        "include" | "exists" => rest.strip_prefix(':').is_some_and(is_domain_spec),
        "ptr" => rest.is_empty() || rest.strip_prefix(':').is_some_and(is_domain_spec),
        "a" | "mx" => {
            let (domain, cidr) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
            (domain.is_empty() || domain.strip_prefix(':').is_some_and(is_domain_spec))
                && is_dual_cidr(cidr)
        }
        "ip4" => rest
            .strip_prefix(':')
            .is_some_and(|net| is_network(net, false)),
        "ip6" => rest
            .strip_prefix(':')
            .is_some_and(|net| is_network(net, true)),
        // Modifiers (name=value) take no qualifier
        _ => !qualified && is_spf_modifier(term),
    }
}

fn is_spf_modifier(term: &str) -> bool {
    let Some((name, value)) = term.split_once('=') else {
        return false;
    };
    name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
        && value.chars().all(|c| c.is_ascii_graphic())
}

fn is_domain_spec(spec: &str) -> bool {
    !spec.is_empty() && spec.chars().all(|c| c.is_ascii_graphic())
}

fn is_prefix_len(value: &str, max: u8) -> bool {
    !value.starts_with('0') && value.parse::<u8>().is_ok_and(|n| (1..=max).contains(&n))
}

/// `/v4`, `//v6` or `/v4//v6`
fn is_dual_cidr(cidr: &str) -> bool {
    let (v4, v6) = match cidr.find("//") {
        Some(index) => (&cidr[..index], Some(&cidr[index + 2..])),
        None => (cidr, None),
    };
    (v4.is_empty() || v4.strip_prefix('/').is_some_and(|n| is_prefix_len(n, 32)))
        && v6.is_none_or(|n| is_prefix_len(n, 128))
}

fn is_network(network: &str, v6: bool) -> bool {
    let (addr, prefix) = match network.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (network, None),
    };
    let (addr_ok, max) = if v6 {
        (addr.parse::<Ipv6Addr>().is_ok(), 128)
    } else {
        (addr.parse::<Ipv4Addr>().is_ok(), 32)
    };
    addr_ok && prefix.is_none_or(|p| is_prefix_len(p, max))
}

/// Host information: CPU and OS, quoted or as single words
fn hinfo(input: &RuleInput<'_>, _: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    let content = input.content.trim();
    let fields: Vec<Vec<u8>> = if content.starts_with('"') {
        text::parse_character_strings(content, false)?
    } else {
        content
            .split_whitespace()
            .map(|field| field.as_bytes().to_vec())
            .collect()
    };
    check_count(fields.len(), 2, 2)?;

    for field in &fields {
        if field.is_empty() || field.len() > text::MAX_SEGMENT_LENGTH {
            return Err(ValidationError::value(
                ValidationErrorKind::InvalidText,
                format!(
                    "HINFO fields must be 1 to {} bytes",
                    text::MAX_SEGMENT_LENGTH
                ),
            ));
        }
    }
    Ok(RuleOutput::plain(text::format_character_strings(&fields)))
}

/// Geographic location (RFC 1876 presentation format)
fn loc(input: &RuleInput<'_>, _: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    let tokens: Vec<&str> = input.content.split_whitespace().collect();
    let mut out = Vec::with_capacity(tokens.len());
    let mut pos = 0;

    loc_coordinate(&tokens, &mut pos, 90, ['N', 'S'], &mut out)?;
    loc_coordinate(&tokens, &mut pos, 180, ['E', 'W'], &mut out)?;

    let altitude = tokens.get(pos).ok_or_else(|| {
        ValidationError::value(ValidationErrorKind::MissingField, "LOC altitude is missing")
    })?;
    out.push(loc_meters(altitude, "altitude", -100_000.0, 42_849_672.95)?);
    pos += 1;

    // Optional size, horizontal and vertical precision
    for label in ["size", "horizontal precision", "vertical precision"] {
        let Some(token) = tokens.get(pos) else {
            break;
        };
        out.push(loc_meters(token, label, 0.0, 90_000_000.0)?);
        pos += 1;
    }

    if pos < tokens.len() {
        return Err(ValidationError::value(
            ValidationErrorKind::ExtraField,
            format!("unexpected LOC field '{}'", tokens[pos]),
        ));
    }
    Ok(RuleOutput::plain(out.join(" ")))
}

/// Degrees, optional minutes and seconds, then the hemisphere letter
fn loc_coordinate(
    tokens: &[&str],
    pos: &mut usize,
    max_degrees: u32,
    hemispheres: [char; 2],
    out: &mut Vec<String>,
) -> Result<(), ValidationError> {
    let limits = [(max_degrees, 0, "degrees"), (59, 0, "minutes"), (59, 3, "seconds")];
    for (index, (max, decimals, label)) in limits.into_iter().enumerate() {
        let token = tokens.get(*pos).ok_or_else(|| {
            ValidationError::value(
                ValidationErrorKind::MissingField,
                format!("LOC coordinate needs a {} or {} hemisphere", hemispheres[0], hemispheres[1]),
            )
        })?;
        if index > 0 && is_hemisphere(token, hemispheres) {
            break;
        }
        let value = parse_decimal(token, decimals).filter(|v| (0.0..=f64::from(max)).contains(v));
        if value.is_none() {
            return Err(ValidationError::value(
                ValidationErrorKind::InvalidNumber,
                format!("LOC {} '{}' must be 0 to {}", label, token, max),
            ));
        }
        out.push(token.to_string());
        *pos += 1;
    }

    match tokens.get(*pos) {
        Some(token) if is_hemisphere(token, hemispheres) => {
            out.push(token.to_ascii_uppercase());
            *pos += 1;
            Ok(())
        }
        other => Err(ValidationError::value(
            ValidationErrorKind::InvalidText,
            format!(
                "expected {} or {}, got '{}'",
                hemispheres[0],
                hemispheres[1],
                other.copied().unwrap_or("")
            ),
        )),
    }
}

fn is_hemisphere(token: &str, hemispheres: [char; 2]) -> bool {
    let mut chars = token.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), None) if hemispheres.contains(&c.to_ascii_uppercase())
    )
}

/// A distance in meters with an optional `m` suffix and two decimals
fn loc_meters(token: &str, label: &str, min: f64, max: f64) -> Result<String, ValidationError> {
    let number = token.strip_suffix(['m', 'M']).unwrap_or(token);
    parse_decimal(number, 2)
        .filter(|v| (min..=max).contains(v))
        .map(|_| format!("{}m", number))
        .ok_or_else(|| {
            ValidationError::value(
                ValidationErrorKind::InvalidNumber,
                format!("LOC {} '{}' must be {} to {} meters", label, token, min, max),
            )
        })
}

/// Parse `[-]digits[.digits]` with at most `max_decimals` fraction digits
fn parse_decimal(value: &str, max_decimals: usize) -> Option<f64> {
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let fraction_ok = fraction.is_none_or(|f| digits(f) && f.len() <= max_decimals);
    if !digits(whole) || !fraction_ok {
        return None;
    }
    value.parse().ok()
}

/// Delegation signer: key tag, algorithm, digest type and hex digest
fn ds(input: &RuleInput<'_>, _: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    let fields = split_fields(input.content, 4, usize::MAX)?;
    let key_tag = parse_u16(fields[0], "key tag")?;
    let algorithm = parse_u8(fields[1], "algorithm")?;
    let digest_type = parse_u8(fields[2], "digest type")?;

    // Long digests are often presented in several chunks
    let digest = fields[3..].concat().to_ascii_lowercase();
    if !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ValidationError::value(
            ValidationErrorKind::InvalidText,
            "DS digest must be hexadecimal",
        ));
    }
    let expected = match digest_type {
        1 => Some(40),
        2 => Some(64),
        4 => Some(96),
        _ => None,
    };
    let length_ok = match expected {
        Some(len) => digest.len() == len,
        None => digest.len() % 2 == 0,
    };
    if !length_ok {
        return Err(ValidationError::value(
            ValidationErrorKind::InvalidText,
            format!(
                "DS digest of {} hex digits does not fit digest type {}",
                digest.len(),
                digest_type
            ),
        ));
    }

    Ok(RuleOutput::plain(format!(
        "{} {} {} {}",
        key_tag, algorithm, digest_type, digest
    )))
}

fn caa(input: &RuleInput<'_>, _: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    let missing = || {
        ValidationError::value(
            ValidationErrorKind::MissingField,
            "CAA records need flags, tag and value",
        )
    };
    let (flags, rest) = input
        .content
        .trim()
        .split_once(char::is_whitespace)
        .ok_or_else(missing)?;
    let (tag, value) = rest
        .trim_start()
        .split_once(char::is_whitespace)
        .ok_or_else(missing)?;

    let flags: u8 = flags.parse().map_err(|_| {
        ValidationError::value(
            ValidationErrorKind::InvalidNumber,
            format!("CAA flags '{}' must be 0 to 255", flags),
        )
    })?;
    if tag.is_empty() || tag.len() > 15 || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::value(
            ValidationErrorKind::InvalidText,
            format!("CAA tag '{}' must be 1 to 15 letters or digits", tag),
        ));
    }

    let value = value.trim();
    let value = if value.starts_with('"') {
        match text::parse_character_strings(value, false)?.as_slice() {
            [single] => single.clone(),
            _ => {
                return Err(ValidationError::value(
                    ValidationErrorKind::ExtraField,
                    "CAA value must be a single string",
                ));
            }
        }
    } else {
        value.as_bytes().to_vec()
    };

    Ok(RuleOutput::plain(format!(
        "{} {} {}",
        flags,
        tag.to_ascii_lowercase(),
        text::format_segment(&value)
    )))
}

fn soa(input: &RuleInput<'_>, config: &ValidatorConfig) -> Result<RuleOutput, ValidationError> {
    if input.owner != input.apex {
        return Err(ValidationError::name(
            ValidationErrorKind::NotAtApex,
            "the SOA record must be at the zone apex",
        ));
    }

    let mut fields: Vec<&str> = input.content.split_whitespace().collect();
    // A numeric second field means the mailbox was left out
    if fields.len() > 1 && fields[1].chars().all(|c| c.is_ascii_digit()) {
        fields.insert(1, &config.hostmaster);
    }
    let fields = bounded(fields, 7, 7)?;

    let mname = name::normalize_target(fields[0], input.apex)?;
    let rname = normalize_mailbox(fields[1])?;
    let numbers = fields[2..]
        .iter()
        .zip(["serial", "refresh", "retry", "expire", "minimum"])
        .map(|(value, label)| {
            value.parse::<u32>().map_err(|_| {
                ValidationError::value(
                    ValidationErrorKind::InvalidNumber,
                    format!("SOA {} '{}' is not a 32-bit unsigned number", label, value),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RuleOutput::plain(format!(
        "{} {} {}",
        mname,
        rname,
        numbers
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    )))
}

/// Convert a mailbox to domain-name form (`hostmaster@example.com` becomes
/// `hostmaster.example.com.`)
pub(crate) fn normalize_mailbox(mailbox: &str) -> Result<String, ValidationError> {
    let mailbox = mailbox.trim();
    let dotted = match mailbox.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.contains('@') => {
            format!("{}.{}", local, domain)
        }
        Some(_) => {
            return Err(ValidationError::value(
                ValidationErrorKind::InvalidMailbox,
                format!("'{}' is not a valid mailbox", mailbox),
            ));
        }
        None => mailbox.to_string(),
    };

    let canonical = name::canonical(&dotted);
    if canonical == "." {
        return Err(ValidationError::value(
            ValidationErrorKind::InvalidMailbox,
            "mailbox is empty",
        ));
    }
    name::check_name(&canonical, NameRules::default()).map_err(|e| {
        ValidationError::value(
            ValidationErrorKind::InvalidMailbox,
            format!("mailbox {}: {}", mailbox, e.reason),
        )
    })?;
    Ok(canonical)
}

fn is_service_label(label: &str) -> bool {
    label.len() > 1
        && label.starts_with('_')
        && label[1..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn split_fields(content: &str, min: usize, max: usize) -> Result<Vec<&str>, ValidationError> {
    bounded(content.split_whitespace().collect(), min, max)
}

fn bounded(fields: Vec<&str>, min: usize, max: usize) -> Result<Vec<&str>, ValidationError> {
    check_count(fields.len(), min, max)?;
    Ok(fields)
}

fn check_count(count: usize, min: usize, max: usize) -> Result<(), ValidationError> {
    if count < min {
        return Err(ValidationError::value(
            ValidationErrorKind::MissingField,
            format!("expected at least {} fields, got {}", min, count),
        ));
    }
    if count > max {
        return Err(ValidationError::value(
            ValidationErrorKind::ExtraField,
            format!("expected at most {} fields, got {}", max, count),
        ));
    }
    Ok(())
}

fn parse_u16(value: &str, label: &str) -> Result<u16, ValidationError> {
    value.parse().map_err(|_| {
        ValidationError::value(
            ValidationErrorKind::InvalidNumber,
            format!("{} '{}' must be 0 to 65535", label, value),
        )
    })
}

fn parse_u8(value: &str, label: &str) -> Result<u8, ValidationError> {
    value.parse().map_err(|_| {
        ValidationError::value(
            ValidationErrorKind::InvalidNumber,
            format!("{} '{}' must be 0 to 255", label, value),
        )
    })
}

fn priority_error(reason: impl Into<String>) -> ValidationError {
    ValidationError::new(
        ValidationErrorKind::InvalidPriority,
        RecordField::Priority,
        reason,
    )
}

/// Types without a priority accept only an absent or zero one
pub(crate) fn no_priority(priority: Option<i64>) -> Result<(), ValidationError> {
    match priority {
        None | Some(0) => Ok(()),
        Some(p) => Err(priority_error(format!(
            "this record type has no priority, got {}",
            p
        ))),
    }
}

/// Pick the priority from the priority field or the content, which must
/// agree when both are given
fn resolve_priority(field: Option<i64>, inline: Option<&str>) -> Result<u16, ValidationError> {
    let inline = inline
        .map(|value| {
            value
                .parse::<u16>()
                .map_err(|_| priority_error(format!("priority '{}' must be 0 to 65535", value)))
        })
        .transpose()?;
    let field = field
        .map(|value| {
            u16::try_from(value)
                .map_err(|_| priority_error(format!("priority {} must be 0 to 65535", value)))
        })
        .transpose()?;

    match (field, inline) {
        (Some(a), Some(b)) if a != b => Err(priority_error(format!(
            "priority field {} disagrees with content priority {}",
            a, b
        ))),
        (Some(p), _) | (None, Some(p)) => Ok(p),
        (None, None) => Ok(DEFAULT_PRIORITY),
    }
}
