//! Record validation and normalization.
//!
//! [`RecordValidator::validate`] checks a single record against the DNS-wide
//! name grammar and the rule of its type. [`zone_rules::check`] adds the
//! checks that need the rest of the zone.

pub mod rules;
pub mod text;
pub mod zone_rules;

use crate::error::{RecordField, ValidationError, ValidationErrorKind};
use crate::zone::constants::{DEFAULT_HOSTMASTER, DEFAULT_TTL, MAX_TTL};
use crate::zone::name::{self, NameRules};
use crate::zone::{NormalizedRecord, RecordType, ResourceRecord};
use rules::RuleInput;

/// Settings the validator needs from the engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// TTL given to records submitted without one
    pub default_ttl: u32,
    /// Mailbox inserted into SOA content that leaves it out
    pub hostmaster: String,
    /// Accept unquoted TXT content and split it into character strings
    pub txt_auto_quote: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            hostmaster: DEFAULT_HOSTMASTER.to_string(),
            txt_auto_quote: true,
        }
    }
}

/// Stateless record validator
#[derive(Debug, Clone, Default)]
pub struct RecordValidator {
    config: ValidatorConfig,
}

impl RecordValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a record for the zone rooted at `zone_apex` and return its
    /// canonical form. Nothing is normalized unless every check passes.
    pub fn validate(
        &self,
        record: &ResourceRecord,
        zone_apex: &str,
    ) -> Result<NormalizedRecord, ValidationError> {
        let apex = name::normalize_apex(zone_apex)?;
        let owner = name::qualify(&record.name, &apex)?;
        name::check_name(
            &owner,
            NameRules {
                allow_wildcard: record.rtype != RecordType::SOA,
            },
        )?;

        let ttl = self.check_ttl(record.ttl)?;
        if !record.rtype.has_priority() {
            rules::no_priority(record.priority)?;
        }

        let input = RuleInput {
            rtype: record.rtype,
            owner: &owner,
            apex: &apex,
            content: &record.content,
            priority: record.priority,
        };
        let output = rules::rule_for(record.rtype)(&input, &self.config)?;

        Ok(NormalizedRecord {
            name: owner,
            rtype: record.rtype,
            content: output.content,
            ttl,
            priority: output.priority,
        })
    }

    /// Parse a record type name, reporting unknown types against the type
    /// field
    pub fn parse_type(value: &str) -> Result<RecordType, ValidationError> {
        value.parse().map_err(|reason: String| {
            ValidationError::new(ValidationErrorKind::UnsupportedType, RecordField::Type, reason)
        })
    }

    fn check_ttl(&self, ttl: Option<i64>) -> Result<u32, ValidationError> {
        let Some(ttl) = ttl else {
            return Ok(self.config.default_ttl);
        };
        if !(0..=MAX_TTL).contains(&ttl) {
            return Err(ValidationError::new(
                ValidationErrorKind::InvalidTtl,
                RecordField::Ttl,
                format!("TTL {} must be between 0 and {}", ttl, MAX_TTL),
            ));
        }
        u32::try_from(ttl).map_err(|_| {
            ValidationError::new(
                ValidationErrorKind::InvalidTtl,
                RecordField::Ttl,
                format!("TTL {} does not fit in 32 bits", ttl),
            )
        })
    }
}
