pub mod name;
pub mod record;
pub mod soa;
#[allow(clippy::module_inception)]
pub mod zone;

pub use record::{
    NormalizedRecord, RecordChange, RecordId, RecordType, ResourceRecord, StoredRecord, ZoneId,
};
pub use soa::SoaRecord;
pub use zone::{AppliedChange, StagedChange, Zone, ZoneStats};

/// Zone constants
pub mod constants {
    /// Default TTL if not specified (1 day)
    pub const DEFAULT_TTL: u32 = 86400;

    /// Largest TTL a record may carry (RFC 2181)
    pub const MAX_TTL: i64 = 2_147_483_647;

    /// Priority given to MX and SRV records submitted without one
    pub const DEFAULT_PRIORITY: u16 = 10;

    /// Default responsible mailbox for SOA records that omit it
    pub const DEFAULT_HOSTMASTER: &str = "hostmaster.example.com.";
}
