pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod serial;
pub mod store;
pub mod validation;
pub mod zone;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use coordinator::{MutationOutcome, MutationStage, RequestContext, ZoneMutationCoordinator};
pub use error::{MutationError, PersistenceError, SerialError, ValidationError};
pub use serial::next_serial;
pub use store::{MemoryZoneRepository, ZoneRepository};
pub use validation::RecordValidator;
pub use zone::{RecordChange, RecordType, ResourceRecord, Zone, ZoneId};
