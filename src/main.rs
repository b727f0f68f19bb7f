use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zonewarden::clock::{Clock, SystemClock};
use zonewarden::config::EngineConfig;
use zonewarden::coordinator::{RequestContext, ZoneMutationCoordinator};
use zonewarden::serial::{self, SerialFormat};
use zonewarden::store::{MemoryZoneRepository, ZoneRepository};
use zonewarden::validation::RecordValidator;
use zonewarden::zone::{RecordChange, RecordId, RecordType, ResourceRecord, SoaRecord, ZoneId};

#[derive(Parser, Debug)]
#[command(author, version, about = "DNS zone record and serial management", long_about = None)]
struct Args {
    /// TOML configuration file; ZONEWARDEN_* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON zone store, overriding the configured store path
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Name recorded as the requester of mutations
    #[arg(long, default_value = "cli")]
    requester: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the serial that follows CURRENT
    NextSerial {
        current: u32,
        /// Date to compute for (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Validate a record without storing it
    Validate {
        /// Zone apex the record belongs to
        apex: String,
        #[command(flatten)]
        record: RecordArgs,
    },

    /// Create an empty zone
    CreateZone {
        apex: String,
        /// SOA content: "mname rname serial refresh retry expire minimum"
        soa: String,
        #[arg(long, allow_negative_numbers = true)]
        ttl: Option<i64>,
    },

    /// Add a record to a zone
    Add {
        /// Zone id or apex
        zone: String,
        #[command(flatten)]
        record: RecordArgs,
    },

    /// Replace a record
    Update {
        /// Zone id or apex
        zone: String,
        id: u64,
        #[command(flatten)]
        record: RecordArgs,
    },

    /// Delete a record
    Delete {
        /// Zone id or apex
        zone: String,
        id: u64,
    },

    /// Bump a zone's serial without changing its records
    BumpSerial {
        /// Zone id or apex
        zone: String,
    },

    /// Show one zone, or list all zones
    Show {
        /// Zone id or apex
        zone: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct RecordArgs {
    /// Owner name, relative to the apex or absolute with a trailing dot
    name: String,

    #[arg(value_name = "TYPE", value_parser = parse_record_type)]
    rtype: RecordType,

    /// Record data in presentation format
    content: String,

    #[arg(long, allow_negative_numbers = true)]
    ttl: Option<i64>,

    #[arg(long, allow_negative_numbers = true)]
    priority: Option<i64>,
}

impl RecordArgs {
    fn into_record(self) -> ResourceRecord {
        ResourceRecord {
            name: self.name,
            rtype: self.rtype,
            content: self.content,
            ttl: self.ttl,
            priority: self.priority,
        }
    }
}

fn parse_record_type(value: &str) -> Result<RecordType, String> {
    RecordValidator::parse_type(value).map_err(|e| e.reason)
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() -> CliResult<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::default(),
    }
    .with_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let clock = config.clock()?;
    debug!("Configuration: {:?}", config);

    let output = match args.command {
        Command::NextSerial { current, date } => {
            let today = date.unwrap_or_else(|| clock.today());
            let next = serial::next_serial(current, today)?;
            json!({
                "current": current,
                "next": next,
                "stored": SerialFormat::of(current),
            })
        }
        Command::Validate { apex, record } => {
            let validator = RecordValidator::new(config.validator_config());
            serde_json::to_value(validator.validate(&record.into_record(), &apex)?)?
        }
        Command::CreateZone { apex, soa, ttl } => {
            let repository = open_store(&args.store, &config)?;
            let validator = RecordValidator::new(config.validator_config());
            let record = ResourceRecord {
                ttl,
                ..ResourceRecord::new("@", RecordType::SOA, soa)
            };
            let normalized = validator.validate(&record, &apex)?;
            let soa = SoaRecord::from_normalized(&normalized)
                .ok_or("SOA content must have seven fields")?;
            serde_json::to_value(repository.create_zone(&apex, soa)?)?
        }
        Command::Add { zone, record } => {
            let coordinator = coordinator(&args.store, &config, clock)?;
            let zone_id = resolve_zone(coordinator.repository(), &zone)?;
            let outcome = coordinator.apply_mutation(
                zone_id,
                RecordChange::Create(record.into_record()),
                &RequestContext::new(&args.requester),
            )?;
            serde_json::to_value(outcome)?
        }
        Command::Update { zone, id, record } => {
            let coordinator = coordinator(&args.store, &config, clock)?;
            let zone_id = resolve_zone(coordinator.repository(), &zone)?;
            let change = match record.rtype {
                RecordType::SOA => RecordChange::UpdateSoa(record.into_record()),
                _ => RecordChange::Update {
                    id: RecordId(id),
                    record: record.into_record(),
                },
            };
            let outcome =
                coordinator.apply_mutation(zone_id, change, &RequestContext::new(&args.requester))?;
            serde_json::to_value(outcome)?
        }
        Command::Delete { zone, id } => {
            let coordinator = coordinator(&args.store, &config, clock)?;
            let zone_id = resolve_zone(coordinator.repository(), &zone)?;
            let outcome = coordinator.apply_mutation(
                zone_id,
                RecordChange::Delete { id: RecordId(id) },
                &RequestContext::new(&args.requester),
            )?;
            serde_json::to_value(outcome)?
        }
        Command::BumpSerial { zone } => {
            let coordinator = coordinator(&args.store, &config, clock)?;
            let zone_id = resolve_zone(coordinator.repository(), &zone)?;
            let outcome =
                coordinator.bump_serial(zone_id, &RequestContext::new(&args.requester))?;
            serde_json::to_value(outcome)?
        }
        Command::Show { zone: Some(zone) } => {
            let repository = open_store(&args.store, &config)?;
            let zone_id = resolve_zone(&repository, &zone)?;
            let zone = repository.load_zone(zone_id)?;
            json!({
                "zone": zone,
                "stats": zone.stats(),
            })
        }
        Command::Show { zone: None } => {
            let repository = open_store(&args.store, &config)?;
            let zones: Vec<_> = repository
                .list_zones()
                .into_iter()
                .map(|(id, apex)| json!({ "id": id, "apex": apex }))
                .collect();
            json!(zones)
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn open_store(store: &Option<PathBuf>, config: &EngineConfig) -> CliResult<MemoryZoneRepository> {
    let path = store
        .as_ref()
        .or(config.store_path.as_ref())
        .ok_or("no zone store configured (use --store or ZONEWARDEN_STORE_PATH)")?;
    Ok(MemoryZoneRepository::open(path)?)
}

fn coordinator(
    store: &Option<PathBuf>,
    config: &EngineConfig,
    clock: SystemClock,
) -> CliResult<ZoneMutationCoordinator<MemoryZoneRepository, SystemClock>> {
    let repository = Arc::new(open_store(store, config)?);
    Ok(ZoneMutationCoordinator::new(repository, clock, config))
}

/// Accept either a numeric zone id or an apex name
fn resolve_zone(repository: &MemoryZoneRepository, zone: &str) -> CliResult<ZoneId> {
    if let Ok(id) = zone.parse::<u64>() {
        return Ok(ZoneId(id));
    }
    repository
        .find_zone(zone)
        .map(|z| z.id)
        .ok_or_else(|| format!("zone {} not found", zone).into())
}
