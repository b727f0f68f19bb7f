mod common;

use common::*;
use std::io::Write;
use std::sync::Arc;
use zonewarden::clock::FixedClock;
use zonewarden::config::EngineConfig;
use zonewarden::coordinator::{RequestContext, ZoneMutationCoordinator};
use zonewarden::error::{ConfigError, PersistenceError};
use zonewarden::store::{MemoryZoneRepository, ZoneRepository};
use zonewarden::zone::RecordType;

#[test]
fn test_committed_state_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("zones.json");

    let zone_id = {
        let repository = Arc::new(MemoryZoneRepository::open(&path).unwrap());
        let zone_id = repository.create_zone(APEX, test_soa(2011052600)).unwrap().id;
        let coordinator = ZoneMutationCoordinator::new(
            repository,
            Arc::new(FixedClock::new(release_day())),
            &EngineConfig::default(),
        );
        coordinator
            .apply_batch(
                zone_id,
                &[
                    create("www", RecordType::A, "192.0.2.1"),
                    create("@", RecordType::TXT, "\"hello world\""),
                ],
                &RequestContext::new("loader"),
            )
            .unwrap();
        zone_id
    };

    let reopened = MemoryZoneRepository::open(&path).unwrap();
    let zone = reopened.load_zone(zone_id).unwrap();
    assert_eq!(zone.serial(), 2011052601);
    assert_eq!(zone.record_count(), 2);
    assert_eq!(zone.revision, 1);
    assert_eq!(reopened.find_zone("EXAMPLE.com").unwrap().id, zone_id);
}

#[test]
fn test_two_handles_on_one_file_keep_both_commits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zones.json");

    let first = Arc::new(MemoryZoneRepository::open(&path).unwrap());
    let zone_id = first.create_zone(APEX, test_soa(2011052600)).unwrap().id;
    let second = Arc::new(MemoryZoneRepository::open(&path).unwrap());

    let coordinator = |repository: &Arc<MemoryZoneRepository>| {
        ZoneMutationCoordinator::new(
            repository.clone(),
            Arc::new(FixedClock::new(release_day())),
            &EngineConfig::default(),
        )
    };
    let (first_writer, second_writer) = (coordinator(&first), coordinator(&second));

    let outcome = first_writer
        .apply_mutation(
            zone_id,
            create("a", RecordType::A, "192.0.2.1"),
            &RequestContext::new("first"),
        )
        .unwrap();
    assert_eq!(outcome.serial, 2011052601);

    // The second handle commits on top of the first one's write
    let outcome = second_writer
        .apply_mutation(
            zone_id,
            create("b", RecordType::A, "192.0.2.2"),
            &RequestContext::new("second"),
        )
        .unwrap();
    assert_eq!(outcome.previous_serial, 2011052601);
    assert_eq!(outcome.serial, 2011052602);
    assert_eq!(outcome.attempts, 2);

    let reopened = MemoryZoneRepository::open(&path).unwrap();
    let zone = reopened.load_zone(zone_id).unwrap();
    assert_eq!(zone.serial(), 2011052602);
    assert_eq!(zone.revision, 2);
    let mut names: Vec<_> = zone.records().map(|r| r.record.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["a.example.com.", "b.example.com."]);

    // Zone ids stay unique across handles
    assert_eq!(second.create_zone("example.org", test_soa(1)).unwrap().id.0, 2);
    assert!(first.create_zone("example.org", test_soa(1)).is_err());
}

#[test]
fn test_save_json_to_another_file() {
    let dir = tempfile::tempdir().unwrap();
    let (repository, zone_id) = create_test_repository(7);
    let copy = dir.path().join("copy.json");
    repository.save_json(&copy).unwrap();

    let loaded = MemoryZoneRepository::load_json(&copy).unwrap();
    assert_eq!(loaded.read_soa_serial(zone_id).unwrap(), 7);
    assert_eq!(loaded.snapshot(), repository.snapshot());
}

#[test]
fn test_corrupt_snapshot_is_reported() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{ not json").unwrap();
    assert!(matches!(
        MemoryZoneRepository::load_json(file.path()),
        Err(PersistenceError::Serialization(_))
    ));
}

#[test]
fn test_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "default_ttl = 3600").unwrap();
    writeln!(file, "hostmaster = \"dns@example.com\"").unwrap();
    writeln!(file, "max_commit_retries = 1").unwrap();
    file.flush().unwrap();

    let config = EngineConfig::from_toml_file(file.path()).unwrap();
    assert_eq!(config.default_ttl, 3600);
    assert_eq!(config.max_commit_retries, 1);
    assert_eq!(config.validator_config().hostmaster, "dns@example.com");

    assert!(matches!(
        EngineConfig::from_toml_file("/nonexistent/zonewarden.toml"),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn test_configured_default_ttl_reaches_records() {
    let (repository, zone_id) = create_test_repository(2011052600);
    let config = EngineConfig {
        default_ttl: 1800,
        ..Default::default()
    };
    let coordinator = ZoneMutationCoordinator::new(
        repository,
        Arc::new(FixedClock::new(release_day())),
        &config,
    );
    let outcome = coordinator
        .apply_mutation(
            zone_id,
            create("www", RecordType::A, "192.0.2.1"),
            &RequestContext::default(),
        )
        .unwrap();
    assert_eq!(outcome.created[0].record.ttl, 1800);
}
