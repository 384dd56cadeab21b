use fhub_logger::{LevelFilter, Logger, LoggerError, parse_rotation};
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

#[test]
fn json_file_output_respects_level_and_owns_the_subscriber() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    let logger = Logger::builder()
        .name("fhub-json")
        .console(false)
        .path(dir.path())
        .file_json(true)
        .rotation(parse_rotation("never")?)
        .max_files(1)
        .level(LevelFilter::INFO)
        .init()?;
    assert!(logger.guard().is_some(), "file output keeps a writer guard");

    tracing::info!(feature = "constants", "Feature started");
    tracing::debug!("below the configured level");

    let second = Logger::builder().name("fhub-second").init().expect_err("subscriber already installed");
    assert!(matches!(second, LoggerError::Subscriber { .. }));

    logger.flush();
    drop(logger);

    let content = fs::read_to_string(dir.path().join("fhub-json.log"))?;
    let events: Vec<Value> = content.lines().map(serde_json::from_str).collect::<Result<_, _>>()?;

    let started = events
        .iter()
        .find(|event| event["fields"]["message"] == "Feature started")
        .expect("info event written as JSON");
    assert_eq!(started["level"], "INFO");
    assert_eq!(started["fields"]["feature"], "constants");
    assert!(!content.contains("below the configured level"));
    Ok(())
}
