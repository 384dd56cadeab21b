use fhub_logger::{Logger, LoggerError};
use std::fs;
use tempfile::tempdir;

#[test]
fn file_in_place_of_log_directory_is_an_io_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let occupied = dir.path().join("logs");
    fs::write(&occupied, "not a directory")?;

    let err = Logger::builder().name("fhub-blocked").path(&occupied).init().expect_err("cannot create directory");

    match err {
        LoggerError::Io { context: Some(context), .. } => {
            assert!(context.contains(&occupied.display().to_string()), "{context}");
        }
        other => panic!("expected an IO error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn zero_max_files_with_file_output_is_rejected() {
    let err = Logger::builder()
        .name("fhub-no-files")
        .path("/tmp/fhub-never-created")
        .max_files(0)
        .init()
        .expect_err("no files to keep");

    assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
}
