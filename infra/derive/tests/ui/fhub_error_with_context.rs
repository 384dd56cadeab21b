use fhub_derive::fhub_error;
use std::borrow::Cow;

#[fhub_error]
pub enum DemoError {
    #[error("IO error{}: {source}", Self::format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", Self::format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn open(path: &str) -> Result<String, DemoError> {
    std::fs::read_to_string(path).with_context(|| format!("reading {path}"))
}

fn fail() -> Result<(), DemoError> {
    Err(DemoError::from("plain")).context("outer")
}

fn main() {
    let err = open("/definitely/not/here").unwrap_err();
    assert!(err.to_string().starts_with("IO error (reading /definitely/not/here)"));

    let err = fail().unwrap_err();
    assert_eq!(err.to_string(), "Internal error (outer): plain");
}
