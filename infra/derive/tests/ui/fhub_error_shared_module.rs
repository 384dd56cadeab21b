use fhub_derive::fhub_error;
use std::borrow::Cow;

#[fhub_error]
pub enum ParseError {
    #[error("Parse failed{}: {source}", Self::format_context(.context))]
    Number { source: std::num::ParseIntError, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", Self::format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

#[fhub_error]
pub enum LoadError {
    #[error("Load failed{}: {source}", Self::format_context(.context))]
    Parse { source: ParseError, context: Option<Cow<'static, str>> },

    #[error("IO error{}: {source}", Self::format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },
}

fn parse(raw: &str) -> Result<u16, ParseError> {
    raw.parse::<u16>().context("port")
}

fn load(raw: &str) -> Result<u16, LoadError> {
    LoadErrorExt::context(parse(raw), "server section")
}

fn main() {
    let err = load("eighty").unwrap_err();
    assert!(err.to_string().starts_with("Load failed (server section): Parse failed (port):"));

    let internal: ParseError = "boom".into();
    assert_eq!(internal.to_string(), "Internal error: boom");
}
