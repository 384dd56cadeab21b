use fhub_derive::fhub_error;
use std::borrow::Cow;

#[fhub_error]
pub enum StageError {
    #[error("IO error{}: {source}", Self::format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Stage '{stage}' failed{}: {source}", Self::format_context(.context))]
    Stage { stage: String, source: std::io::Error, context: Option<Cow<'static, str>> },
}

fn main() {
    let err: StageError = std::io::Error::other("disk").into();
    assert!(matches!(err, StageError::Io { .. }));

    let err = StageError::Stage { stage: "load".into(), source: std::io::Error::other("disk"), context: None };
    let err = Err::<(), _>(err).context("retry").unwrap_err();
    assert_eq!(err.to_string(), "Stage 'load' failed (retry): disk");
}
