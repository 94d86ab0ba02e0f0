use thiserror::Error;

pub type LetheResult<T, E = LetheError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum LetheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tree-sitter error: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unsupported syntax `{kind}` at line {line}")]
    Unsupported { kind: String, line: usize },

    #[error("malformed generated-functions list: {0}")]
    Marker(#[from] serde_json::Error),

    #[error("{0}")]
    Msg(String),
}

impl From<&str> for LetheError {
    fn from(s: &str) -> Self {
        LetheError::Msg(s.to_owned())
    }
}

impl From<String> for LetheError {
    fn from(s: String) -> Self {
        LetheError::Msg(s)
    }
}

#[test]
fn io_conversion_retains_message() {
    let e = std::io::Error::other("boom!");
    let l: LetheError = e.into();
    assert!(matches!(l, LetheError::Io(_)));
    assert!(l.to_string().contains("boom"));
}

#[test]
fn simple_string_into_msg() {
    let l: LetheError = "plain msg".into();
    assert!(matches!(l, LetheError::Msg(s) if s == "plain msg"));
}

#[test]
fn marker_conversion_maps_correct_variant() {
    let bad = serde_json::from_str::<Vec<String>>("not json").unwrap_err();
    let l: LetheError = bad.into();
    assert!(matches!(l, LetheError::Marker(_)));
}
