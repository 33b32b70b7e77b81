//! Store Errors
//!
//! Fatal conditions are returned as [`StoreError`]. Failures of asynchronous
//! access hooks are a different kind of thing: they are captured as
//! [`HookError`] into the access cache and only surface through
//! [`Store::get_meta`](crate::Store::get_meta).

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The root path may only hold an object.
    #[error("the root path can only be written with an object, got {found}")]
    RootNotObject { found: &'static str },

    /// A key passed to a subscription or write is not a valid dot path.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// A non-numeric segment was used to index into an array.
    #[error("cannot index the array at {path:?} with segment {segment:?}")]
    InvalidIndex { path: String, segment: String },

    #[error("model {0:?} is already registered")]
    DuplicateModel(String),

    /// A computed value read itself before it had ever produced a value.
    #[error("computed value read itself before producing a first value")]
    CyclicComputed,

    #[error("invalid store configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Error produced by an asynchronous access hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// Short name of a value's variant, used in error messages.
pub(crate) fn kind_of(value: Option<&serde_json::Value>) -> &'static str {
    use serde_json::Value;
    match value {
        None => "nothing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "a boolean",
        Some(Value::Number(_)) => "a number",
        Some(Value::String(_)) => "a string",
        Some(Value::Array(_)) => "an array",
        Some(Value::Object(_)) => "an object",
    }
}
