use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at the string and file boundary of the core.
///
/// The simulation itself never fails: out-of-domain numbers are clamped and
/// bad `dt` values are zeroed. These variants only come back from parsing
/// external configuration messages and loading presets.
#[derive(Debug, Error)]
pub enum Error {
    /// A tag that names no variant of the target enum (e.g. `layout = "w12"`).
    #[error("unknown {field} value: {value:?}")]
    UnknownVariant { field: &'static str, value: String },

    /// A configuration field name that does not exist.
    #[error("unknown configuration field: {0:?}")]
    UnknownField(String),

    /// A numeric field whose value could not be parsed as a number.
    #[error("invalid number for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// No preset file with the requested name.
    #[error("preset not found: {0}")]
    PresetNotFound(String),

    /// Malformed preset YAML.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
