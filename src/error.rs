use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum Gcmt3dError {
    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    ConfigParse { path: Utf8PathBuf, message: String },

    #[error("config file {path} is missing required key `{key}`")]
    #[diagnostic(help("add the key to the input configuration"))]
    MissingConfigKey { path: Utf8PathBuf, key: String },

    #[error("unknown inversion parameter: {0}")]
    UnknownParameter(String),

    #[error("invalid event name: {0}")]
    InvalidEventName(String),

    #[error("failed to parse source solution {path}: {message}")]
    SolutionParse { path: Utf8PathBuf, message: String },

    #[error("cannot create workspace directory {path}: {message}")]
    Layout { path: Utf8PathBuf, message: String },

    #[error("artifact already written: {0}")]
    #[diagnostic(help("iteration artifacts are write-once; use a fresh (iteration, step) key"))]
    ArtifactExists(Utf8PathBuf),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(Utf8PathBuf),

    #[error("malformed artifact {path}: {message}")]
    ArtifactFormat { path: Utf8PathBuf, message: String },

    #[error("vector length {actual} does not match {expected} model parameters")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("no station files found in {0}")]
    NoStations(Utf8PathBuf),

    #[error("failed to parse station file {path}: {message}")]
    StationParse { path: Utf8PathBuf, message: String },

    #[error("fetch for event {event} failed: {message}")]
    Fetch { event: String, message: String },

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("synthetics processing failed: {0}")]
    ProcessStep(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
