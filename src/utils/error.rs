use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunbookError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Settings file error: {0}")]
    SettingsError(#[from] toml::de::Error),

    #[error("Command `{command}` failed on {node}: {output}")]
    RemoteExecutionError {
        node: String,
        command: String,
        output: String,
    },

    #[error("Unexpected output from `{command}`: {reason}")]
    MalformedOutput { command: String, reason: String },

    #[error("Timed out after {waited_secs}s waiting for {what}: {last_state}")]
    Timeout {
        what: String,
        waited_secs: u64,
        last_state: String,
    },

    #[error("The cluster is currently in an unhealthy status:\n{details}")]
    ClusterUnhealthy { details: String },

    #[error("Unable to change flag `{flag}` on the cluster, got output: {output}")]
    FlagChangeError { flag: String, output: String },

    #[error("Unable to find any other mon node to control the cluster: {details}")]
    NoControllerNode { details: String },

    #[error("The network is not healthy:\n{details}")]
    NetworkUnhealthy { details: String },

    #[error("Agents on {host} did not settle as admin {wanted}")]
    AgentTransitionError { host: String, wanted: String },

    #[error("Grid operation failed: {message}")]
    GridError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value `{value}` for {field}: {reason}")]
    ValidationError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Aborted by the operator")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, RunbookError>;
