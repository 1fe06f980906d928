//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable (see `config::ControllerConfig`).

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default number of resources reconciled in parallel
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Default timeout for a single Kubernetes API call against a native secret (seconds)
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 10;

/// Default number of attempts for a transient native secret API failure
pub const DEFAULT_API_MAX_ATTEMPTS: u32 = 3;

/// Default exponential backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default number of permanent failures before a resource is marked Degraded
pub const DEFAULT_MAX_PERMANENT_FAILURES: u32 = 5;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default periodic resync after a successful reconciliation (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Finalizer placed on every AgeSecret so deletions are observed
pub const FINALIZER_NAME: &str = "agesecrets.pyvo.io/cleanup";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "age-secret-controller";

/// Label key marking native secrets written by this controller
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Label value for [`MANAGED_BY_LABEL`]
pub const MANAGED_BY_VALUE: &str = "age-secret-controller";

/// Annotation on a native secret naming the AgeSecret that produced it
pub const OWNER_ANNOTATION: &str = "pyvo.io/age-secret";

/// Default data key inside `ageSecretRef` holding the identity
pub const DEFAULT_IDENTITY_KEY: &str = "secretKey";
