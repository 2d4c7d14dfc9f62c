//! # Constants
//!
//! Label keys, condition vocabulary, and controller-wide defaults.

use std::time::Duration;

/// Name reported in `managed-by` labels and used as the field manager for status patches
pub const CONTROLLER_NAME: &str = "function-controller";

// Label keys set on every object the controller produces
pub const FUNCTION_NAME_LABEL: &str = "serverless.kyma-project.io/function-name";
pub const FUNCTION_MANAGED_BY_LABEL: &str = "serverless.kyma-project.io/managed-by";
pub const FUNCTION_UUID_LABEL: &str = "serverless.kyma-project.io/uuid";
pub const FUNCTION_RESOURCE_LABEL: &str = "serverless.kyma-project.io/resource";
pub const FUNCTION_RESOURCE_LABEL_DEPLOYMENT_VALUE: &str = "deployment";
pub const K8S_APP_NAME_LABEL: &str = "app.kubernetes.io/name";

/// Prefix reserved for controller labels and annotations
pub const RESERVED_LABEL_PREFIX: &str = "serverless.kyma-project.io/";

/// Annotation forcing a fresh commit lookup on every reconciliation
pub const CONTINUOUS_GIT_CHECKOUT_ANNOTATION: &str =
    "serverless.kyma-project.io/continuousGitCheckout";

// Condition types
pub const CONDITION_CONFIGURATION_READY: &str = "ConfigurationReady";
pub const CONDITION_RUNNING: &str = "Running";

// Condition statuses
pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";
pub const CONDITION_UNKNOWN: &str = "Unknown";

// Condition reasons
pub const REASON_INVALID_FUNCTION_SPEC: &str = "InvalidFunctionSpec";
pub const REASON_SOURCE_UPDATED: &str = "SourceUpdated";
pub const REASON_SOURCE_UPDATE_FAILED: &str = "SourceUpdateFailed";
pub const REASON_FUNCTION_SPEC_VALIDATED: &str = "FunctionSpecValidated";
pub const REASON_DEPLOYMENT_CREATED: &str = "DeploymentCreated";
pub const REASON_DEPLOYMENT_UPDATED: &str = "DeploymentUpdated";
pub const REASON_DEPLOYMENT_FAILED: &str = "DeploymentFailed";
pub const REASON_DEPLOYMENT_DELETED: &str = "DeploymentDeleted";
pub const REASON_DEPLOYMENT_DELETION_FAILED: &str = "DeploymentDeletionFailed";
pub const REASON_DEPLOYMENT_WAITING: &str = "DeploymentWaiting";
pub const REASON_DEPLOYMENT_READY: &str = "DeploymentReady";
pub const REASON_MIN_REPLICAS_NOT_AVAILABLE: &str = "MinReplicasNotAvailable";
pub const REASON_SERVICE_CREATED: &str = "ServiceCreated";
pub const REASON_SERVICE_UPDATED: &str = "ServiceUpdated";
pub const REASON_SERVICE_FAILED: &str = "ServiceFailed";

/// Upper bound for condition messages (bytes)
pub const MAX_CONDITION_MESSAGE_LEN: usize = 32768;

/// Env var names owned by the runtime images
pub const RESERVED_ENV_NAMES: &[&str] = &[
    "FUNC_RUNTIME",
    "FUNC_HANDLER",
    "FUNC_PORT",
    "FUNC_HANDLER_SOURCE",
    "FUNC_HANDLER_DEPENDENCIES",
    "MOD_NAME",
    "NODE_PATH",
    "PYTHONPATH",
];

// Workload wiring
pub const FUNCTION_CONTAINER_PORT: i32 = 8080;
pub const FUNCTION_SERVICE_PORT: i32 = 80;
pub const FUNCTION_SERVICE_PORT_NAME: &str = "http";
pub const FUNCTION_HEALTH_PATH: &str = "/healthz";
pub const FUNCTION_USER_ID: i64 = 1000;
pub const FUNCTION_GROUP_ID: i64 = 1000;
pub const DEFAULT_REPLICAS: i32 = 1;

/// Image used by the init container that checks out git sources
pub const GIT_CLONE_IMAGE: &str =
    "europe-docker.pkg.dev/kyma-project/prod/alpine-git:v20250212-39c86988";

// Git commit checker
/// Completed orders older than this are considered abandoned
pub const COMMIT_ORDER_LIFETIME: Duration = Duration::from_secs(2 * 60);
/// Period of the full sweep of the order map
pub const COMMIT_ORDER_SWEEP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
/// Polling interval while waiting for an order to complete
pub const COMMIT_ORDER_POLL_INTERVAL: Duration = Duration::from_millis(100);

// Requeue delays used by the state machine
pub const SHORT_REQUEUE: Duration = Duration::from_secs(1);

// Health check
/// Name of the synthetic object sent through the controller queue by the liveness probe
pub const HEALTH_EVENT: &str = "HEALTH_EVENT_HEALTH_EVENT_HEALTH_EVENT_HEALTH_EVENT_HEALTH_EVENT";
/// Bound for the acknowledgement sent back by the controller stream
pub const HEALTH_ACK_TIMEOUT: Duration = Duration::from_secs(1);

// Controller configuration defaults
pub const DEFAULT_METRICS_PORT: u16 = 8090;
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_GIT_ORDER_WAIT_MS: u64 = 5000;
pub const DEFAULT_GIT_LS_REMOTE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 30;
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;
pub const DEFAULT_FUNCTION_CONFIG_PATH: &str = "hack/function-config.yaml";

// Function configuration defaults
pub const DEFAULT_REQUEUE_DURATION: Duration = Duration::from_secs(60);
pub const DEFAULT_FUNCTION_READY_REQUEUE_DURATION: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_PACKAGE_REGISTRY_CONFIG_SECRET_NAME: &str =
    "buildless-serverless-package-registry-config";
pub const DEFAULT_PUBLISHER_PROXY_ADDRESS: &str =
    "http://eventing-publisher-proxy.kyma-system.svc.cluster.local/publish";
pub const DEFAULT_TRACE_COLLECTOR_ENDPOINT: &str =
    "http://telemetry-otlp-traces.kyma-system.svc.cluster.local:4318/v1/traces";
