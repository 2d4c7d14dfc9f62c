//! # Function Deployment
//!
//! Builds the Deployment that runs a Function from its source without an image build:
//! the runtime image writes the handler (inline) or copies it from the init container
//! (git), installs dependencies and starts the runtime server.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, EmptyDirVolumeSource, EnvVar, HTTPGetAction,
    PodSecurityContext, PodSpec, PodTemplateSpec, Probe, ResourceRequirements,
    SeccompProfile, SecretVolumeSource, SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

use super::labels::{function_labels, pod_labels, selector_labels};
use crate::config::FunctionConfig;
use crate::constants::{
    FUNCTION_CONTAINER_PORT, FUNCTION_GROUP_ID, FUNCTION_HEALTH_PATH, FUNCTION_USER_ID,
    GIT_CLONE_IMAGE,
};
use crate::controller::git::{
    GitAuth, APP_REPOSITORY_KEY, APP_REPOSITORY_PASSWORD, APP_REPOSITORY_USERNAME,
};
use crate::crd::{Function, RepositoryAuthType};

const SOURCES_VOLUME: &str = "sources";
const PACKAGE_REGISTRY_CONFIG_VOLUME: &str = "package-registry-config";
const TMP_VOLUME: &str = "tmp";
const GIT_REPOSITORY_VOLUME: &str = "git-repository";
const LOCAL_VOLUME: &str = "local";

const GIT_REPOSITORY_PATH: &str = "/git-repository";
const NODEJS_WORKDIR: &str = "/usr/src/app/function";
const PYTHON_WORKDIR: &str = "/kubeless";

/// Mode of secret mount files
// TODO: world-writable bits are carried over from earlier releases, tighten to 0o644 once
// no runtime writes next to mounted secrets
const SECRET_MOUNT_MODE: i32 = 0o666;

/// Desired Deployment of a Function
#[derive(Debug)]
pub struct DeploymentBuilder<'a> {
    function: &'a Function,
    config: &'a FunctionConfig,
    commit: Option<&'a str>,
    git_auth: Option<&'a GitAuth>,
}

impl<'a> DeploymentBuilder<'a> {
    pub fn new(function: &'a Function, config: &'a FunctionConfig) -> Self {
        Self {
            function,
            config,
            commit: None,
            git_auth: None,
        }
    }

    /// Commit the init container checks out
    #[must_use]
    pub fn commit(mut self, commit: Option<&'a str>) -> Self {
        self.commit = commit.filter(|c| !c.is_empty());
        self
    }

    /// Credentials the init container clones with
    #[must_use]
    pub fn git_auth(mut self, git_auth: Option<&'a GitAuth>) -> Self {
        self.git_auth = git_auth;
        self
    }

    pub fn build(&self) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(self.name().to_string()),
                namespace: self.function.metadata.namespace.clone(),
                labels: Some(function_labels(self.function)),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                selector: LabelSelector {
                    match_labels: Some(selector_labels(self.function)),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(pod_labels(self.function)),
                        annotations: self.function.spec.annotations.clone(),
                        ..Default::default()
                    }),
                    spec: Some(self.pod_spec()),
                },
                replicas: Some(self.function.replicas()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn name(&self) -> &str {
        self.function.metadata.name.as_deref().unwrap_or_default()
    }

    fn is_nodejs(&self) -> bool {
        self.function.spec.runtime.is_nodejs()
    }

    fn is_python(&self) -> bool {
        self.function.spec.runtime.is_python()
    }

    fn pod_spec(&self) -> PodSpec {
        let (secret_volumes, secret_mounts) = self.secret_volumes();
        let mut volumes = self.volumes();
        volumes.extend(secret_volumes);
        let mut volume_mounts = self.volume_mounts();
        volume_mounts.extend(secret_mounts);

        PodSpec {
            volumes: Some(volumes),
            init_containers: self.init_containers(),
            containers: vec![Container {
                name: self.name().to_string(),
                image: Some(self.runtime_image()),
                working_dir: Some(self.working_dir().to_string()),
                command: Some(vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    self.runtime_command(),
                ]),
                resources: Some(self.resources()),
                env: Some(self.envs()),
                volume_mounts: Some(volume_mounts),
                ports: Some(vec![ContainerPort {
                    container_port: FUNCTION_CONTAINER_PORT,
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                // 30 failures every 5s give the function 150s to install dependencies
                startup_probe: Some(health_probe(Probe {
                    initial_delay_seconds: Some(0),
                    period_seconds: Some(5),
                    success_threshold: Some(1),
                    failure_threshold: Some(30),
                    ..Default::default()
                })),
                readiness_probe: Some(health_probe(Probe {
                    initial_delay_seconds: Some(0),
                    failure_threshold: Some(1),
                    period_seconds: Some(5),
                    timeout_seconds: Some(2),
                    ..Default::default()
                })),
                liveness_probe: Some(health_probe(Probe {
                    failure_threshold: Some(3),
                    period_seconds: Some(5),
                    timeout_seconds: Some(4),
                    ..Default::default()
                })),
                security_context: Some(container_security_context()),
                ..Default::default()
            }],
            security_context: Some(PodSecurityContext {
                run_as_user: Some(FUNCTION_USER_ID),
                run_as_group: Some(FUNCTION_GROUP_ID),
                seccomp_profile: Some(SeccompProfile {
                    type_: "RuntimeDefault".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn init_containers(&self) -> Option<Vec<Container>> {
        self.function.git_source()?;
        let envs = self.git_auth.map(GitAuth::auth_envs);
        Some(vec![Container {
            name: format!("{}-init", self.name()),
            image: Some(GIT_CLONE_IMAGE.to_string()),
            working_dir: Some(self.working_dir().to_string()),
            command: Some(vec![
                "sh".to_string(),
                "-c".to_string(),
                self.init_container_command(),
            ]),
            env: envs,
            volume_mounts: Some(vec![volume_mount(GIT_REPOSITORY_VOLUME, GIT_REPOSITORY_PATH)]),
            security_context: Some(container_security_context()),
            ..Default::default()
        }])
    }

    fn init_container_command(&self) -> String {
        let Some(git) = self.function.git_source() else {
            return String::new();
        };
        let mut lines = Vec::new();
        if let Some(auth) = self.git_auth {
            lines.push(git_auth_setup(auth.auth_type()));
        }
        lines.push(format!(
            "git clone --depth 1 --branch {} {} /git-repository/repo;",
            git.reference, git.url
        ));
        if let Some(commit) = self.commit {
            lines.push(format!(
                "cd /git-repository/repo;git reset --hard {commit}; cd ../..;"
            ));
        }
        lines.push(format!(
            "mkdir /git-repository/src;cp /git-repository/repo/{}/* /git-repository/src;",
            git.base_dir.trim_matches(|c| c == '/' || c == ' ')
        ));
        lines.join("\n")
    }

    fn volumes(&self) -> Vec<Volume> {
        let mut volumes = vec![
            // handler code and installed dependencies
            empty_dir_volume(SOURCES_VOLUME),
            Volume {
                name: PACKAGE_REGISTRY_CONFIG_VOLUME.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(self.config.package_registry_config_secret_name.clone()),
                    optional: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            },
            empty_dir_volume(TMP_VOLUME),
        ];
        if self.function.has_git_source() {
            volumes.push(empty_dir_volume(GIT_REPOSITORY_VOLUME));
        }
        if self.is_python() {
            // pip --user installs into ~/.local
            volumes.push(empty_dir_volume(LOCAL_VOLUME));
        }
        volumes
    }

    fn volume_mounts(&self) -> Vec<VolumeMount> {
        let working_dir = self.working_dir();
        let mut mounts = vec![
            volume_mount(SOURCES_VOLUME, working_dir),
            volume_mount(TMP_VOLUME, "/tmp"),
        ];
        if self.function.has_git_source() {
            mounts.push(volume_mount(GIT_REPOSITORY_VOLUME, GIT_REPOSITORY_PATH));
        }
        if self.is_nodejs() {
            mounts.push(VolumeMount {
                name: PACKAGE_REGISTRY_CONFIG_VOLUME.to_string(),
                mount_path: format!("{working_dir}/package-registry-config/.npmrc"),
                sub_path: Some(".npmrc".to_string()),
                ..Default::default()
            });
        }
        if self.is_python() {
            mounts.push(volume_mount(LOCAL_VOLUME, "/.local"));
            mounts.push(VolumeMount {
                name: PACKAGE_REGISTRY_CONFIG_VOLUME.to_string(),
                mount_path: format!("{working_dir}/package-registry-config/pip.conf"),
                sub_path: Some("pip.conf".to_string()),
                ..Default::default()
            });
        }
        mounts
    }

    fn secret_volumes(&self) -> (Vec<Volume>, Vec<VolumeMount>) {
        self.function
            .spec
            .secret_mounts
            .iter()
            .map(|mount| {
                let volume = Volume {
                    name: mount.secret_name.clone(),
                    secret: Some(SecretVolumeSource {
                        secret_name: Some(mount.secret_name.clone()),
                        default_mode: Some(SECRET_MOUNT_MODE),
                        optional: Some(false),
                        ..Default::default()
                    }),
                    ..Default::default()
                };
                let volume_mount = VolumeMount {
                    name: mount.secret_name.clone(),
                    mount_path: mount.mount_path.clone(),
                    read_only: Some(true),
                    ..Default::default()
                };
                (volume, volume_mount)
            })
            .unzip()
    }

    fn runtime_image(&self) -> String {
        if let Some(image) = self
            .function
            .spec
            .runtime_image_override
            .as_deref()
            .filter(|i| !i.is_empty())
        {
            return image.to_string();
        }
        self.config
            .runtime_image(&self.function.spec.runtime)
            .unwrap_or_default()
            .to_string()
    }

    fn working_dir(&self) -> &'static str {
        if self.is_nodejs() {
            NODEJS_WORKDIR
        } else if self.is_python() {
            PYTHON_WORKDIR
        } else {
            ""
        }
    }

    fn runtime_command(&self) -> String {
        [
            self.sources_command(),
            self.install_command().to_string(),
            self.start_command().to_string(),
        ]
        .join("\n")
    }

    fn sources_command(&self) -> String {
        let Some(inline) = self.function.inline_source() else {
            return "cp /git-repository/src/* .;".to_string();
        };
        let (handler, dependencies) = if self.is_nodejs() {
            ("handler.js", "package.json")
        } else if self.is_python() {
            ("handler.py", "requirements.txt")
        } else {
            ("", "")
        };

        let mut lines = vec![format!(r#"echo "${{FUNC_HANDLER_SOURCE}}" > {handler};"#)];
        if inline.dependencies.as_deref().is_some_and(|d| !d.is_empty()) {
            lines.push(format!(
                r#"echo "${{FUNC_HANDLER_DEPENDENCIES}}" > {dependencies};"#
            ));
        }
        lines.join("\n")
    }

    fn install_command(&self) -> &'static str {
        if self.is_nodejs() {
            "npm install --prefer-offline --no-audit --progress=false;"
        } else if self.is_python() {
            "PIP_CONFIG_FILE=package-registry-config/pip.conf pip install --user --no-cache-dir -r /kubeless/requirements.txt;"
        } else {
            ""
        }
    }

    fn start_command(&self) -> &'static str {
        if self.is_nodejs() {
            "cd ..;\nnpm start;"
        } else if self.is_python() {
            "cd ..;\npython /kubeless.py;"
        } else {
            ""
        }
    }

    fn envs(&self) -> Vec<EnvVar> {
        let mut envs = vec![
            env(
                "SERVICE_NAMESPACE",
                self.function.metadata.namespace.as_deref().unwrap_or_default(),
            ),
            env(
                "TRACE_COLLECTOR_ENDPOINT",
                &self.config.function_trace_collector_endpoint,
            ),
            env(
                "PUBLISHER_PROXY_ADDRESS",
                &self.config.function_publisher_proxy_address,
            ),
        ];
        if let Some(inline) = self.function.inline_source() {
            envs.push(env("FUNC_HANDLER_SOURCE", &inline.source));
            envs.push(env(
                "FUNC_HANDLER_DEPENDENCIES",
                inline.dependencies.as_deref().unwrap_or_default(),
            ));
        }
        if self.is_python() {
            envs.push(env("MOD_NAME", "handler"));
            envs.push(env("FUNC_HANDLER", "main"));
        }
        // User envs come last so they can override the defaults above
        envs.extend(self.function.spec.env.iter().cloned());
        envs
    }

    fn resources(&self) -> ResourceRequirements {
        self.function
            .spec
            .resource_configuration
            .as_ref()
            .and_then(|r| r.function.as_ref())
            .and_then(|f| f.resources.clone())
            .unwrap_or_default()
    }
}

/// Image of the function container
pub fn runtime_image(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()?
        .image
        .as_deref()
}

/// Shell prelude exporting the init container's git credentials
fn git_auth_setup(auth_type: RepositoryAuthType) -> String {
    match auth_type {
        RepositoryAuthType::Key => format!(
            r#"mkdir -p /tmp/.ssh;echo "${{{APP_REPOSITORY_KEY}}}" > /tmp/.ssh/id_key;chmod 600 /tmp/.ssh/id_key;export GIT_SSH_COMMAND="ssh -i /tmp/.ssh/id_key -o IdentitiesOnly=yes -o StrictHostKeyChecking=no";"#
        ),
        RepositoryAuthType::Basic => format!(
            r#"export GIT_CONFIG_COUNT=1 GIT_CONFIG_KEY_0=http.extraHeader GIT_CONFIG_VALUE_0="Authorization: Basic $(printf '%s:%s' "${{{APP_REPOSITORY_USERNAME}}}" "${{{APP_REPOSITORY_PASSWORD}}}" | base64 | tr -d '\n')";"#
        ),
    }
}

fn health_probe(probe: Probe) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(FUNCTION_HEALTH_PATH.to_string()),
            port: IntOrString::Int(FUNCTION_CONTAINER_PORT),
            ..Default::default()
        }),
        ..probe
    }
}

fn container_security_context() -> SecurityContext {
    SecurityContext {
        privileged: Some(false),
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".to_string()]),
            ..Default::default()
        }),
        proc_mount: Some("Default".to_string()),
        read_only_root_filesystem: Some(false),
        ..Default::default()
    }
}

fn empty_dir_volume(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

fn volume_mount(name: &str, mount_path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: mount_path.to_string(),
        ..Default::default()
    }
}

/// Empty values are left unset, the API server drops them anyway
fn env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: (!value.is_empty()).then(|| value.to_string()),
        ..Default::default()
    }
}

/// Whether the cluster Deployment differs from the desired one in a field the controller owns
///
/// Fields defaulted or written by the API server and other controllers are ignored.
pub fn deployment_changed(current: &Deployment, desired: &Deployment) -> bool {
    let (Some(current_spec), Some(desired_spec)) = (&current.spec, &desired.spec) else {
        return current.spec.is_some() != desired.spec.is_some();
    };
    if current_spec.replicas != desired_spec.replicas {
        return true;
    }

    let current_meta = current_spec.template.metadata.as_ref();
    let desired_meta = desired_spec.template.metadata.as_ref();
    if non_empty(current_meta.and_then(|m| m.labels.as_ref()))
        != non_empty(desired_meta.and_then(|m| m.labels.as_ref()))
        || non_empty(current_meta.and_then(|m| m.annotations.as_ref()))
            != non_empty(desired_meta.and_then(|m| m.annotations.as_ref()))
    {
        return true;
    }

    let (Some(current_pod), Some(desired_pod)) =
        (&current_spec.template.spec, &desired_spec.template.spec)
    else {
        return current_spec.template.spec.is_some() != desired_spec.template.spec.is_some();
    };

    containers_changed(&current_pod.containers, &desired_pod.containers)
        || init_containers_changed(
            current_pod.init_containers.as_deref().unwrap_or_default(),
            desired_pod.init_containers.as_deref().unwrap_or_default(),
        )
        || volumes_changed(
            current_pod.volumes.as_deref().unwrap_or_default(),
            desired_pod.volumes.as_deref().unwrap_or_default(),
        )
}

fn non_empty(map: Option<&BTreeMap<String, String>>) -> Option<&BTreeMap<String, String>> {
    map.filter(|m| !m.is_empty())
}

fn containers_changed(current: &[Container], desired: &[Container]) -> bool {
    if current.len() != desired.len() {
        return true;
    }
    current.iter().zip(desired).any(|(c, d)| {
        c.image != d.image
            || c.working_dir != d.working_dir
            || c.command != d.command
            || resources_changed(c.resources.as_ref(), d.resources.as_ref())
            || envs_changed(c.env.as_deref(), d.env.as_deref())
            || c.volume_mounts.as_deref().unwrap_or_default()
                != d.volume_mounts.as_deref().unwrap_or_default()
    })
}

fn init_containers_changed(current: &[Container], desired: &[Container]) -> bool {
    if current.len() != desired.len() {
        return true;
    }
    current.iter().zip(desired).any(|(c, d)| {
        c.image != d.image
            || c.command != d.command
            || envs_changed(c.env.as_deref(), d.env.as_deref())
    })
}

/// Requests and limits compared by value, the API server rewrites quantities to canonical form
fn resources_changed(
    current: Option<&ResourceRequirements>,
    desired: Option<&ResourceRequirements>,
) -> bool {
    let current = current.cloned().unwrap_or_default();
    let desired = desired.cloned().unwrap_or_default();
    quantities_changed(current.requests.as_ref(), desired.requests.as_ref())
        || quantities_changed(current.limits.as_ref(), desired.limits.as_ref())
}

fn quantities_changed(
    current: Option<&BTreeMap<String, Quantity>>,
    desired: Option<&BTreeMap<String, Quantity>>,
) -> bool {
    let empty = BTreeMap::new();
    let current = current.unwrap_or(&empty);
    let desired = desired.unwrap_or(&empty);
    current.len() != desired.len()
        || current.iter().any(|(name, quantity)| {
            desired
                .get(name)
                .is_none_or(|other| !same_quantity(quantity, other))
        })
}

fn same_quantity(a: &Quantity, b: &Quantity) -> bool {
    match (quantity_nanos(&a.0), quantity_nanos(&b.0)) {
        (Some(a), Some(b)) => a == b,
        _ => a.0.trim() == b.0.trim(),
    }
}

/// Value of a quantity string in billionths, rounded up like the API server does
///
/// Accepts decimal and binary SI suffixes and exponent notation. `None` when unparsable.
fn quantity_nanos(quantity: &str) -> Option<i128> {
    let quantity = quantity.trim();
    let split = quantity
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(split);

    let (binary_factor, decimal_exponent): (i128, i32) = match suffix {
        "" => (1, 0),
        "n" => (1, -9),
        "u" => (1, -6),
        "m" => (1, -3),
        "k" => (1, 3),
        "M" => (1, 6),
        "G" => (1, 9),
        "T" => (1, 12),
        "P" => (1, 15),
        "E" => (1, 18),
        "Ki" => (1 << 10, 0),
        "Mi" => (1 << 20, 0),
        "Gi" => (1 << 30, 0),
        "Ti" => (1 << 40, 0),
        "Pi" => (1 << 50, 0),
        "Ei" => (1 << 60, 0),
        exponent => {
            let digits = exponent.strip_prefix(['e', 'E'])?;
            (1, digits.parse().ok()?)
        }
    };

    let (negative, number) = match number.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, number.strip_prefix('+').unwrap_or(number)),
    };
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let digits = format!("{whole}{fraction}");
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let significant = digits.trim_start_matches('0');
    let mantissa: i128 = if significant.is_empty() {
        0
    } else {
        significant.parse().ok()?
    };
    let fraction_len = i32::try_from(fraction.len()).ok()?;

    let scaled = mantissa.checked_mul(binary_factor)?;
    let exponent = 9 + decimal_exponent - fraction_len;
    let nanos = if exponent >= 0 {
        scaled.checked_mul(10_i128.checked_pow(exponent.unsigned_abs())?)?
    } else {
        let divisor = 10_i128.checked_pow(exponent.unsigned_abs())?;
        (scaled + divisor - 1) / divisor
    };
    Some(if negative { -nanos } else { nanos })
}

/// Env lists compared after filling in what the API server defaults on `valueFrom`
fn envs_changed(current: Option<&[EnvVar]>, desired: Option<&[EnvVar]>) -> bool {
    let current = current.unwrap_or_default();
    let desired = desired.unwrap_or_default();
    current.len() != desired.len()
        || current
            .iter()
            .zip(desired)
            .any(|(c, d)| normalized_env(c) != normalized_env(d))
}

fn normalized_env(env: &EnvVar) -> EnvVar {
    let mut env = env.clone();
    if env.value.as_deref() == Some("") {
        env.value = None;
    }
    if let Some(field_ref) = env.value_from.as_mut().and_then(|v| v.field_ref.as_mut()) {
        field_ref.api_version.get_or_insert_with(|| "v1".to_string());
    }
    if let Some(resource_ref) = env
        .value_from
        .as_mut()
        .and_then(|v| v.resource_field_ref.as_mut())
    {
        let divisor = resource_ref
            .divisor
            .as_ref()
            .and_then(|d| quantity_nanos(&d.0))
            .filter(|nanos| *nanos != 0)
            .unwrap_or(1_000_000_000);
        resource_ref.divisor = Some(Quantity(divisor.to_string()));
    }
    env
}

/// Volumes compared by identity, the API server fills in source defaults
fn volumes_changed(current: &[Volume], desired: &[Volume]) -> bool {
    if current.len() != desired.len() {
        return true;
    }
    current.iter().zip(desired).any(|(c, d)| {
        c.name != d.name
            || c.empty_dir.is_some() != d.empty_dir.is_some()
            || c.secret.as_ref().and_then(|s| s.secret_name.as_ref())
                != d.secret.as_ref().and_then(|s| s.secret_name.as_ref())
    })
}

/// Copy the managed fields of `desired` into the cluster object
pub fn apply_deployment_changes(current: &mut Deployment, desired: &Deployment) {
    current.metadata.labels.clone_from(&desired.metadata.labels);
    if let (Some(current_spec), Some(desired_spec)) = (current.spec.as_mut(), desired.spec.as_ref())
    {
        current_spec.template = desired_spec.template.clone();
        current_spec.replicas = desired_spec.replicas;
    } else {
        current.spec.clone_from(&desired.spec);
    }
}
