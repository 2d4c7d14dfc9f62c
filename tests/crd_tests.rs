//! Function CRD schema and manifest parsing

use function_controller::crd::{Function, RepositoryAuthType};
use kube::core::CustomResourceExt;
use kube::Resource;

const INLINE_FUNCTION: &str = r#"
apiVersion: serverless.kyma-project.io/v1alpha2
kind: Function
metadata:
  name: hello
  namespace: default
spec:
  runtime: nodejs22
  replicas: 2
  source:
    inline:
      source: |
        module.exports = { main: function (event, context) { return 'hello' } }
      dependencies: '{"dependencies":{"lodash":"^4.17.21"}}'
  env:
    - name: GREETING
      value: hi
    - name: DB_PASSWORD
      valueFrom:
        secretKeyRef:
          name: db
          key: password
  resourceConfiguration:
    function:
      resources:
        limits:
          memory: 128Mi
  secretMounts:
    - secretName: db
      mountPath: /secrets/db
  labels:
    team: payments
"#;

const GIT_FUNCTION: &str = r#"
apiVersion: serverless.kyma-project.io/v1alpha2
kind: Function
metadata:
  name: from-git
  namespace: default
  annotations:
    serverless.kyma-project.io/continuousGitCheckout: "TRUE"
spec:
  runtime: python312
  source:
    gitRepository:
      url: git@github.com:kyma-project/serverless.git
      baseDir: /examples/python
      reference: main
      auth:
        type: key
        secretName: git-creds
"#;

#[test]
fn test_crd_metadata() {
    let crd = Function::crd();
    assert_eq!(
        crd.metadata.name.as_deref(),
        Some("functions.serverless.kyma-project.io")
    );
    assert_eq!(crd.spec.group, "serverless.kyma-project.io");
    assert_eq!(crd.spec.scope, "Namespaced");
    assert_eq!(crd.spec.names.kind, "Function");
    assert_eq!(crd.spec.names.short_names, Some(vec!["fn".to_string()]));

    let version = &crd.spec.versions[0];
    assert_eq!(version.name, "v1alpha2");
    assert!(version.subresources.as_ref().unwrap().status.is_some());
    let columns: Vec<_> = version
        .additional_printer_columns
        .as_ref()
        .unwrap()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(columns, ["Configured", "Running", "Runtime", "Age"]);
}

#[test]
fn test_crd_yaml_keeps_unknown_fields_of_kubernetes_types() {
    let yaml = serde_yaml::to_string(&Function::crd()).unwrap();
    assert!(yaml.contains("x-kubernetes-preserve-unknown-fields: true"));
    assert!(yaml.contains("secretMounts"));
}

#[test]
fn test_inline_function_manifest() {
    let function: Function = serde_yaml::from_str(INLINE_FUNCTION).unwrap();
    assert_eq!(Function::kind(&()), "Function");
    assert_eq!(function.spec.runtime.as_str(), "nodejs22");
    assert_eq!(function.replicas(), 2);
    assert!(!function.has_git_source());

    let inline = function.inline_source().unwrap();
    assert!(inline.source.contains("module.exports"));
    assert!(inline.dependencies.as_deref().unwrap().starts_with('{'));

    assert_eq!(function.spec.env.len(), 2);
    assert!(function.spec.env[1].value_from.is_some());
    let resources = function
        .spec
        .resource_configuration
        .as_ref()
        .and_then(|r| r.function.as_ref())
        .and_then(|f| f.resources.as_ref())
        .unwrap();
    assert!(resources.limits.as_ref().unwrap().contains_key("memory"));
    assert_eq!(function.spec.secret_mounts[0].mount_path, "/secrets/db");
    assert_eq!(
        function.spec.labels.as_ref().unwrap().get("team").map(String::as_str),
        Some("payments")
    );
}

#[test]
fn test_git_function_manifest() {
    let function: Function = serde_yaml::from_str(GIT_FUNCTION).unwrap();
    let git = function.git_source().unwrap();
    assert_eq!(git.base_dir, "/examples/python");
    assert_eq!(git.reference, "main");
    let auth = git.auth.as_ref().unwrap();
    assert_eq!(auth.r#type, RepositoryAuthType::Key);
    assert_eq!(auth.secret_name, "git-creds");
    assert!(function.continuous_git_checkout());
    assert_eq!(function.replicas(), 1);
}

#[test]
fn test_retired_runtime_still_parses() {
    let manifest = INLINE_FUNCTION.replace("runtime: nodejs22", "runtime: nodejs12");
    let function: Function = serde_yaml::from_str(&manifest).unwrap();
    assert!(function.spec.runtime.is_deprecated());
    assert!(!function.spec.runtime.is_supported());
}
