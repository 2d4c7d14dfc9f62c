//! # CRD Generator
//!
//! Generates the Kubernetes CustomResourceDefinition YAML for the `Function` resource.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/function.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use function_controller::crd::Function;
use kube::core::CustomResourceExt;

fn main() {
    let crd = Function::crd();

    match serde_yaml::to_string(&crd) {
        Ok(yaml) => {
            print!("{}", yaml);
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {}", e);
            std::process::exit(1);
        }
    }
}
