//! Prints the Submariner CRDs as a multi-document YAML stream.

use anyhow::Result;
use crds::{Broker, ServiceDiscovery, Submariner};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let crds = [Submariner::crd(), Broker::crd(), ServiceDiscovery::crd()];
    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
