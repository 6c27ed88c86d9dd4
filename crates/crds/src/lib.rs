//! Submariner CRD Definitions
//!
//! Kubernetes Custom Resource Definitions reconciled by the Submariner operator.

pub mod broker;
pub mod common;
pub mod service_discovery;
pub mod submariner;

pub use broker::*;
pub use common::*;
pub use service_discovery::*;
pub use submariner::*;

/// API group shared by every Submariner CRD
pub const API_GROUP: &str = "submariner.io";

/// API version shared by every Submariner CRD
pub const API_VERSION: &str = "v1alpha1";
