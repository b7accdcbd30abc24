pub mod asset;
pub mod error;
pub mod graph;
pub mod policy;
pub mod result;
pub mod scanner;
pub mod service;
pub mod walker;

pub use asset::{AssetId, ModuleScope};
pub use error::{LookupError, ScanError};
pub use graph::WeightedGraph;
pub use policy::{Classification, PathPolicy, PathRule, Verdict};
pub use result::{ScanResult, WalkResult};
pub use scanner::{CancelToken, ModuleScanner, ProgressCallback};
pub use service::{DependencyService, MemoryService};
pub use walker::{GraphWalker, LivenessEvidence, LookupPolicy, WalkContext, WalkOptions};
