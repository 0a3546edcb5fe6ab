//! Architecture diagrams: structured spec, source generation, static
//! validation, agent-driven repair and rendering.

pub mod catalog;
pub mod render;
pub mod repair;
pub mod spec;
pub mod validate;

pub use catalog::{Introspection, ModuleIntrospector, PythonIntrospector};
pub use render::{check_graphviz, DiagramRenderer, GraphvizRenderer, RenderedDiagram};
pub use repair::{RepairLoop, RepairOutcome, DEFAULT_REPAIR_ATTEMPTS};
pub use spec::{ClusterSpec, ConnectionSpec, DiagramSpec, NodeSpec};
pub use validate::{ImportValidator, SourceValidator};

/// File stem every generated diagram writes its image to.
pub const OUTPUT_STEM: &str = "architecture";
