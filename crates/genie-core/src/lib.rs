pub mod agents;
pub mod artifact;
pub mod config;
pub mod context;
pub mod diagram;
pub mod error;
pub mod evaluation;
pub mod fanout;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod profile;
pub mod prompt;
pub mod refine;
pub mod tickets;
pub mod types;

pub use artifact::{Artifact, UseCase, UseCaseSet};
pub use config::Config;
pub use context::{PipelineObserver, RequestContext, TracingObserver};
pub use error::{GenieError, Result, ValidationError};
pub use evaluation::{EvaluationResult, IterationRecord, Verdict};
pub use pipeline::{ArtifactOutcome, DiagramOutcome, Pipeline, PipelineOptions, PipelineReport};
pub use refine::{RefinePolicy, RefinementLoop, RefinementOutcome, Termination};
pub use types::{ApplicationType, CloudProvider, GenerationKind, RequirementRequest};
