// Rewrite service: request validation and orchestration

mod request;
mod rewrite;
mod stage;

pub use request::RewriteRequest;
pub use rewrite::{GenerationOutcome, RewriteService};
pub use stage::{RewriteStage, StageTrail};
