// Request lifecycle stages

use std::fmt;
use tracing::{debug, warn};

/// Where a request is in its lifecycle. `Failed` can be entered from any
/// stage before release; `Released` is reached from `Failed` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteStage {
    Validated,
    LanguageResolved,
    ModelAcquired,
    Prompted,
    Generated,
    GateChecked,
    Regenerated,
    Normalized,
    Released,
    Responded,
    Failed,
}

impl RewriteStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewriteStage::Validated => "validated",
            RewriteStage::LanguageResolved => "language_resolved",
            RewriteStage::ModelAcquired => "model_acquired",
            RewriteStage::Prompted => "prompted",
            RewriteStage::Generated => "generated",
            RewriteStage::GateChecked => "gate_checked",
            RewriteStage::Regenerated => "regenerated",
            RewriteStage::Normalized => "normalized",
            RewriteStage::Released => "released",
            RewriteStage::Responded => "responded",
            RewriteStage::Failed => "failed",
        }
    }

    pub fn can_advance_to(&self, next: RewriteStage) -> bool {
        use RewriteStage::*;
        match (*self, next) {
            (Validated, LanguageResolved)
            | (LanguageResolved, ModelAcquired)
            | (ModelAcquired, Prompted)
            | (Prompted, Generated)
            | (Generated, GateChecked)
            | (GateChecked, Regenerated)
            | (GateChecked, Normalized)
            | (Regenerated, Normalized)
            | (Normalized, Released)
            | (Released, Responded)
            | (Failed, Released) => true,
            (Released | Responded | Failed, Failed) => false,
            (_, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RewriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records the stages a request went through
#[derive(Debug, Clone)]
pub struct StageTrail {
    history: Vec<RewriteStage>,
}

impl Default for StageTrail {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTrail {
    pub fn new() -> Self {
        Self {
            history: vec![RewriteStage::Validated],
        }
    }

    pub fn current(&self) -> RewriteStage {
        self.history
            .last()
            .copied()
            .unwrap_or(RewriteStage::Validated)
    }

    pub fn history(&self) -> &[RewriteStage] {
        &self.history
    }

    pub fn advance(&mut self, next: RewriteStage) {
        let current = self.current();
        if !current.can_advance_to(next) {
            warn!(from = %current, to = %next, "Unexpected stage transition");
        } else {
            debug!(from = %current, to = %next, "Stage");
        }
        self.history.push(next);
    }
}
