use serde::{Deserialize, Serialize};

/// What a report does when an enrichment lookup fails for infrastructure reasons.
///
/// Not-found results are never failures; they fall back to defaults regardless of mode.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Fail the whole report.
    Abort,
    /// Log, fall back to the default value and keep going.
    Degrade,
}

/// Which enrichment step is being evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enrichment {
    /// Area-of-governance / program lookup for a node.
    Classification,
    /// Execution-schedule fetch for a node's work plans.
    Schedule,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EnrichmentPolicy {
    pub classification: FailureMode,
    pub schedule: FailureMode,
}

impl Default for EnrichmentPolicy {
    /// Classification failures degrade to the sentinel; schedule failures abort.
    fn default() -> Self {
        Self {
            classification: FailureMode::Degrade,
            schedule: FailureMode::Abort,
        }
    }
}

impl EnrichmentPolicy {
    pub fn strict() -> Self {
        Self {
            classification: FailureMode::Abort,
            schedule: FailureMode::Abort,
        }
    }

    pub fn lenient() -> Self {
        Self {
            classification: FailureMode::Degrade,
            schedule: FailureMode::Degrade,
        }
    }

    pub fn mode(&self, step: Enrichment) -> FailureMode {
        match step {
            Enrichment::Classification => self.classification,
            Enrichment::Schedule => self.schedule,
        }
    }
}
