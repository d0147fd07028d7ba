//! Outcome aggregation across participants

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::CommandOutput;

/// What happened to one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// The command ran; the exit code may still be non-zero
    Completed {
        /// Command result after interception
        output: CommandOutput,
    },
    /// The pipeline or transport failed before a result was produced
    Failed {
        /// Error description
        error: String,
    },
}

/// Outcome of a single participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantOutcome {
    /// Participant index
    pub participant: usize,

    /// Host the participant ran on
    pub host: String,

    /// Result
    #[serde(flatten)]
    pub status: ParticipantStatus,

    /// Wall time from staging start to result (milliseconds)
    pub elapsed_ms: f64,
}

impl ParticipantOutcome {
    /// Check if the participant's command exited with code 0
    pub fn is_success(&self) -> bool {
        matches!(&self.status, ParticipantStatus::Completed { output } if output.is_success())
    }

    /// Command output, if the command ran
    pub fn output(&self) -> Option<&CommandOutput> {
        match &self.status {
            ParticipantStatus::Completed { output } => Some(output),
            ParticipantStatus::Failed { .. } => None,
        }
    }
}

/// Outcome of a whole run as reported by the task submitter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Per-participant outcomes
    pub participants: Vec<ParticipantOutcome>,
}

impl RunOutcome {
    /// Create an outcome from participant results
    pub fn new(mut participants: Vec<ParticipantOutcome>) -> Self {
        participants.sort_by_key(|p| p.participant);
        Self { participants }
    }

    /// A run succeeds when it had participants and all of them exited with 0
    pub fn is_success(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(|p| p.is_success())
    }
}

/// Aggregated statistics for a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStats {
    /// Number of participants that reported
    pub total_participants: usize,

    /// Participants whose command exited with 0
    pub succeeded: usize,

    /// Participants whose command exited non-zero
    pub failed: usize,

    /// Participants that never produced a result
    pub errored: usize,

    /// Metadata payloads collected
    pub metadata_records: usize,

    /// Run duration
    pub total_duration: Duration,

    /// Slowest participant (milliseconds)
    pub max_participant_ms: f64,
}

impl AggregatedStats {
    /// Get the success rate (0.0 - 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_participants > 0 {
            self.succeeded as f64 / self.total_participants as f64
        } else {
            0.0
        }
    }
}

/// Aggregate participant outcomes
pub fn aggregate_outcomes(
    outcome: &RunOutcome,
    metadata_records: usize,
    total_duration: Duration,
) -> AggregatedStats {
    let mut stats = AggregatedStats {
        total_participants: outcome.participants.len(),
        metadata_records,
        total_duration,
        ..Default::default()
    };

    for participant in &outcome.participants {
        match &participant.status {
            ParticipantStatus::Completed { output } if output.is_success() => stats.succeeded += 1,
            ParticipantStatus::Completed { .. } => stats.failed += 1,
            ParticipantStatus::Failed { .. } => stats.errored += 1,
        }
        stats.max_participant_ms = stats.max_participant_ms.max(participant.elapsed_ms);
    }

    stats
}
