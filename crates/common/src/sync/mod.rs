//! Transcript sync state machine types
//!
//! A Transcript row is the global deduplication anchor for an Episode:
//! at most one exists per episode, and every user who syncs the episode
//! shares it. Its status walks
//! `not_synced/absent -> queued -> syncing -> {synced | failed}` with
//! `failed -> queued` on retry; `synced` never regresses.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transcript lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    NotSynced,
    Queued,
    Syncing,
    Synced,
    Failed,
}

impl From<String> for TranscriptStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queued" => TranscriptStatus::Queued,
            "syncing" => TranscriptStatus::Syncing,
            "synced" => TranscriptStatus::Synced,
            "failed" => TranscriptStatus::Failed,
            _ => TranscriptStatus::NotSynced,
        }
    }
}

impl From<TranscriptStatus> for String {
    fn from(status: TranscriptStatus) -> Self {
        status.as_str().to_string()
    }
}

impl TranscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptStatus::NotSynced => "not_synced",
            TranscriptStatus::Queued => "queued",
            TranscriptStatus::Syncing => "syncing",
            TranscriptStatus::Synced => "synced",
            TranscriptStatus::Failed => "failed",
        }
    }

    /// Work is scheduled or running for this transcript
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TranscriptStatus::Queued | TranscriptStatus::Syncing)
    }

    /// A new sync may claim the transcript from this status
    pub fn is_claimable(&self) -> bool {
        matches!(self, TranscriptStatus::NotSynced | TranscriptStatus::Failed)
    }

    /// Legal state machine edges. `synced` is terminal; `failed` may
    /// only be re-entered into the pipeline via `queued`.
    pub fn can_transition_to(&self, next: TranscriptStatus) -> bool {
        use TranscriptStatus::*;
        matches!(
            (*self, next),
            (NotSynced, Queued)
                | (Failed, Queued)
                | (Queued, Syncing)
                | (Syncing, Synced)
                | (Syncing, Failed)
                | (Queued, Failed)
        )
    }
}

/// Transcript source
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    Catalog,
    SpeechToText,
}

impl TranscriptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptSource::Catalog => "catalog",
            TranscriptSource::SpeechToText => "speech_to_text",
        }
    }
}

impl From<String> for TranscriptSource {
    fn from(s: String) -> Self {
        match s.as_str() {
            "speech_to_text" => TranscriptSource::SpeechToText,
            _ => TranscriptSource::Catalog,
        }
    }
}

/// Sync job lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl From<String> for SyncJobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "processing" => SyncJobStatus::Processing,
            "completed" => SyncJobStatus::Completed,
            "failed" => SyncJobStatus::Failed,
            _ => SyncJobStatus::Queued,
        }
    }
}

impl From<SyncJobStatus> for String {
    fn from(status: SyncJobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl SyncJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncJobStatus::Queued => "queued",
            SyncJobStatus::Processing => "processing",
            SyncJobStatus::Completed => "completed",
            SyncJobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncJobStatus::Completed | SyncJobStatus::Failed)
    }
}

/// Caller-visible result of a sync request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The episode was already synced; the user was linked without any work
    LinkedInstantly,
    /// A job is running (freshly triggered or already in flight)
    JobTriggered { job_id: Uuid },
    /// The request was not accepted
    Rejected { reason: String },
}

/// What the trigger path should do, given the transcript status it
/// observed. Pure decision logic; the conditional database claim is the
/// authoritative arbiter under concurrency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncDisposition {
    /// Dedup short-circuit: link the user, no work
    LinkInstantly,
    /// Another sync is in flight: link optimistically, surface its job
    AwaitInFlight,
    /// Claim the transcript and trigger a new job
    Trigger,
}

impl SyncDisposition {
    pub fn for_status(status: Option<TranscriptStatus>) -> Self {
        match status {
            Some(TranscriptStatus::Synced) => SyncDisposition::LinkInstantly,
            Some(s) if s.is_in_flight() => SyncDisposition::AwaitInFlight,
            _ => SyncDisposition::Trigger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            TranscriptStatus::NotSynced,
            TranscriptStatus::Queued,
            TranscriptStatus::Syncing,
            TranscriptStatus::Synced,
            TranscriptStatus::Failed,
        ] {
            let s: String = status.into();
            assert_eq!(TranscriptStatus::from(s), status);
        }
    }

    #[test]
    fn test_legal_transitions() {
        use TranscriptStatus::*;
        assert!(NotSynced.can_transition_to(Queued));
        assert!(Failed.can_transition_to(Queued));
        assert!(Queued.can_transition_to(Syncing));
        assert!(Syncing.can_transition_to(Synced));
        assert!(Syncing.can_transition_to(Failed));
    }

    #[test]
    fn test_synced_is_terminal() {
        use TranscriptStatus::*;
        for next in [NotSynced, Queued, Syncing, Failed] {
            assert!(!Synced.can_transition_to(next));
        }
        assert!(!Synced.can_transition_to(Synced));
    }

    #[test]
    fn test_no_regression_from_syncing_to_queued() {
        assert!(!TranscriptStatus::Syncing.can_transition_to(TranscriptStatus::Queued));
    }

    #[test]
    fn test_disposition_synced_links_instantly() {
        // Scenario B at the decision level: already-synced episode
        assert_eq!(
            SyncDisposition::for_status(Some(TranscriptStatus::Synced)),
            SyncDisposition::LinkInstantly
        );
    }

    #[test]
    fn test_disposition_absent_triggers() {
        // Scenario A at the decision level: no transcript row yet
        assert_eq!(SyncDisposition::for_status(None), SyncDisposition::Trigger);
        assert_eq!(
            SyncDisposition::for_status(Some(TranscriptStatus::NotSynced)),
            SyncDisposition::Trigger
        );
        assert_eq!(
            SyncDisposition::for_status(Some(TranscriptStatus::Failed)),
            SyncDisposition::Trigger
        );
    }

    #[test]
    fn test_disposition_in_flight_awaits() {
        assert_eq!(
            SyncDisposition::for_status(Some(TranscriptStatus::Queued)),
            SyncDisposition::AwaitInFlight
        );
        assert_eq!(
            SyncDisposition::for_status(Some(TranscriptStatus::Syncing)),
            SyncDisposition::AwaitInFlight
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = SyncOutcome::JobTriggered { job_id: Uuid::new_v4() };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("job_triggered"));
        let parsed: SyncOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, outcome);
    }
}
