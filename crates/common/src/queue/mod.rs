//! SQS queue integration for the sync pipeline
//!
//! SQS is the job runner: at-least-once delivery, a visibility timeout
//! sized for long transcriptions, and a redrive policy that bounds
//! retries before parking a message on the dead letter queue. The
//! message id doubles as the sync job's external run identifier.

use crate::errors::{AppError, Result};
use aws_sdk_sqs::Client as SqsClient;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// SQS queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue URL
    pub url: String,
    /// Dead letter queue URL (optional)
    pub dlq_url: Option<String>,
    /// Visibility timeout in seconds
    pub visibility_timeout: i32,
    /// Wait time for long polling (seconds)
    pub wait_time_seconds: i32,
    /// Maximum number of messages per poll
    pub max_messages: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            dlq_url: None,
            visibility_timeout: 1800,
            wait_time_seconds: 20,
            max_messages: 10,
        }
    }
}

/// SQS queue client wrapper
pub struct Queue {
    client: SqsClient,
    config: QueueConfig,
}

impl Queue {
    /// Create a new queue client
    pub async fn new(config: QueueConfig) -> Result<Self> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = SqsClient::new(&aws_config);

        Ok(Self { client, config })
    }

    /// Create with existing AWS client
    pub fn with_client(client: SqsClient, config: QueueConfig) -> Self {
        Self { client, config }
    }

    /// Send a message, returning its id (the external run identifier)
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<String> {
        let body = serde_json::to_string(message).map_err(|e| AppError::QueueError {
            message: format!("Failed to serialize message: {}", e),
        })?;

        let result = self
            .client
            .send_message()
            .queue_url(&self.config.url)
            .message_body(&body)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to send message: {}", e),
            })?;

        let message_id = result.message_id.unwrap_or_default();
        debug!(message_id = %message_id, "Message sent to queue");

        Ok(message_id)
    }

    /// Receive and deserialize messages. Returns each payload with its
    /// receipt handle; a message is only removed from the queue when
    /// the handle is passed to `delete`.
    pub async fn receive<T: DeserializeOwned>(&self) -> Result<Vec<(T, String)>> {
        let result = self
            .client
            .receive_message()
            .queue_url(&self.config.url)
            .max_number_of_messages(self.config.max_messages)
            .visibility_timeout(self.config.visibility_timeout)
            .wait_time_seconds(self.config.wait_time_seconds)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to receive messages: {}", e),
            })?;

        let messages = result.messages.unwrap_or_default();
        debug!(count = messages.len(), "Received messages from queue");

        let mut parsed = Vec::with_capacity(messages.len());
        for message in messages {
            let receipt = message.receipt_handle.ok_or_else(|| AppError::QueueError {
                message: "Message has no receipt handle".to_string(),
            })?;
            let body = message.body.ok_or_else(|| AppError::QueueError {
                message: "Message has no body".to_string(),
            })?;
            let payload = serde_json::from_str(&body).map_err(|e| AppError::QueueError {
                message: format!("Failed to parse message: {}", e),
            })?;
            parsed.push((payload, receipt));
        }

        Ok(parsed)
    }

    /// Delete a message after successful processing
    pub async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.config.url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to delete message: {}", e),
            })?;

        debug!("Message deleted from queue");
        Ok(())
    }

    /// Change visibility timeout (extend processing time)
    pub async fn extend_visibility(&self, receipt_handle: &str, additional_seconds: i32) -> Result<()> {
        self.client
            .change_message_visibility()
            .queue_url(&self.config.url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(additional_seconds)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to extend visibility: {}", e),
            })?;

        debug!(additional_seconds, "Extended message visibility");
        Ok(())
    }
}

/// The asynchronous unit of work: one sync attempt for one episode on
/// behalf of one user. Delivery is at-least-once, so processing must
/// stay idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobMessage {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub episode_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_job_message_roundtrip() {
        let msg = SyncJobMessage {
            job_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            episode_id: Uuid::new_v4(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: SyncJobMessage = serde_json::from_str(&json).unwrap();

        assert_eq!(msg.job_id, parsed.job_id);
        assert_eq!(msg.user_id, parsed.user_id);
        assert_eq!(msg.episode_id, parsed.episode_id);
    }

    #[test]
    fn test_default_visibility_covers_long_transcriptions() {
        let config = QueueConfig::default();
        assert!(config.visibility_timeout >= 1800);
    }
}
