//! Kinesis-backed [`StreamProvider`].
//!
//! Maps the three provider operations onto `CreateStream`,
//! `DescribeStreamSummary` and `PutRecords`. Service errors keep their AWS
//! error code, so the retry classification in
//! [`codes::is_transient`](crate::provider::codes::is_transient) applies to
//! them unchanged.
//!
//! Credentials and region come from the default AWS provider chain.
//! `KINESIS_ENDPOINT_URL` points the client at a local emulator.

use crate::provider::{codes, ProviderError, StreamProvider, StreamState, SubmissionOutcome};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kinesis::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::{PutRecordsRequestEntry, StreamStatus};
use aws_sdk_kinesis::Client;
use statementlog_core::EncodedRecord;
use tracing::debug;

pub const ENDPOINT_URL_VAR: &str = "KINESIS_ENDPOINT_URL";

#[derive(Debug, Clone)]
pub struct KinesisProvider {
    client: Client,
}

impl KinesisProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS configuration chain.
    pub async fn from_env() -> Self {
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_kinesis::config::Builder::from(&shared);
        if let Ok(url) = std::env::var(ENDPOINT_URL_VAR) {
            debug!(endpoint = %url, "Using custom Kinesis endpoint");
            builder = builder.endpoint_url(url);
        }
        Self::new(Client::from_conf(builder.build()))
    }
}

fn provider_error<E, R>(err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().unwrap_or(codes::INTERNAL_FAILURE).to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{:?}", err));
    ProviderError::new(code, message)
}

fn stream_state(status: &StreamStatus) -> StreamState {
    match status {
        StreamStatus::Active => StreamState::Active,
        StreamStatus::Creating => StreamState::Creating,
        StreamStatus::Updating => StreamState::Updating,
        StreamStatus::Deleting => StreamState::Deleting,
        _ => StreamState::Unknown,
    }
}

#[async_trait]
impl StreamProvider for KinesisProvider {
    async fn create_stream(&self, name: &str, shard_count: u32) -> Result<(), ProviderError> {
        self.client
            .create_stream()
            .stream_name(name)
            .shard_count(shard_count as i32)
            .send()
            .await
            .map(|_| ())
            .map_err(provider_error)
    }

    async fn describe_stream(&self, name: &str) -> Result<StreamState, ProviderError> {
        match self.client.describe_stream_summary().stream_name(name).send().await {
            Ok(output) => Ok(output
                .stream_description_summary()
                .map(|summary| stream_state(summary.stream_status()))
                .unwrap_or(StreamState::Unknown)),
            Err(err) => {
                let err = provider_error(err);
                if err.code == codes::RESOURCE_NOT_FOUND {
                    Ok(StreamState::Absent)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn put_records(
        &self,
        name: &str,
        records: &[EncodedRecord],
    ) -> Result<Vec<SubmissionOutcome>, ProviderError> {
        let entries = records
            .iter()
            .map(|record| {
                PutRecordsRequestEntry::builder()
                    .partition_key(record.partition_key.clone())
                    .data(Blob::new(record.payload.to_vec()))
                    .build()
                    .map_err(|e| ProviderError::new(codes::VALIDATION, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .put_records()
            .stream_name(name)
            .set_records(Some(entries))
            .send()
            .await
            .map_err(provider_error)?;

        Ok(output
            .records()
            .iter()
            .map(|entry| match entry.error_code() {
                Some(code) => {
                    SubmissionOutcome::failure(code, entry.error_message().unwrap_or_default())
                }
                None => SubmissionOutcome::success(
                    entry.sequence_number().unwrap_or_default(),
                    entry.shard_id().unwrap_or_default(),
                ),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_status_mapping() {
        assert_eq!(stream_state(&StreamStatus::Active), StreamState::Active);
        assert_eq!(stream_state(&StreamStatus::Creating), StreamState::Creating);
        assert_eq!(stream_state(&StreamStatus::Deleting), StreamState::Deleting);
        assert_eq!(
            stream_state(&StreamStatus::from("SOMETHING_NEW")),
            StreamState::Unknown
        );
    }
}
