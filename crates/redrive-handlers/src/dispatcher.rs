//! Forwards inbound object notifications to the worker.

use std::sync::Arc;

use serde::Serialize;

use redrive_core::{Invoker, ObjectEvent, PipelineError};

/// Per-batch dispatch counters, returned for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub records_seen: usize,
    pub forwarded: usize,
    pub decode_errors: usize,
}

pub struct Dispatcher {
    invoker: Arc<dyn Invoker>,
    allow_prefixes: Vec<String>,
}

impl Dispatcher {
    pub fn new(invoker: Arc<dyn Invoker>, allow_prefixes: Vec<String>) -> Self {
        Self {
            invoker,
            allow_prefixes,
        }
    }

    /// Decode each envelope and forward every allowed record to the worker,
    /// one invocation per record.
    ///
    /// Undecodable envelopes are skipped and counted, not fatal. Invocation
    /// failures are strict: the batch aborts so the at-least-once transport
    /// redelivers it whole. Records already forwarded from the same batch
    /// may then be invoked again; the worker is expected to tolerate
    /// duplicates.
    pub async fn dispatch<'a, I>(&self, envelopes: I) -> Result<DispatchSummary, PipelineError>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut summary = DispatchSummary::default();

        for data in envelopes {
            let event = match ObjectEvent::from_slice(data) {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping undecodable envelope");
                    summary.decode_errors += 1;
                    continue;
                }
            };

            for record in &event.records {
                summary.records_seen += 1;
                let path = record.path();

                if !self.allowed(&path) {
                    continue;
                }

                self.invoker.invoke(record).await.map_err(|err| {
                    tracing::error!(path = %path, error = %err, "worker invocation failed");
                    PipelineError::from(err)
                })?;
                summary.forwarded += 1;
            }
        }

        Ok(summary)
    }

    /// Literal, case-sensitive prefix match. An empty allow-list forwards
    /// everything.
    fn allowed(&self, path: &str) -> bool {
        if self.allow_prefixes.is_empty() {
            return true;
        }
        match self
            .allow_prefixes
            .iter()
            .find(|prefix| path.starts_with(prefix.as_str()))
        {
            Some(prefix) => {
                tracing::debug!(prefix = %prefix, path = %path, "matched allow prefix");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redrive_core::{ObjectRecord, RecordingInvoker};

    fn envelope(records: &[(&str, &str)]) -> Vec<u8> {
        let event = ObjectEvent {
            records: records
                .iter()
                .map(|(bucket, key)| ObjectRecord::new(*bucket, *key))
                .collect(),
        };
        serde_json::to_vec(&event).unwrap()
    }

    fn dispatcher(prefixes: &[&str]) -> (Dispatcher, Arc<RecordingInvoker>) {
        let invoker = Arc::new(RecordingInvoker::new());
        let dispatcher = Dispatcher::new(
            invoker.clone(),
            prefixes.iter().map(|p| p.to_string()).collect(),
        );
        (dispatcher, invoker)
    }

    #[tokio::test]
    async fn forwards_only_allowed_prefixes() {
        let (dispatcher, invoker) = dispatcher(&["a/", "b/"]);
        let payloads = vec![envelope(&[("a", "x"), ("c", "x"), ("b", "y")])];

        let summary = dispatcher
            .dispatch(payloads.iter().map(Vec::as_slice))
            .await
            .unwrap();

        assert_eq!(summary.records_seen, 3);
        assert_eq!(summary.forwarded, 2);
        let paths: Vec<String> = invoker
            .calls()
            .await
            .iter()
            .map(|event| event.records[0].path())
            .collect();
        assert_eq!(paths, vec!["a/x", "b/y"]);
    }

    #[tokio::test]
    async fn empty_allow_list_forwards_everything() {
        let (dispatcher, invoker) = dispatcher(&[]);
        let payloads = vec![envelope(&[("a", "x")]), envelope(&[("c", "x")])];

        let summary = dispatcher
            .dispatch(payloads.iter().map(Vec::as_slice))
            .await
            .unwrap();

        assert_eq!(summary.forwarded, 2);
        assert_eq!(invoker.call_count().await, 2);
    }

    #[tokio::test]
    async fn malformed_envelope_is_counted_not_fatal() {
        let (dispatcher, invoker) = dispatcher(&[]);
        let good = envelope(&[("a", "x")]);
        let payloads: Vec<&[u8]> = vec![&b"not json"[..], good.as_slice()];

        let summary = dispatcher.dispatch(payloads).await.unwrap();

        assert_eq!(summary.decode_errors, 1);
        assert_eq!(summary.forwarded, 1);
        assert_eq!(invoker.call_count().await, 1);
    }

    #[tokio::test]
    async fn invoke_failure_aborts_the_batch() {
        let (dispatcher, invoker) = dispatcher(&[]);
        invoker.fail_invocations(true);
        let payloads = vec![envelope(&[("a", "x"), ("a", "y")])];

        let err = dispatcher
            .dispatch(payloads.iter().map(Vec::as_slice))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Invoke(_)));
        assert_eq!(invoker.call_count().await, 0);
    }

    #[tokio::test]
    async fn each_invocation_carries_one_record() {
        let (dispatcher, invoker) = dispatcher(&[]);
        let payloads = vec![envelope(&[("a", "x"), ("a", "y"), ("a", "z")])];

        dispatcher
            .dispatch(payloads.iter().map(Vec::as_slice))
            .await
            .unwrap();

        for call in invoker.calls().await {
            assert_eq!(call.records.len(), 1);
        }
    }
}
