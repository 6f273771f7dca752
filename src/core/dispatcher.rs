//! Concurrent fan-out of one logical request to many addons.
//!
//! Every candidate gets its own spawned task, so a slow addon never blocks
//! another. Failures stay inside their task and come back as
//! [`Outcome::Absent`]; nothing a single addon does can fail the whole
//! dispatch. Cancellation is scoped: each dispatch works under a child of
//! the caller's token, and dropping the dispatch future cancels the
//! children it spawned.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::de::DeserializeOwned;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use super::{Transport, TransportError};

/// Why an addon produced no usable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbsentReason {
    /// The call hit its timeout.
    Timeout,
    /// Connection-level failure.
    Network(String),
    /// Non-success HTTP status.
    Status(u16),
    /// Body did not decode into the expected shape.
    Decode(String),
    /// Decoded fine but carried nothing.
    Empty,
    /// Request was not sent, e.g. a required extra was missing.
    Unsupported(String),
    /// The dispatch was cancelled before this call finished.
    Cancelled,
    /// The task panicked.
    Panicked,
}

impl fmt::Display for AbsentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Network(e) => write!(f, "network error: {e}"),
            Self::Status(code) => write!(f, "HTTP {code}"),
            Self::Decode(e) => write!(f, "malformed body: {e}"),
            Self::Empty => write!(f, "empty response"),
            Self::Unsupported(why) => write!(f, "not requested: {why}"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Panicked => write!(f, "task panicked"),
        }
    }
}

impl From<TransportError> for AbsentReason {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(_) => Self::Timeout,
            TransportError::Network(e) => Self::Network(e),
            TransportError::Status { status, .. } => Self::Status(status),
        }
    }
}

impl From<JoinError> for AbsentReason {
    fn from(err: JoinError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Panicked
        }
    }
}

/// Per-addon result of one dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Present(T),
    Absent(AbsentReason),
}

impl<T> Outcome<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent(_))
    }

    /// Consume into the value, if any.
    pub fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent(_) => None,
        }
    }

    pub fn as_present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent(_) => None,
        }
    }

    pub fn absent_reason(&self) -> Option<&AbsentReason> {
        match self {
            Self::Present(_) => None,
            Self::Absent(reason) => Some(reason),
        }
    }

    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Present(value) => Outcome::Present(f(value)),
            Self::Absent(reason) => Outcome::Absent(reason),
        }
    }

    /// Turn a present value that carries nothing into `Absent(Empty)`.
    pub fn non_empty<F>(self, is_empty: F) -> Self
    where
        F: FnOnce(&T) -> bool,
    {
        match self {
            Self::Present(value) if is_empty(&value) => Self::Absent(AbsentReason::Empty),
            other => other,
        }
    }
}

/// Outcomes of one dispatch, in candidate order.
pub type Outcomes<C, T> = Vec<(C, Outcome<T>)>;

/// Fans one logical request out to many addons.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    /// Backstop for transports without their own timeout.
    call_timeout: Option<Duration>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("call_timeout", &self.call_timeout).finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, call_timeout: None }
    }

    /// Bound every call to `timeout`, on top of the transport's own.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Query every candidate concurrently and wait for all of them.
    ///
    /// `url_for` builds the request URL for a candidate; an `Err` skips the
    /// network call and records that reason. The result has one entry per
    /// candidate, in input order regardless of completion order.
    pub async fn dispatch<C, T, F>(
        &self,
        candidates: Vec<C>,
        url_for: F,
        cancel: &CancellationToken,
    ) -> Outcomes<C, T>
    where
        F: Fn(&C) -> Result<String, AbsentReason>,
        T: DeserializeOwned + Send + 'static,
    {
        if candidates.is_empty() {
            return Vec::new();
        }

        let token = cancel.child_token();
        let _guard = token.clone().drop_guard();

        let tasks = candidates.iter().map(|candidate| {
            let spawned = url_for(candidate).map(|url| self.spawn_fetch::<T>(url, token.clone()));
            async move {
                match spawned {
                    Ok(handle) => handle.await.unwrap_or_else(|e| Outcome::Absent(e.into())),
                    Err(reason) => Outcome::Absent(reason),
                }
            }
        });

        let outcomes = join_all(tasks).await;
        tracing::debug!(
            candidates = outcomes.len(),
            present = outcomes.iter().filter(|o| o.is_present()).count(),
            "Dispatch complete"
        );

        candidates.into_iter().zip(outcomes).collect()
    }

    /// Query every candidate concurrently and return the first usable value.
    ///
    /// `extract` decides whether a decoded body is usable. As soon as one is,
    /// the remaining calls are cancelled. Returns `None` when every candidate
    /// comes back absent or unusable.
    pub async fn dispatch_first<C, T, U, F, X>(
        &self,
        candidates: Vec<C>,
        url_for: F,
        mut extract: X,
        cancel: &CancellationToken,
    ) -> Option<(C, U)>
    where
        F: Fn(&C) -> Result<String, AbsentReason>,
        X: FnMut(T) -> Option<U>,
        T: DeserializeOwned + Send + 'static,
    {
        let token = cancel.child_token();
        let _guard = token.clone().drop_guard();

        let mut pending = FuturesUnordered::new();
        for (position, candidate) in candidates.iter().enumerate() {
            match url_for(candidate) {
                Ok(url) => {
                    let handle = self.spawn_fetch::<T>(url, token.clone());
                    pending.push(async move { (position, handle.await) });
                }
                Err(reason) => tracing::debug!(%reason, "Candidate skipped"),
            }
        }

        while let Some((position, joined)) = pending.next().await {
            let Ok(Outcome::Present(body)) = joined else {
                continue;
            };

            if let Some(value) = extract(body) {
                token.cancel();
                return candidates.into_iter().nth(position).map(|c| (c, value));
            }
        }

        None
    }

    fn spawn_fetch<T>(
        &self,
        url: String,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<Outcome<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let transport = Arc::clone(&self.transport);
        let call_timeout = self.call_timeout;
        tokio::spawn(async move { fetch(transport, url, call_timeout, cancel).await })
    }
}

async fn fetch<T>(
    transport: Arc<dyn Transport>,
    url: String,
    call_timeout: Option<Duration>,
    cancel: CancellationToken,
) -> Outcome<T>
where
    T: DeserializeOwned,
{
    let call = async {
        match call_timeout {
            Some(limit) => tokio::time::timeout(limit, transport.get(&url))
                .await
                .unwrap_or_else(|_| Err(TransportError::Timeout(url.clone()))),
            None => transport.get(&url).await,
        }
    };

    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => return Outcome::Absent(AbsentReason::Cancelled),
        result = call => result,
    };

    let body = match result {
        Ok(body) => body,
        Err(err @ (TransportError::Timeout(_) | TransportError::Network(_))) => {
            tracing::warn!(url = %url, error = %err, "Addon request failed");
            return Outcome::Absent(err.into());
        }
        Err(err) => {
            tracing::debug!(url = %url, error = %err, "Addon request rejected");
            return Outcome::Absent(err.into());
        }
    };

    match serde_json::from_slice::<T>(&body) {
        Ok(value) => Outcome::Present(value),
        Err(err) => {
            tracing::debug!(url = %url, error = %err, "Addon response malformed");
            Outcome::Absent(AbsentReason::Decode(err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Body {
        value: u32,
    }

    fn url(name: &&str) -> Result<String, AbsentReason> {
        Ok(format!("https://{name}.test/body.json"))
    }

    #[tokio::test]
    async fn test_outcomes_follow_candidate_order() {
        let transport = MockTransport::new()
            .respond_after("https://slow.test/body.json", r#"{"value": 1}"#, Duration::from_millis(50))
            .respond("https://fast.test/body.json", r#"{"value": 2}"#);
        let dispatcher = Dispatcher::new(Arc::new(transport));

        let outcomes: Outcomes<&str, Body> =
            dispatcher.dispatch(vec!["slow", "fast"], url, &CancellationToken::new()).await;

        assert_eq!(outcomes[0], ("slow", Outcome::Present(Body { value: 1 })));
        assert_eq!(outcomes[1], ("fast", Outcome::Present(Body { value: 2 })));
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let transport = MockTransport::new()
            .respond("https://one.test/body.json", r#"{"value": 1}"#)
            .fail("https://two.test/body.json", TransportError::Network("reset".to_string()))
            .respond("https://three.test/body.json", r#"{"value": 3}"#);
        let dispatcher = Dispatcher::new(Arc::new(transport));

        let outcomes: Outcomes<&str, Body> = dispatcher
            .dispatch(vec!["one", "two", "three"], url, &CancellationToken::new())
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].1.is_present());
        assert_eq!(outcomes[1].1, Outcome::Absent(AbsentReason::Network("reset".to_string())));
        assert!(outcomes[2].1.is_present());
    }

    #[tokio::test]
    async fn test_malformed_body_is_absent() {
        let transport = MockTransport::new().respond("https://bad.test/body.json", "<html>");
        let dispatcher = Dispatcher::new(Arc::new(transport));

        let outcomes: Outcomes<&str, Body> =
            dispatcher.dispatch(vec!["bad"], url, &CancellationToken::new()).await;

        assert!(matches!(outcomes[0].1, Outcome::Absent(AbsentReason::Decode(_))));
    }

    #[tokio::test]
    async fn test_unbuildable_request_is_not_sent() {
        let transport = MockTransport::new();
        let dispatcher = Dispatcher::new(Arc::new(transport.clone()));

        let outcomes: Outcomes<&str, Body> = dispatcher
            .dispatch(
                vec!["skip"],
                |_| Err(AbsentReason::Unsupported("genre".to_string())),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcomes[0].1, Outcome::Absent(AbsentReason::Unsupported("genre".to_string())));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_only_affects_slow_addon() {
        let transport = MockTransport::new()
            .respond_after("https://slow.test/body.json", r#"{"value": 1}"#, Duration::from_secs(60))
            .respond("https://fast.test/body.json", r#"{"value": 2}"#);
        let dispatcher =
            Dispatcher::new(Arc::new(transport)).with_call_timeout(Duration::from_secs(5));

        let outcomes: Outcomes<&str, Body> =
            dispatcher.dispatch(vec!["slow", "fast"], url, &CancellationToken::new()).await;

        assert_eq!(outcomes[0].1, Outcome::Absent(AbsentReason::Timeout));
        assert!(outcomes[1].1.is_present());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_marks_outstanding_calls() {
        let transport = MockTransport::new()
            .respond_after("https://slow.test/body.json", r#"{"value": 1}"#, Duration::from_secs(30));
        let dispatcher = Dispatcher::new(Arc::new(transport));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let outcomes: Outcomes<&str, Body> = dispatcher.dispatch(vec!["slow"], url, &cancel).await;
        assert_eq!(outcomes[0].1, Outcome::Absent(AbsentReason::Cancelled));
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let dispatcher = Dispatcher::new(Arc::new(MockTransport::new()));
        let outcomes: Outcomes<&str, Body> =
            dispatcher.dispatch(Vec::new(), url, &CancellationToken::new()).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_match_short_circuits() {
        let transport = MockTransport::new()
            .respond_after("https://slow.test/body.json", r#"{"value": 1}"#, Duration::from_secs(30))
            .respond("https://empty.test/body.json", r#"{"value": 0}"#)
            .respond_after("https://fast.test/body.json", r#"{"value": 7}"#, Duration::from_millis(5));
        let dispatcher = Dispatcher::new(Arc::new(transport));

        let started = tokio::time::Instant::now();
        let found = dispatcher
            .dispatch_first(
                vec!["slow", "empty", "fast"],
                url,
                |body: Body| (body.value > 0).then_some(body.value),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(found, Some(("fast", 7)));
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_first_match_all_absent() {
        let transport = MockTransport::new()
            .fail("https://a.test/body.json", TransportError::Timeout("a".to_string()));
        let dispatcher = Dispatcher::new(Arc::new(transport));

        let found: Option<(&str, u32)> = dispatcher
            .dispatch_first(
                vec!["a", "b"],
                url,
                |body: Body| Some(body.value),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(found, None);
    }

    #[test]
    fn test_outcome_helpers() {
        let present: Outcome<Vec<u32>> = Outcome::Present(vec![]);
        assert_eq!(present.clone().non_empty(Vec::is_empty), Outcome::Absent(AbsentReason::Empty));
        assert_eq!(present.map(|v| v.len()), Outcome::Present(0));

        let absent: Outcome<u32> = Outcome::Absent(AbsentReason::Timeout);
        assert!(absent.is_absent());
        assert_eq!(absent.absent_reason(), Some(&AbsentReason::Timeout));
        assert_eq!(absent.present(), None);
    }

    #[test]
    fn test_reason_from_transport_error() {
        let reason: AbsentReason =
            TransportError::Status { url: "u".to_string(), status: 404 }.into();
        assert_eq!(reason, AbsentReason::Status(404));
        assert_eq!(reason.to_string(), "HTTP 404");
    }
}
