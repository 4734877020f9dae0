use std::sync::atomic::{AtomicUsize, Ordering};

use tabletalk_core::{ChatLlm, LlmRequest, LlmResponse, Message, RetryingLlm, TabletalkError};

struct FlakyLlm {
    calls: AtomicUsize,
    fail_first: usize,
}

#[async_trait::async_trait]
impl ChatLlm for FlakyLlm {
    async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse, TabletalkError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            Err(TabletalkError::LlmProvider("connection reset".into()))
        } else {
            Ok(LlmResponse {
                content: "ok".into(),
            })
        }
    }
}

struct EmptyLlm;

#[async_trait::async_trait]
impl ChatLlm for EmptyLlm {
    async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse, TabletalkError> {
        Err(TabletalkError::EmptyCompletion)
    }
}

fn request() -> LlmRequest {
    LlmRequest::new("test-model", vec![Message::user("hi")])
}

#[tokio::test]
async fn retries_transient_provider_failure() {
    let llm = RetryingLlm::new(
        FlakyLlm {
            calls: AtomicUsize::new(0),
            fail_first: 1,
        },
        2,
    );

    let response = llm.complete(request()).await.unwrap();
    assert_eq!(response.content, "ok");
}

#[tokio::test]
async fn surfaces_last_error_when_budget_exhausted() {
    let inner = FlakyLlm {
        calls: AtomicUsize::new(0),
        fail_first: 10,
    };
    let llm = RetryingLlm::new(inner, 2);

    let error = llm.complete(request()).await.unwrap_err();
    assert!(matches!(error, TabletalkError::LlmProvider(_)));
}

#[tokio::test]
async fn non_retryable_errors_pass_through() {
    let llm = RetryingLlm::new(EmptyLlm, 3);
    let error = llm.complete(request()).await.unwrap_err();
    assert!(matches!(error, TabletalkError::EmptyCompletion));
}
