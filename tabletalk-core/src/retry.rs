use crate::{ChatLlm, LlmRequest, LlmResponse, TabletalkError};

pub fn is_retryable(error: &TabletalkError) -> bool {
    matches!(
        error,
        TabletalkError::LlmProvider(_) | TabletalkError::Timeout(_)
    )
}

/// Wraps a `ChatLlm` with bounded retries on transient provider failures.
/// Non-retryable errors pass through untouched.
pub struct RetryingLlm<L> {
    inner: L,
    max_attempts: usize,
}

impl<L> RetryingLlm<L> {
    pub fn new(inner: L, max_attempts: usize) -> Self {
        Self {
            inner,
            max_attempts,
        }
    }
}

#[async_trait::async_trait]
impl<L: ChatLlm> ChatLlm for RetryingLlm<L> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, TabletalkError> {
        if self.max_attempts == 0 {
            return Err(TabletalkError::MaxRetriesExceeded { max: 0 });
        }

        let mut last = None;
        for _attempt in 1..=self.max_attempts {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    if !is_retryable(&error) {
                        return Err(error);
                    }
                    last = Some(error);
                }
            }
        }

        Err(last.unwrap_or(TabletalkError::MaxRetriesExceeded {
            max: self.max_attempts,
        }))
    }
}
