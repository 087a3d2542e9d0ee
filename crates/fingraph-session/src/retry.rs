//! Bounded retry for agent calls.

use std::future::Future;

use tracing::warn;

use crate::{
  agent::Validate,
  error::{AgentError, Error, Result},
};

/// Attempts per agent call before the turn is abandoned.
pub const MAX_AGENT_ATTEMPTS: u32 = 3;

/// Run `attempt` until it yields a response that passes validation, at most
/// [`MAX_AGENT_ATTEMPTS`] times. Attempts are independent and immediate.
pub async fn with_retry<T, F, Fut>(call: &'static str, mut attempt: F) -> Result<T>
where
  T: Validate,
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, AgentError>>,
{
  let mut n = 1;
  loop {
    let result = attempt()
      .await
      .and_then(|response| response.validate().map(|()| response));
    match result {
      Ok(response) => return Ok(response),
      Err(error) => {
        warn!(call, attempt = n, %error, "agent call failed");
        if n >= MAX_AGENT_ATTEMPTS {
          return Err(Error::InteractionRetryExhausted {
            call,
            attempts: n,
            last: error,
          });
        }
        n += 1;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  #[derive(Debug)]
  struct Reply(bool);

  impl Validate for Reply {
    fn validate(&self) -> Result<(), AgentError> {
      if self.0 { Ok(()) } else { Err(AgentError::Schema("bad".into())) }
    }
  }

  #[tokio::test]
  async fn succeeds_after_transient_failures() {
    let calls = &AtomicU32::new(0);
    let reply = with_retry("test", move || async move {
      match calls.fetch_add(1, Ordering::SeqCst) {
        0 => Err(AgentError::Transport("down".into())),
        1 => Ok(Reply(false)),
        _ => Ok(Reply(true)),
      }
    })
    .await
    .unwrap();

    assert!(reply.0);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn gives_up_after_three_attempts() {
    let calls = &AtomicU32::new(0);
    let err = with_retry("test", move || async move {
      calls.fetch_add(1, Ordering::SeqCst);
      Err::<Reply, _>(AgentError::Parse("garbage".into()))
    })
    .await
    .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), MAX_AGENT_ATTEMPTS);
    assert!(matches!(
      err,
      Error::InteractionRetryExhausted {
        call: "test",
        attempts: 3,
        last: AgentError::Parse(_),
      }
    ));
  }
}
