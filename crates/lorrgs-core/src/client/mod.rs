//! Analytics API client seam.
//!
//! The engine only needs `query(text) -> data`; the HTTP implementation lives
//! in [`http`] and tests use an in-memory fake.

pub mod http;

use std::future::Future;

use serde_json::Value;

use crate::errors::ClientError;

/// An async GraphQL endpoint. `text` is the body inside the outer braces;
/// the result is the `data` object of the response.
pub trait GraphQlClient: Send + Sync {
    fn query(&self, text: &str) -> impl Future<Output = Result<Value, ClientError>> + Send;
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;

    type Responder = Box<dyn Fn(&str) -> Result<Value, ClientError> + Send + Sync>;

    /// Replays scripted responses, then falls back to a responder function.
    pub struct FakeClient {
        script: Mutex<VecDeque<Result<Value, ClientError>>>,
        fallback: Responder,
        calls: Mutex<Vec<String>>,
    }

    impl FakeClient {
        pub fn new(fallback: impl Fn(&str) -> Result<Value, ClientError> + Send + Sync + 'static) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: Box::new(fallback),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn push(&self, response: Result<Value, ClientError>) {
            self.script.lock().push_back(response);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl GraphQlClient for FakeClient {
        async fn query(&self, text: &str) -> Result<Value, ClientError> {
            self.calls.lock().push(text.to_string());
            let scripted = self.script.lock().pop_front();
            match scripted {
                Some(response) => response,
                None => (self.fallback)(text),
            }
        }
    }
}
