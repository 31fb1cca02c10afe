//! In-memory judge backend for tests.
//!
//! `ScriptedJudgeBackend` answers every prompt from a closure (or a fixed
//! string) and records the prompts it was given.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::error::JudgeResult;
use crate::judge::backend::JudgeBackend;

type Responder = Arc<dyn Fn(&str) -> JudgeResult<String> + Send + Sync>;

pub struct ScriptedJudgeBackend {
    model: String,
    responder: Responder,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedJudgeBackend {
    /// Compute each response from the prompt.
    pub fn from_fn<F>(model: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&str) -> JudgeResult<String> + Send + Sync + 'static,
    {
        Self {
            model: model.into(),
            responder: Arc::new(responder),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Same response for every prompt.
    pub fn fixed(model: impl Into<String>, response: impl Into<String>) -> Self {
        let response = response.into();
        Self::from_fn(model, move |_| Ok(response.clone()))
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl JudgeBackend for ScriptedJudgeBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> JudgeResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(prompt)
    }
}
