//! Scripted generator for tests and offline runs.
//!
//! Replies are returned in the order they were queued. Every prompt is
//! recorded so callers can assert on what was sent.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::engine::{ChatPrompt, LlmError, TextGenerator};

#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<ChatPrompt>>,
}

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        guard(&self.replies).push_back(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn fail(self, err: LlmError) -> Self {
        guard(&self.replies).push_back(Err(err));
        self
    }

    pub fn prompts(&self) -> Vec<ChatPrompt> {
        guard(&self.prompts).clone()
    }

    pub fn remaining(&self) -> usize {
        guard(&self.replies).len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
        guard(&self.prompts).push(prompt.clone());
        guard(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Backend("no scripted reply left".to_string())))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
