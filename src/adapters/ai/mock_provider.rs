//! Scriptable mock provider for tests and local development.
//!
//! Answers with a canonical-valid body per task type unless replies are
//! scripted, and can simulate latency, unavailability and every failure
//! mode a real backend exhibits.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::foundation::ProviderId;
use crate::domain::{ProviderClass, SanitizedContext, TaskType};
use crate::ports::{ProviderAdapter, ProviderCallConfig, ProviderError, RawProviderResponse};

/// One scripted reply, consumed in FIFO order.
pub enum MockReply {
    /// Return this body as a successful response.
    Body(Value),
    /// Fail with this error.
    Fail(ProviderError),
}

/// In-memory provider adapter with scriptable behavior.
pub struct MockProvider {
    id: ProviderId,
    class: ProviderClass,
    model: String,
    capabilities: HashSet<TaskType>,
    cost_cents: u32,
    delay: Duration,
    available: AtomicBool,
    replies: Mutex<VecDeque<MockReply>>,
    calls: AtomicU32,
}

impl MockProvider {
    /// Creates a mock that supports every task type and always succeeds.
    pub fn new(id: ProviderId, class: ProviderClass) -> Self {
        Self {
            model: format!("{}-model", id.as_str()),
            id,
            class,
            capabilities: TaskType::all().into_iter().collect(),
            cost_cents: 1,
            delay: Duration::ZERO,
            available: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        }
    }

    /// Sets the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the per-call cost estimate.
    pub fn with_cost(mut self, cost_cents: u32) -> Self {
        self.cost_cents = cost_cents;
        self
    }

    /// Sets an artificial latency applied to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Restricts the supported task types.
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = TaskType>) -> Self {
        self.capabilities = capabilities.into_iter().collect();
        self
    }

    /// Queues a scripted reply; consumed before the default behavior.
    pub fn push_reply(&self, reply: MockReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Flips the availability probe.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `execute_task` calls made so far.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn default_body(task_type: TaskType) -> Value {
        match task_type {
            TaskType::Search => json!({
                "hits": [
                    {"item_id": "mock-1001", "title": "Brake pad set front", "relevance": 0.93}
                ]
            }),
            TaskType::Classification => json!({
                "intent": "order_status",
                "confidence": 0.9,
                "entities": {}
            }),
            TaskType::Suggestion => json!({
                "suggestions": [
                    {"text": "Offer matching brake discs", "score": 0.7}
                ]
            }),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn execute_task(
        &self,
        task_type: TaskType,
        context: &SanitizedContext,
        _config: &ProviderCallConfig,
    ) -> Result<RawProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());
        let body = match scripted {
            Some(MockReply::Body(body)) => body,
            Some(MockReply::Fail(err)) => return Err(err),
            None => Self::default_body(task_type),
        };

        let tokens = context.token_count().max(1);
        Ok(RawProviderResponse::new(
            body,
            tokens,
            self.cost_cents,
            self.model.clone(),
        ))
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn capabilities(&self) -> HashSet<TaskType> {
        self.capabilities.clone()
    }

    fn estimated_cost(&self, _context: &SanitizedContext) -> u32 {
        self.cost_cents
    }

    fn id(&self) -> ProviderId {
        self.id.clone()
    }

    fn class(&self) -> ProviderClass {
        self.class
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
