//! Mock implementations for testing.
//!
//! [`ScriptedAgent`] stands in for any research agent. Each invocation pops
//! the next [`Step`] from its script (repeating the last one once the script
//! runs out), records what it would have spent on the meter, and returns a
//! canned payload for its kind.

use async_trait::async_trait;
use compass::agents::builtin::heuristic_insights;
use compass::agents::payload::{
    AgentPayload, CompetitiveOutput, Competitor, DeepDiveOutput, DiscoveryOutput, FactStatus,
    FounderOutput, FounderProfile, InsightDocument, NewsOutput, PatentOutput, PatentRecord, Source,
    SourceType, VerificationOutput, VerifiedFact,
};
use compass::agents::{AgentContext, AgentError, AgentKind, ResearchAgent};
use compass::budget::{CostEstimate, CostMeter, PriceTable, TokenUsage};
use compass::types::AppError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What one invocation does
#[derive(Debug, Clone)]
pub enum Step {
    /// Return the canned payload
    Succeed,
    /// Sleep, then return the canned payload
    SucceedAfter(Duration),
    /// Block until the run is cancelled, then return the canned payload
    SucceedOnCancel,
    /// Fail with a retryable upstream error
    Transient,
    /// Return a payload that fails schema validation
    Invalid,
    /// Fail with a non-retryable error
    Fatal,
    /// Never finish
    Hang,
    Panic,
}

pub struct ScriptedAgent {
    kind: AgentKind,
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    calls: AtomicU32,
    estimate: CostEstimate,
    search_spend: f64,
    llm_tokens: u64,
    degrade: bool,
}

impl ScriptedAgent {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(Step::Succeed),
            calls: AtomicU32::new(0),
            estimate: CostEstimate::search(1.0),
            search_spend: 1.0,
            llm_tokens: 0,
            degrade: false,
        }
    }

    pub fn steps(self, steps: impl IntoIterator<Item = Step>) -> Self {
        let steps: VecDeque<Step> = steps.into_iter().collect();
        if let Some(last) = steps.back() {
            *self.last.lock() = last.clone();
        }
        *self.script.lock() = steps;
        self
    }

    pub fn step(self, step: Step) -> Self {
        self.steps([step])
    }

    /// Admission estimate checked before running
    pub fn estimate(mut self, estimate: CostEstimate) -> Self {
        self.estimate = estimate;
        self
    }

    /// Actual search credits recorded on every invocation
    pub fn spends(mut self, credits: f64) -> Self {
        self.search_spend = credits;
        self
    }

    /// Tokens recorded against `gpt-4o` on every invocation
    pub fn uses_tokens(mut self, tokens: u64) -> Self {
        self.llm_tokens = tokens;
        self
    }

    /// Offer the heuristic insight document when the budget refuses
    pub fn with_fallback(mut self) -> Self {
        self.degrade = true;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.last.lock().clone())
    }
}

#[async_trait]
impl ResearchAgent for ScriptedAgent {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    fn estimate(&self, _ctx: &AgentContext, _prices: &PriceTable) -> CostEstimate {
        self.estimate
    }

    async fn run(&self, ctx: &AgentContext, meter: &CostMeter) -> Result<AgentPayload, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step();

        meter.record_search(self.search_spend);
        if self.llm_tokens > 0 {
            meter.record_llm("gpt-4o", TokenUsage::new(self.llm_tokens / 2, self.llm_tokens / 2));
        }

        match step {
            Step::Succeed => Ok(sample_payload(self.kind)),
            Step::SucceedAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(sample_payload(self.kind))
            }
            Step::SucceedOnCancel => {
                ctx.cancel.cancelled().await;
                Ok(sample_payload(self.kind))
            }
            Step::Transient => Err(AgentError::Upstream(AppError::Search(
                "upstream returned 503".to_string(),
            ))),
            Step::Invalid => Ok(invalid_payload(self.kind)),
            Step::Fatal => Err(AgentError::Upstream(AppError::Configuration(
                "upstream returned 401".to_string(),
            ))),
            Step::Hang => std::future::pending().await,
            Step::Panic => panic!("scripted panic in {} agent", self.kind),
        }
    }

    fn fallback(&self, ctx: &AgentContext) -> Option<AgentPayload> {
        if !self.degrade {
            return None;
        }
        let document = heuristic_insights(ctx);
        document
            .is_minimum_viable()
            .then_some(AgentPayload::Synthesis(document))
    }
}

/// One scripted agent per kind, all succeeding by default
pub struct MockAgents {
    agents: Vec<Arc<ScriptedAgent>>,
}

impl MockAgents {
    pub fn succeeding() -> Self {
        Self {
            agents: AgentKind::ALL
                .into_iter()
                .map(|kind| Arc::new(ScriptedAgent::new(kind)))
                .collect(),
        }
    }

    /// Replace the agent for its kind
    pub fn with(mut self, agent: ScriptedAgent) -> Self {
        let kind = agent.kind;
        self.agents.retain(|a| a.kind != kind);
        self.agents.push(Arc::new(agent));
        self
    }

    pub fn get(&self, kind: AgentKind) -> Arc<ScriptedAgent> {
        self.agents
            .iter()
            .find(|a| a.kind == kind)
            .cloned()
            .expect("every kind has a scripted agent")
    }

    pub fn calls(&self, kind: AgentKind) -> u32 {
        self.get(kind).calls()
    }

    pub fn registry(&self) -> compass::AgentRegistry {
        self.agents
            .iter()
            .fold(compass::AgentRegistryBuilder::new(), |builder, agent| {
                builder.with_agent(Arc::clone(agent) as Arc<dyn ResearchAgent>)
            })
            .build()
            .expect("all kinds registered")
    }
}

pub fn sample_payload(kind: AgentKind) -> AgentPayload {
    match kind {
        AgentKind::Discovery => AgentPayload::Discovery(DiscoveryOutput {
            urls: vec!["https://acme.com".into(), "https://acme.com/about".into()],
            aliases: vec!["Acme Corp".into()],
            confidence: 0.9,
            summary: "Acme builds industrial anvils.".into(),
            ..Default::default()
        }),
        AgentKind::News => AgentPayload::News(NewsOutput {
            sources: vec![Source {
                title: "Acme raised $20M Series A".into(),
                url: "https://news.example/acme-series-a".into(),
                snippet: "The round was led by Globex Ventures.".into(),
                source_type: SourceType::Funding,
                relevance: 0.8,
                ..Default::default()
            }],
        }),
        AgentKind::Patent => AgentPayload::Patent(PatentOutput {
            patents: vec![PatentRecord {
                title: "Drop-forged anvil with damping core".into(),
                assignee: "Acme".into(),
                patent_number: Some("US1234567".into()),
                ..Default::default()
            }],
        }),
        AgentKind::Founder => AgentPayload::Founder(FounderOutput {
            founders: vec![FounderProfile {
                name: "Wile E. Coyote".into(),
                role: "CEO".into(),
                ..Default::default()
            }],
        }),
        AgentKind::Competitive => AgentPayload::Competitive(CompetitiveOutput {
            competitors: vec![Competitor {
                name: "Globex".into(),
                ..Default::default()
            }],
            market_positioning: "Premium anvils for demanding customers".into(),
            ..Default::default()
        }),
        AgentKind::DeepDive => AgentPayload::DeepDive(DeepDiveOutput {
            business_model: "Direct sales".into(),
            confidence: 0.7,
            ..Default::default()
        }),
        AgentKind::Verification => AgentPayload::Verification(VerificationOutput {
            verified_facts: vec![VerifiedFact {
                claim: "Acme raised a Series A".into(),
                status: FactStatus::Verified,
                confidence: 0.8,
                ..Default::default()
            }],
            reliability_score: 0.8,
            summary: "Funding claims check out.".into(),
            ..Default::default()
        }),
        AgentKind::Synthesis => AgentPayload::Synthesis(InsightDocument {
            executive_summary: "Acme is a well-funded anvil maker.".into(),
            investment_signals: vec!["Series A closed".into()],
            confidence_score: 0.75,
            investment_recommendation: "Monitor".into(),
            ..Default::default()
        }),
    }
}

/// A payload of the right kind that violates its schema
pub fn invalid_payload(kind: AgentKind) -> AgentPayload {
    match kind {
        AgentKind::Discovery => AgentPayload::Discovery(DiscoveryOutput {
            confidence: 7.0,
            ..Default::default()
        }),
        AgentKind::News => AgentPayload::News(NewsOutput {
            sources: vec![Source::default()],
        }),
        AgentKind::Patent => AgentPayload::Patent(PatentOutput {
            patents: vec![PatentRecord::default()],
        }),
        AgentKind::Founder => AgentPayload::Founder(FounderOutput {
            founders: vec![FounderProfile::default()],
        }),
        AgentKind::Competitive => AgentPayload::Competitive(CompetitiveOutput {
            competitors: vec![Competitor::default()],
            ..Default::default()
        }),
        AgentKind::DeepDive => AgentPayload::DeepDive(DeepDiveOutput {
            confidence: -1.0,
            ..Default::default()
        }),
        AgentKind::Verification => AgentPayload::Verification(VerificationOutput {
            reliability_score: 2.0,
            ..Default::default()
        }),
        AgentKind::Synthesis => AgentPayload::Synthesis(InsightDocument {
            confidence_score: 1.5,
            ..Default::default()
        }),
    }
}
