//! The run document and its status machine

use crate::agents::payload::{
    CompetitiveOutput, DeepDiveOutput, DiscoveryOutput, FounderOutput, FounderProfile,
    InsightDocument, NewsOutput, PatentOutput, PatentRecord, Source, VerificationOutput,
};
use crate::agents::{AgentKind, AgentOutcome, ErrorClass, ErrorRecord, PriorOutputs};
use crate::budget::{AgentCost, BudgetCaps, CostSnapshot};
use crate::types::Company;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Complete,
    Partial,
    Error,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Partial | RunStatus::Error)
    }

    /// `pending -> running -> {complete|partial|error}`, plus `pending -> error`
    /// for runs that fail before they start.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match (self, next) {
            (RunStatus::Pending, RunStatus::Running | RunStatus::Error) => true,
            (RunStatus::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Partial => "partial",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Discovery,
    Research,
    Verification,
    Synthesis,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Discovery => "discovery",
            Phase::Research => "research",
            Phase::Verification => "verification",
            Phase::Synthesis => "synthesis",
        };
        f.write_str(name)
    }
}

/// Non-fatal events; kept apart from errors so they never affect classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    BudgetSkip,
    BudgetOverrun,
    Degraded,
    CancellationRequested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunNote {
    pub kind: NoteKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentKind>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl RunNote {
    pub fn new(kind: NoteKind, agent: Option<AgentKind>, message: impl Into<String>) -> Self {
        Self {
            kind,
            agent,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-agent bookkeeping visible while polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub outcome: AgentOutcome,
    pub attempts: u32,
    pub duration_ms: u64,
    pub cost: AgentCost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub company: Company,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<Phase>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub cost: CostSnapshot,
    pub errors: Vec<ErrorRecord>,
    pub notes: Vec<RunNote>,
    pub agents: BTreeMap<AgentKind, AgentSummary>,

    pub discovery: Option<DiscoveryOutput>,
    pub sources: Vec<Source>,
    pub patents: Vec<PatentRecord>,
    pub founders: Vec<FounderProfile>,
    pub competitive_analysis: Option<CompetitiveOutput>,
    pub deep_dive_analysis: Option<DeepDiveOutput>,
    pub verification_analysis: Option<VerificationOutput>,
    pub insights: Option<InsightDocument>,

    /// Agents whose result has been merged
    #[serde(skip)]
    pub(crate) applied: BTreeSet<AgentKind>,
}

impl Run {
    pub fn new(id: String, company: Company, caps: BudgetCaps) -> Self {
        let now = Utc::now();
        Self {
            id,
            company,
            status: RunStatus::Pending,
            current_phase: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            cost: CostSnapshot::with_caps(caps),
            errors: Vec::new(),
            notes: Vec::new(),
            agents: BTreeMap::new(),
            discovery: None,
            sources: Vec::new(),
            patents: Vec::new(),
            founders: Vec::new(),
            competitive_analysis: None,
            deep_dive_analysis: None,
            verification_analysis: None,
            insights: None,
            applied: BTreeSet::new(),
        }
    }

    pub fn has_result(&self, agent: AgentKind) -> bool {
        self.applied.contains(&agent)
    }

    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(|e| e.class == ErrorClass::Fatal)
    }

    pub fn outcome_of(&self, agent: AgentKind) -> Option<AgentOutcome> {
        self.agents.get(&agent).map(|s| s.outcome)
    }

    /// Outputs visible to agents of later phases
    pub fn prior_outputs(&self) -> PriorOutputs {
        let succeeded = |kind| {
            matches!(
                self.outcome_of(kind),
                Some(AgentOutcome::Succeeded | AgentOutcome::Degraded)
            )
        };
        PriorOutputs {
            discovery: self.discovery.clone(),
            news: succeeded(AgentKind::News).then(|| NewsOutput {
                sources: self.sources.clone(),
            }),
            patents: succeeded(AgentKind::Patent).then(|| PatentOutput {
                patents: self.patents.clone(),
            }),
            founders: succeeded(AgentKind::Founder).then(|| FounderOutput {
                founders: self.founders.clone(),
            }),
            competitive: self.competitive_analysis.clone(),
            deepdive: self.deep_dive_analysis.clone(),
            verification: self.verification_analysis.clone(),
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            id: self.id.clone(),
            company: self.company.clone(),
            status: self.status,
            current_phase: self.current_phase,
            created_at: self.created_at,
            completed_at: self.completed_at,
            cost: self.cost,
            error_count: self.errors.len(),
        }
    }
}

/// History listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    pub company: Company,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<Phase>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub cost: CostSnapshot,
    pub error_count: usize,
}

/// Normalized company identity used for the result cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompanyKey {
    name: String,
    domain: Option<String>,
}

impl CompanyKey {
    pub fn new(company: &Company) -> Self {
        Self {
            name: company.name.trim().to_lowercase(),
            domain: company
                .domain
                .as_deref()
                .map(normalize_domain)
                .filter(|d| !d.is_empty()),
        }
    }
}

impl From<&Company> for CompanyKey {
    fn from(company: &Company) -> Self {
        Self::new(company)
    }
}

/// `https://www.Acme.com/about/` -> `acme.com`
pub fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();
    let without_scheme = lower
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(&lower);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    host.strip_prefix("www.")
        .unwrap_or(host)
        .trim_end_matches('.')
        .to_string()
}
