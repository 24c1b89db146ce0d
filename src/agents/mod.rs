//! Research agents
//!
//! Every research capability implements [`ResearchAgent`]. The orchestrator
//! never calls an agent directly: it goes through [`AgentAdapter`], which
//! wraps each invocation with budget admission, a timeout, a single retry on
//! transient failure and panic isolation, and always hands back a
//! well-formed [`AgentResult`].

pub mod adapter;
pub mod builtin;
pub mod payload;
pub mod registry;
pub mod result;

use crate::budget::{CostEstimate, CostMeter, PriceTable};
use crate::types::Company;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

pub use adapter::{AdapterPolicy, AgentAdapter};
pub use payload::AgentPayload;
pub use registry::{AgentRegistry, AgentRegistryBuilder};
pub use result::{AgentError, AgentOutcome, AgentResult, ErrorClass, ErrorRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Discovery,
    News,
    Patent,
    Founder,
    Competitive,
    #[serde(rename = "deepdive")]
    DeepDive,
    Verification,
    Synthesis,
}

impl AgentKind {
    pub const ALL: [AgentKind; 8] = [
        AgentKind::Discovery,
        AgentKind::News,
        AgentKind::Patent,
        AgentKind::Founder,
        AgentKind::Competitive,
        AgentKind::DeepDive,
        AgentKind::Verification,
        AgentKind::Synthesis,
    ];

    /// The parallel research fan-out
    pub const RESEARCH: [AgentKind; 5] = [
        AgentKind::News,
        AgentKind::Patent,
        AgentKind::Founder,
        AgentKind::Competitive,
        AgentKind::DeepDive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Discovery => "discovery",
            AgentKind::News => "news",
            AgentKind::Patent => "patent",
            AgentKind::Founder => "founder",
            AgentKind::Competitive => "competitive",
            AgentKind::DeepDive => "deepdive",
            AgentKind::Verification => "verification",
            AgentKind::Synthesis => "synthesis",
        }
    }

    /// A budget skip of a load-bearing agent keeps the run from `complete`
    pub fn is_load_bearing(&self) -> bool {
        matches!(self, AgentKind::Discovery | AgentKind::Synthesis)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        AgentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown agent kind '{}'", s))
    }
}

/// Outputs of earlier phases visible to an agent
#[derive(Debug, Clone, Default)]
pub struct PriorOutputs {
    pub discovery: Option<payload::DiscoveryOutput>,
    pub news: Option<payload::NewsOutput>,
    pub patents: Option<payload::PatentOutput>,
    pub founders: Option<payload::FounderOutput>,
    pub competitive: Option<payload::CompetitiveOutput>,
    pub deepdive: Option<payload::DeepDiveOutput>,
    pub verification: Option<payload::VerificationOutput>,
}

/// Everything an agent invocation is allowed to see
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub run_id: String,
    pub company: Company,
    pub prior: PriorOutputs,
    pub cancel: CancellationToken,
}

impl AgentContext {
    pub fn new(run_id: impl Into<String>, company: Company) -> Self {
        Self {
            run_id: run_id.into(),
            company,
            prior: PriorOutputs::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// "Acme (acme.com)" or just "Acme"
    pub fn company_label(&self) -> String {
        match &self.company.domain {
            Some(domain) => format!("{} ({})", self.company.name, domain),
            None => self.company.name.clone(),
        }
    }
}

/// One research capability with a uniform input/output/cost contract
#[async_trait]
pub trait ResearchAgent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Upper-bound cost used for admission control before `run`
    fn estimate(&self, ctx: &AgentContext, prices: &PriceTable) -> CostEstimate;

    /// Do the work. Every billable call must be reported to `meter`.
    async fn run(&self, ctx: &AgentContext, meter: &CostMeter) -> Result<AgentPayload, AgentError>;

    /// Cheaper output used when the budget refuses `estimate`
    fn fallback(&self, _ctx: &AgentContext) -> Option<AgentPayload> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in AgentKind::ALL {
            assert_eq!(kind.as_str().parse::<AgentKind>().unwrap(), kind);
        }
        assert!("router".parse::<AgentKind>().is_err());
    }

    #[test]
    fn test_load_bearing_agents() {
        let load_bearing: Vec<_> = AgentKind::ALL
            .into_iter()
            .filter(AgentKind::is_load_bearing)
            .collect();
        assert_eq!(load_bearing, vec![AgentKind::Discovery, AgentKind::Synthesis]);
    }

    #[test]
    fn test_company_label() {
        let ctx = AgentContext::new("r", Company::new("Acme", Some("acme.com".into())));
        assert_eq!(ctx.company_label(), "Acme (acme.com)");
    }
}
