//! Typed agent payloads
//!
//! Each agent kind produces exactly one payload variant. The scheduler and
//! the run store only look at the variant tag; the fields are for the agents
//! downstream and for API consumers.

use super::AgentKind;
use serde::{Deserialize, Serialize};

// ============= Discovery =============

/// Site pages classified by purpose
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyPages {
    #[serde(default)]
    pub about: Vec<String>,
    #[serde(default)]
    pub team: Vec<String>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub news: Vec<String>,
    #[serde(default)]
    pub careers: Vec<String>,
}

impl KeyPages {
    /// File `url` under every page class its path matches
    pub fn classify(&mut self, url: &str) {
        let path = url.to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| path.contains(k));

        if matches(&["about", "company", "story"]) {
            self.about.push(url.to_string());
        }
        if matches(&["team", "leadership", "people"]) {
            self.team.push(url.to_string());
        }
        if matches(&["product", "service", "solution"]) {
            self.products.push(url.to_string());
        }
        if matches(&["blog", "news", "press"]) {
            self.news.push(url.to_string());
        }
        if matches(&["career", "job", "hiring"]) {
            self.careers.push(url.to_string());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryOutput {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub key_pages: KeyPages,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub insights: Vec<String>,
}

impl DiscoveryOutput {
    /// Whether downstream agents have any company context to work from
    pub fn is_usable(&self) -> bool {
        !self.urls.is_empty() || !self.summary.trim().is_empty()
    }
}

// ============= News =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Funding,
    Partnership,
    Product,
    #[default]
    General,
}

impl SourceType {
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));
        if matches(FUNDING_KEYWORDS) {
            SourceType::Funding
        } else if matches(PARTNERSHIP_KEYWORDS) {
            SourceType::Partnership
        } else if matches(&["launch", "product", "release", "unveil"]) {
            SourceType::Product
        } else {
            SourceType::General
        }
    }
}

pub const FUNDING_KEYWORDS: &[&str] = &["funding", "investment", "raised", "series", "round", "capital"];
pub const PARTNERSHIP_KEYWORDS: &[&str] = &["partnership", "collaboration", "agreement", "deal", "alliance"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default)]
    pub relevance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsOutput {
    pub sources: Vec<Source>,
}

// ============= Patents =============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatentRecord {
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filing_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patent_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategic_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatentOutput {
    pub patents: Vec<PatentRecord>,
}

// ============= Founders =============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FounderProfile {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub background_summary: String,
    #[serde(default)]
    pub previous_experience: Vec<String>,
    #[serde(default)]
    pub key_achievements: Vec<String>,
    #[serde(default)]
    pub education: Vec<String>,
    #[serde(default)]
    pub investment_assessment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FounderOutput {
    pub founders: Vec<FounderProfile>,
}

// ============= Competitive =============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub market_position: String,
    #[serde(default)]
    pub funding_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitiveOutput {
    #[serde(default)]
    pub competitors: Vec<Competitor>,
    #[serde(default)]
    pub market_positioning: String,
    #[serde(default)]
    pub competitive_advantages: Vec<String>,
    #[serde(default)]
    pub threats: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default)]
    pub investment_implications: String,
}

// ============= Deep dive =============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepDiveOutput {
    #[serde(default)]
    pub mission_vision: String,
    #[serde(default)]
    pub business_model: String,
    #[serde(default)]
    pub product_offering: String,
    #[serde(default)]
    pub market_approach: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub growth_indicators: Vec<String>,
    #[serde(default)]
    pub investment_insights: Vec<String>,
    #[serde(default)]
    pub content_sources: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

// ============= Verification =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactStatus {
    Verified,
    PartiallyVerified,
    #[default]
    Unverified,
    Contradicted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifiedFact {
    pub claim: String,
    #[serde(default)]
    pub status: FactStatus,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutput {
    #[serde(default)]
    pub verified_facts: Vec<VerifiedFact>,
    #[serde(default)]
    pub inconsistencies: Vec<String>,
    #[serde(default)]
    pub information_gaps: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub reliability_score: f64,
    #[serde(default)]
    pub summary: String,
}

// ============= Synthesis =============

/// The final dossier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightDocument {
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub investment_signals: Vec<String>,
    #[serde(default)]
    pub risk_assessment: Vec<String>,
    #[serde(default)]
    pub funding_events: Vec<String>,
    #[serde(default)]
    pub partnerships: Vec<String>,
    #[serde(default)]
    pub market_positioning: String,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default)]
    pub investment_recommendation: String,
    /// Produced by the heuristic fallback rather than the model
    #[serde(default)]
    pub degraded: bool,
}

impl InsightDocument {
    /// Smallest document that still counts as an outcome for the run
    pub fn is_minimum_viable(&self) -> bool {
        !self.executive_summary.trim().is_empty()
            || !self.investment_signals.is_empty()
            || !self.risk_assessment.is_empty()
    }
}

// ============= Envelope =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AgentPayload {
    Discovery(DiscoveryOutput),
    News(NewsOutput),
    Patent(PatentOutput),
    Founder(FounderOutput),
    Competitive(CompetitiveOutput),
    #[serde(rename = "deepdive")]
    DeepDive(DeepDiveOutput),
    Verification(VerificationOutput),
    Synthesis(InsightDocument),
}

impl AgentPayload {
    pub fn kind(&self) -> AgentKind {
        match self {
            AgentPayload::Discovery(_) => AgentKind::Discovery,
            AgentPayload::News(_) => AgentKind::News,
            AgentPayload::Patent(_) => AgentKind::Patent,
            AgentPayload::Founder(_) => AgentKind::Founder,
            AgentPayload::Competitive(_) => AgentKind::Competitive,
            AgentPayload::DeepDive(_) => AgentKind::DeepDive,
            AgentPayload::Verification(_) => AgentKind::Verification,
            AgentPayload::Synthesis(_) => AgentKind::Synthesis,
        }
    }

    /// Structural checks on agent output; the message names the first problem
    pub fn validate(&self) -> Result<(), String> {
        fn confidence(value: f64, field: &str) -> Result<(), String> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(format!("{} must be between 0 and 1, got {}", field, value))
            }
        }

        match self {
            AgentPayload::Discovery(d) => {
                if d.urls.iter().any(|u| u.trim().is_empty()) {
                    return Err("discovery returned an empty URL".to_string());
                }
                confidence(d.confidence, "confidence")
            }
            AgentPayload::News(n) => match n.sources.iter().position(|s| s.url.trim().is_empty()) {
                Some(i) => Err(format!("source {} has no URL", i)),
                None => Ok(()),
            },
            AgentPayload::Patent(p) => match p.patents.iter().position(|r| r.title.trim().is_empty()) {
                Some(i) => Err(format!("patent {} has no title", i)),
                None => Ok(()),
            },
            AgentPayload::Founder(f) => match f.founders.iter().position(|r| r.name.trim().is_empty()) {
                Some(i) => Err(format!("founder {} has no name", i)),
                None => Ok(()),
            },
            AgentPayload::Competitive(c) => {
                match c.competitors.iter().position(|r| r.name.trim().is_empty()) {
                    Some(i) => Err(format!("competitor {} has no name", i)),
                    None => Ok(()),
                }
            }
            AgentPayload::DeepDive(d) => confidence(d.confidence, "confidence"),
            AgentPayload::Verification(v) => {
                if let Some(i) = v.verified_facts.iter().position(|f| f.claim.trim().is_empty()) {
                    return Err(format!("verified fact {} has no claim", i));
                }
                for fact in &v.verified_facts {
                    confidence(fact.confidence, "fact confidence")?;
                }
                confidence(v.reliability_score, "reliability_score")
            }
            AgentPayload::Synthesis(s) => confidence(s.confidence_score, "confidence_score"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pages_classification() {
        let mut pages = KeyPages::default();
        pages.classify("https://acme.com/about-us");
        pages.classify("https://acme.com/company/leadership");
        pages.classify("https://acme.com/careers");
        pages.classify("https://acme.com/pricing");

        assert_eq!(pages.about.len(), 2);
        assert_eq!(pages.team, vec!["https://acme.com/company/leadership"]);
        assert_eq!(pages.careers.len(), 1);
        assert!(pages.products.is_empty());
    }

    #[test]
    fn test_source_type_classification() {
        assert_eq!(SourceType::classify("Acme raised a Series B"), SourceType::Funding);
        assert_eq!(
            SourceType::classify("Acme and Globex sign alliance"),
            SourceType::Partnership
        );
        assert_eq!(SourceType::classify("Acme launches rockets"), SourceType::Product);
        assert_eq!(SourceType::classify("Weather report"), SourceType::General);
    }

    #[test]
    fn test_patent_without_title_fails_validation() {
        let payload = AgentPayload::Patent(PatentOutput {
            patents: vec![PatentRecord::default()],
        });
        assert!(payload.validate().unwrap_err().contains("no title"));
    }

    #[test]
    fn test_out_of_range_confidence_fails_validation() {
        let payload = AgentPayload::Synthesis(InsightDocument {
            executive_summary: "ok".to_string(),
            confidence_score: 7.0,
            ..Default::default()
        });
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_minimum_viable_document() {
        assert!(!InsightDocument::default().is_minimum_viable());
        let doc = InsightDocument {
            risk_assessment: vec!["key person risk".to_string()],
            ..Default::default()
        };
        assert!(doc.is_minimum_viable());
    }

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let payload = AgentPayload::DeepDive(DeepDiveOutput::default());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "deepdive");
        assert_eq!(payload.kind(), AgentKind::DeepDive);
    }
}
