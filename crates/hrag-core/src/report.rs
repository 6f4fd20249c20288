//! Report assembly: a pure function from (query, evidence) to seven fixed
//! sections.
//!
//! Every section is always present and always in [`SectionKind::ALL`] order.
//! A section whose evidence is failed, timed out, or empty renders a
//! `[no data]` line naming the condition instead of disappearing.

use std::fmt;

use serde::Serialize;

use crate::config::ReportConfig;
use crate::model::{EvidenceBundle, EvidenceItem, EvidencePayload, EvidenceStatus, Query, Source};

const RULE: &str = "==============================";
const NO_DATA: &str = "[no data]";
const MAX_RECOMMENDATIONS: usize = 6;

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

/// Confidence in the report, from the number of sources that returned
/// evidence: all three is `High`, exactly two is `Medium`, fewer is `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    #[must_use]
    pub const fn from_ok_count(ok: usize) -> Self {
        match ok {
            3.. => Self::High,
            2 => Self::Medium,
            _ => Self::Low,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    ExecutiveSummary,
    WebIntelligence,
    VectorInsights,
    GraphReasoning,
    RiskOpportunity,
    Recommendations,
    Confidence,
}

impl SectionKind {
    pub const ALL: [Self; 7] = [
        Self::ExecutiveSummary,
        Self::WebIntelligence,
        Self::VectorInsights,
        Self::GraphReasoning,
        Self::RiskOpportunity,
        Self::Recommendations,
        Self::Confidence,
    ];

    #[must_use]
    pub const fn heading(self) -> &'static str {
        match self {
            Self::ExecutiveSummary => "EXECUTIVE SUMMARY",
            Self::WebIntelligence => "WEB INTELLIGENCE [WEB]",
            Self::VectorInsights => "INTERNAL VECTOR INSIGHTS [VECTOR]",
            Self::GraphReasoning => "GRAPH REASONING [KG]",
            Self::RiskOpportunity => "RISK & OPPORTUNITY MATRIX",
            Self::Recommendations => "STRATEGIC RECOMMENDATIONS",
            Self::Confidence => "CONFIDENCE LEVEL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    kind: SectionKind,
    heading: &'static str,
    lines: Vec<String>,
    placeholder: bool,
}

impl Section {
    fn new(kind: SectionKind, lines: Vec<String>) -> Self {
        Self {
            kind,
            heading: kind.heading(),
            lines,
            placeholder: false,
        }
    }

    fn placeholder(kind: SectionKind, line: String) -> Self {
        Self {
            kind,
            heading: kind.heading(),
            lines: vec![line],
            placeholder: true,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> SectionKind {
        self.kind
    }

    #[must_use]
    pub const fn heading(&self) -> &'static str {
        self.heading
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// True when the section carries a `[no data]` marker instead of evidence.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

/// The rendered artifact of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    query: String,
    confidence: Confidence,
    sections: Vec<Section>,
}

impl Report {
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub const fn confidence(&self) -> Confidence {
        self.confidence
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Every kind is present by construction.
    #[must_use]
    pub fn section(&self, kind: SectionKind) -> &Section {
        let idx = SectionKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default();
        &self.sections[idx]
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "{RULE}")?;
            writeln!(f, "{}", section.heading)?;
            writeln!(f, "{RULE}")?;
            for line in &section.lines {
                writeln!(f, "{line}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Turns an evidence bundle into a [`Report`]. Holds only configuration; no
/// I/O happens here.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    risk_terms: Vec<String>,
    opportunity_terms: Vec<String>,
    graph_path: String,
}

impl ReportAssembler {
    #[must_use]
    pub fn new(config: &ReportConfig, graph_path: impl Into<String>) -> Self {
        Self {
            risk_terms: lowercase_terms(&config.risk_terms),
            opportunity_terms: lowercase_terms(&config.opportunity_terms),
            graph_path: graph_path.into(),
        }
    }

    #[must_use]
    pub fn assemble(&self, query: &Query, bundle: &EvidenceBundle) -> Report {
        let confidence = Confidence::from_ok_count(bundle.ok_count());
        let signals = self.signals(bundle);

        let sections = vec![
            executive_summary(query, bundle),
            list_section(SectionKind::WebIntelligence, bundle.get(Source::Web)),
            list_section(SectionKind::VectorInsights, bundle.get(Source::Vector)),
            self.graph_section(bundle.get(Source::Graph)),
            risk_section(bundle, &signals),
            recommendations_section(bundle, &signals),
            confidence_section(bundle, confidence),
        ];

        Report {
            query: query.as_str().to_owned(),
            confidence,
            sections,
        }
    }

    fn graph_section(&self, item: &EvidenceItem) -> Section {
        let kind = SectionKind::GraphReasoning;
        if let Some(line) = placeholder_line(item) {
            return Section::placeholder(kind, line);
        }

        let mut lines = vec!["Entities:".to_string()];
        if let EvidencePayload::Records(records) = item.payload() {
            lines.extend(records.iter().map(|r| format!("- {r}")));
        }
        lines.push(String::new());
        lines.push(format!("Relationship path: {}", self.graph_path));
        Section::new(kind, lines)
    }

    fn signals(&self, bundle: &EvidenceBundle) -> Signals {
        let mut signals = Signals::default();
        for item in bundle.items().filter(|item| item.is_ok()) {
            for text in item.payload().texts() {
                let lower = text.to_lowercase();
                if self.risk_terms.iter().any(|t| lower.contains(t.as_str())) {
                    push_unique(&mut signals.risks, text);
                }
                if self
                    .opportunity_terms
                    .iter()
                    .any(|t| lower.contains(t.as_str()))
                {
                    push_unique(&mut signals.opportunities, text);
                }
            }
        }
        signals
    }
}

#[derive(Debug, Default)]
struct Signals {
    risks: Vec<String>,
    opportunities: Vec<String>,
}

fn lowercase_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn push_unique(list: &mut Vec<String>, text: &str) {
    if !list.iter().any(|existing| existing == text) {
        list.push(text.to_owned());
    }
}

fn placeholder_line(item: &EvidenceItem) -> Option<String> {
    let source = item.source();
    let reason = item.reason().unwrap_or("no reason recorded");
    match item.status() {
        EvidenceStatus::Ok => None,
        EvidenceStatus::Empty => Some(format!("{NO_DATA} {source} source returned no results")),
        EvidenceStatus::Failed => Some(format!("{NO_DATA} {source} source failed: {reason}")),
        EvidenceStatus::TimedOut => {
            Some(format!("{NO_DATA} {source} source timed out: {reason}"))
        }
    }
}

fn source_statuses(bundle: &EvidenceBundle) -> String {
    bundle
        .items()
        .map(|item| format!("{}: {}", item.source(), item.status()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn executive_summary(query: &Query, bundle: &EvidenceBundle) -> Section {
    let kind = SectionKind::ExecutiveSummary;
    let ok = bundle.ok_count();
    if ok == 0 {
        return Section::placeholder(
            kind,
            format!(
                "{NO_DATA} no source returned evidence for query: {query} ({})",
                source_statuses(bundle)
            ),
        );
    }
    Section::new(
        kind,
        vec![
            format!("Hybrid analysis completed for query: {query}"),
            format!(
                "Sources with evidence: {ok} of {} ({})",
                Source::ALL.len(),
                source_statuses(bundle)
            ),
        ],
    )
}

fn list_section(kind: SectionKind, item: &EvidenceItem) -> Section {
    if let Some(line) = placeholder_line(item) {
        return Section::placeholder(kind, line);
    }
    let lines = item
        .payload()
        .texts()
        .iter()
        .map(|text| format!("- {text}"))
        .collect();
    Section::new(kind, lines)
}

fn has_text_evidence(bundle: &EvidenceBundle) -> bool {
    [Source::Vector, Source::Web]
        .into_iter()
        .any(|source| bundle.get(source).is_ok())
}

fn risk_section(bundle: &EvidenceBundle, signals: &Signals) -> Section {
    let kind = SectionKind::RiskOpportunity;
    if !has_text_evidence(bundle) {
        return Section::placeholder(
            kind,
            format!("{NO_DATA} no document or web evidence to assess"),
        );
    }

    let mut lines = vec!["Risk:".to_string()];
    if signals.risks.is_empty() {
        lines.push("- none detected in retrieved evidence".to_string());
    } else {
        lines.extend(signals.risks.iter().map(|s| format!("- {s}")));
    }
    lines.push(String::new());
    lines.push("Opportunity:".to_string());
    if signals.opportunities.is_empty() {
        lines.push("- none detected in retrieved evidence".to_string());
    } else {
        lines.extend(signals.opportunities.iter().map(|s| format!("- {s}")));
    }
    Section::new(kind, lines)
}

fn recommendations_section(bundle: &EvidenceBundle, signals: &Signals) -> Section {
    let kind = SectionKind::Recommendations;
    if bundle.ok_count() == 0 {
        return Section::placeholder(
            kind,
            format!("{NO_DATA} no evidence available to derive recommendations"),
        );
    }

    let mut actions: Vec<String> = Vec::new();
    actions.extend(signals.risks.iter().map(|s| format!("Mitigate: {s}")));
    actions.extend(signals.opportunities.iter().map(|s| format!("Pursue: {s}")));
    actions.truncate(MAX_RECOMMENDATIONS);
    for item in bundle.items().filter(|item| !item.is_ok()) {
        actions.push(format!(
            "Restore the {} source and re-run to close the evidence gap",
            item.source()
        ));
    }
    if actions.is_empty() {
        actions.push("Monitor: no actionable signals in current evidence".to_string());
    }

    let lines = actions
        .into_iter()
        .enumerate()
        .map(|(idx, action)| format!("{}. {action}", idx + 1))
        .collect();
    Section::new(kind, lines)
}

fn confidence_section(bundle: &EvidenceBundle, confidence: Confidence) -> Section {
    let grounded: Vec<&str> = bundle
        .items()
        .filter(|item| item.is_ok())
        .map(|item| item.source().as_str())
        .collect();
    let basis = if grounded.is_empty() {
        "no source returned evidence".to_string()
    } else {
        format!(
            "{} of {} sources grounded: {}",
            grounded.len(),
            Source::ALL.len(),
            grounded.join(" + ")
        )
    };
    Section::new(SectionKind::Confidence, vec![format!("{confidence} ({basis})")])
}
