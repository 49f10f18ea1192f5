//! HTML field extraction with ordered fallback selector chains.
//!
//! A candidate is a CSS selector optionally followed by pipeline steps
//! separated by ` | `:
//!
//! - `contains(TEXT)` keeps elements whose own text contains `TEXT`
//! - `parent` moves to the parent element
//! - `own-text` reads only direct text nodes instead of the full subtree
//!
//! For each field the candidates are tried in order and the first non-empty,
//! whitespace-collapsed text wins.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ScrapeOutcome, ScrapedFields};

const STEP_SEPARATOR: &str = " | ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Invalid selector '{selector}' for {field}: {reason}")]
    InvalidSelector {
        field: &'static str,
        selector: String,
        reason: String,
    },
    #[error("Unknown step '{step}' in selector '{selector}' for {field}")]
    UnknownStep {
        field: &'static str,
        selector: String,
        step: String,
    },
}

/// Candidate selector strings per output field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSelectors {
    pub reputation: Vec<String>,
    pub user_reports: Vec<String>,
    pub total_calls: Vec<String>,
    pub last_call: Vec<String>,
}

fn chain(candidates: &[&str]) -> Vec<String> {
    candidates.iter().map(|s| s.to_string()).collect()
}

impl Default for FieldSelectors {
    fn default() -> Self {
        Self {
            reputation: chain(&[
                "div#userReputation > h3",
                "div[class*=\"reputation\"] > h3",
                "h3 | contains(Reputation) | parent | own-text",
                "div[class*=\"score\"], div[class*=\"rating\"] | own-text",
                "span[class*=\"reputation\"] | own-text",
            ]),
            user_reports: chain(&[
                "div#userReports > h3",
                "div[class*=\"reports\"] > h3",
                "h3 | contains(Reports) | parent | own-text",
                "div | contains(reports) | own-text",
            ]),
            total_calls: chain(&[
                "div#totalCall > h3",
                "div[class*=\"calls\"] > h3",
                "h3 | contains(Calls) | parent | own-text",
                "div | contains(calls) | own-text",
            ]),
            last_call: chain(&[
                "div#lastCall > h3",
                "div[class*=\"last\"] > h3",
                "h3 | contains(Last) | parent | own-text",
                "div | contains(last) | own-text",
            ]),
        }
    }
}

#[derive(Debug, Clone)]
enum Step {
    Contains(String),
    Parent,
    OwnText,
}

/// One compiled candidate.
#[derive(Debug, Clone)]
struct Candidate {
    selector: Selector,
    steps: Vec<Step>,
}

impl Candidate {
    fn parse(field: &'static str, source: &str) -> Result<Self, ExtractError> {
        let mut parts = source.split(STEP_SEPARATOR);
        let css = parts.next().unwrap_or("").trim();
        let selector = Selector::parse(css).map_err(|e| ExtractError::InvalidSelector {
            field,
            selector: source.to_string(),
            reason: format!("{:?}", e),
        })?;

        let steps = parts
            .map(|raw| {
                let raw = raw.trim();
                match raw {
                    "parent" => Ok(Step::Parent),
                    "own-text" => Ok(Step::OwnText),
                    _ => raw
                        .strip_prefix("contains(")
                        .and_then(|rest| rest.strip_suffix(')'))
                        .map(|needle| Step::Contains(needle.to_string()))
                        .ok_or_else(|| ExtractError::UnknownStep {
                            field,
                            selector: source.to_string(),
                            step: raw.to_string(),
                        }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { selector, steps })
    }

    /// First non-empty text produced by this candidate.
    fn evaluate(&self, document: &Html) -> Option<String> {
        document.select(&self.selector).find_map(|element| {
            let mut current = element;
            let mut own_text = false;
            for step in &self.steps {
                match step {
                    Step::Contains(needle) => {
                        if !direct_text(current).contains(needle.as_str()) {
                            return None;
                        }
                    }
                    Step::Parent => current = current.parent().and_then(ElementRef::wrap)?,
                    Step::OwnText => own_text = true,
                }
            }

            let raw = if own_text {
                direct_text(current)
            } else {
                current.text().collect::<String>()
            };
            let text = collapse_whitespace(&raw);
            (!text.is_empty()).then_some(text)
        })
    }
}

fn direct_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|text| &**text)
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compiled selector chains for every output field.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    reputation: Vec<Candidate>,
    user_reports: Vec<Candidate>,
    total_calls: Vec<Candidate>,
    last_call: Vec<Candidate>,
    any_element: Selector,
}

fn compile(field: &'static str, sources: &[String]) -> Result<Vec<Candidate>, ExtractError> {
    sources
        .iter()
        .map(|source| Candidate::parse(field, source))
        .collect()
}

fn first_match(candidates: &[Candidate], document: &Html) -> String {
    candidates
        .iter()
        .find_map(|candidate| candidate.evaluate(document))
        .unwrap_or_default()
}

impl FieldExtractor {
    pub fn new(selectors: &FieldSelectors) -> Result<Self, ExtractError> {
        let any_element = Selector::parse("*").map_err(|e| ExtractError::InvalidSelector {
            field: "document",
            selector: "*".to_string(),
            reason: format!("{:?}", e),
        })?;
        Ok(Self {
            reputation: compile("reputation", &selectors.reputation)?,
            user_reports: compile("user_reports", &selectors.user_reports)?,
            total_calls: compile("total_calls", &selectors.total_calls)?,
            last_call: compile("last_call", &selectors.last_call)?,
            any_element,
        })
    }

    /// Extract fields from a response body.
    ///
    /// Returns `Success` when the reputation matched, `NotFound` when the page
    /// is markup but the reputation did not match, and `ParseError` when the
    /// body holds no elements beyond the implied document skeleton.
    pub fn extract(&self, body: &str) -> ScrapeOutcome {
        let document = Html::parse_document(body);

        let has_markup = document
            .select(&self.any_element)
            .any(|el| !matches!(el.value().name(), "html" | "head" | "body"));
        if !has_markup {
            return ScrapeOutcome::ParseError("no markup elements in body".to_string());
        }

        let fields = ScrapedFields {
            reputation: first_match(&self.reputation, &document),
            user_reports: first_match(&self.user_reports, &document),
            total_calls: first_match(&self.total_calls, &document),
            last_call: first_match(&self.last_call, &document),
        };

        if fields.reputation.is_empty() {
            ScrapeOutcome::NotFound(fields)
        } else {
            ScrapeOutcome::Success(fields)
        }
    }
}
