//! Query filters rendered as IMAP SEARCH and Gmail `q=` predicates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Optional search constraints; absent fields impose none.
///
/// Dates are calendar days (the finest granularity both backends
/// share). `include_body` does not filter — it selects full-body vs
/// header-only fetching for whatever matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default)]
    pub include_body: bool,
}

impl MailQuery {
    /// Render as IMAP SEARCH criteria; no constraints → `ALL`.
    pub fn to_imap_search(&self) -> String {
        let mut terms: Vec<String> = Vec::new();
        if self.unread_only {
            terms.push("UNSEEN".to_string());
        }
        if let Some(date) = self.after_date {
            terms.push(format!("SINCE {}", date.format("%d-%b-%Y")));
        }
        if let Some(date) = self.before_date {
            terms.push(format!("BEFORE {}", date.format("%d-%b-%Y")));
        }
        if let Some(from) = &self.from_address {
            terms.push(format!("FROM \"{from}\""));
        }
        if let Some(to) = &self.to_address {
            terms.push(format!("TO \"{to}\""));
        }
        if let Some(subject) = &self.subject {
            terms.push(format!("SUBJECT \"{subject}\""));
        }
        if let Some(label) = &self.label {
            terms.push(format!("KEYWORD \"{label}\""));
        }
        if terms.is_empty() {
            "ALL".to_string()
        } else {
            terms.join(" ")
        }
    }

    /// Render as a Gmail search expression for the `q=` parameter.
    pub fn to_gmail_query(&self) -> String {
        let mut terms: Vec<String> = Vec::new();
        if self.unread_only {
            terms.push("is:unread".to_string());
        }
        if let Some(date) = self.after_date {
            terms.push(format!("after:{}", date.format("%Y/%m/%d")));
        }
        if let Some(date) = self.before_date {
            terms.push(format!("before:{}", date.format("%Y/%m/%d")));
        }
        if let Some(from) = &self.from_address {
            terms.push(format!("from:{from}"));
        }
        if let Some(to) = &self.to_address {
            terms.push(format!("to:{to}"));
        }
        if let Some(subject) = &self.subject {
            terms.push(format!("subject:\"{subject}\""));
        }
        if let Some(label) = &self.label {
            terms.push(format!("label:{label}"));
        }
        terms.join(" ")
    }
}
