//! Lead capture payload.

use serde::{Deserialize, Serialize};

/// A lead captured during a call, usually from the on-screen form.
///
/// The agent forwards this to the configured webhook and keeps nothing
/// in-process. The browser form uses short field names, so the long and
/// short spellings are both accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSubmission {
    /// The business the lead belongs to. Filled from the worker's
    /// configured business when the form omits it.
    #[serde(default)]
    pub business_id: Option<String>,
    #[serde(default, alias = "name")]
    pub visitor_name: Option<String>,
    #[serde(default, alias = "email")]
    pub visitor_email: Option<String>,
    #[serde(default, alias = "phone")]
    pub visitor_phone: Option<String>,
    /// What the visitor asked about. Required.
    #[serde(alias = "message")]
    pub inquiry: String,
}

impl LeadSubmission {
    /// Sets `business_id` when the payload did not carry one.
    pub fn with_default_business(mut self, business_id: Option<&str>) -> Self {
        if self.business_id.as_deref().map_or(true, str::is_empty) {
            self.business_id = business_id.map(str::to_string);
        }
        self
    }

    /// A lead needs an inquiry and at least one way to reach the visitor.
    pub fn is_actionable(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        !self.inquiry.trim().is_empty()
            && (present(&self.visitor_email) || present(&self.visitor_phone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_short_form_field_names() {
        let lead: LeadSubmission = serde_json::from_str(
            r#"{"name":"Ada","email":"ada@example.com","message":"Two nights in June"}"#,
        )
        .unwrap();
        assert_eq!(lead.visitor_name.as_deref(), Some("Ada"));
        assert_eq!(lead.inquiry, "Two nights in June");
        assert!(lead.is_actionable());
    }

    #[test]
    fn missing_inquiry_is_a_parse_error() {
        let parsed = serde_json::from_str::<LeadSubmission>(r#"{"visitor_name":"Ada"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn default_business_only_fills_gaps() {
        let lead = LeadSubmission {
            business_id: Some("acme".into()),
            visitor_name: None,
            visitor_email: None,
            visitor_phone: Some("+15550100".into()),
            inquiry: "hi".into(),
        };
        let lead = lead.with_default_business(Some("other"));
        assert_eq!(lead.business_id.as_deref(), Some("acme"));

        let blank = LeadSubmission {
            business_id: Some(String::new()),
            ..lead
        }
        .with_default_business(Some("other"));
        assert_eq!(blank.business_id.as_deref(), Some("other"));
    }
}
