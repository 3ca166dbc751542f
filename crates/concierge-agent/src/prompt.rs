//! Instruction text for each script.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder ${0}")]
    UnknownPlaceholder(String),
    #[error("invalid placeholder at byte {0}")]
    InvalidPlaceholder(usize),
}

/// Used when the prompt template file cannot be read.
pub const DEFAULT_TEMPLATE: &str = "You are a friendly voice assistant answering the phone for \
$business_name. Keep answers short and conversational, one or two sentences at a time. Only \
answer from the business information below; if you do not know something, offer to take the \
caller's details so someone can follow up. When the caller wants to be contacted, call the \
show_lead_form tool so they can type their details.\n\nBusiness information:\n$knowledge_base\n";

pub const INBOUND_INSTRUCTIONS: &str = "You are Regina, the guest concierge for Newport Beach \
Vacation Properties. You speak with guests who have booked or are about to book one of our \
homes. Be warm and unhurried. Confirm who you are speaking with, then help with check-in times, \
parking, beach access and local recommendations, offering details as insider tips rather than \
rules. If a guest wants to see a property, use check_availability to find open times, \
available_dates to suggest days, and book_viewing once they choose. Always confirm the guest's \
name and phone number before booking.";

pub const OUTBOUND_INSTRUCTIONS: &str = "You are Ashley, calling on behalf of Newport Beach \
Vacation Properties to follow up with people who showed interest in renting one of our homes. \
Be upbeat and respectful of their time. Ask about their travel dates, group size and what they \
want from the stay. If they are interested in seeing a property, use available_dates and \
check_availability to offer times and book_viewing to put the viewing on the calendar. If it is \
a bad time, offer to call back and end the call politely.";

pub const ASSISTANT_INSTRUCTIONS: &str = "You are a personal assistant taking a call. Be casual \
and brief. Find out who is calling and why, note anything they want passed on, and offer to \
schedule a short follow-up call.";

/// Substitutes `$name` and `${name}` placeholders. `$$` is a literal dollar sign.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = if let Some(stripped) = after.strip_prefix('$') {
            out.push('$');
            rest = stripped;
            offset += pos + 2;
            continue;
        } else if let Some(braced) = after.strip_prefix('{') {
            let end = braced
                .find('}')
                .ok_or(TemplateError::InvalidPlaceholder(offset + pos))?;
            (&braced[..end], end + 2)
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(TemplateError::InvalidPlaceholder(offset + pos));
        }
        let value = vars
            .get(name)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
        out.push_str(value);

        rest = &after[consumed..];
        offset += pos + 1 + consumed;
    }
    out.push_str(rest);
    Ok(out)
}

/// Builds the default script's instructions from the template at `path`.
///
/// An unreadable file falls back to [`DEFAULT_TEMPLATE`]. A template that
/// fails to render falls back too, after a warning.
pub fn default_instructions(path: &str, business_name: &str, knowledge_base: &str) -> String {
    let vars = HashMap::from([
        ("business_name", business_name),
        ("knowledge_base", knowledge_base),
    ]);

    let template = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            tracing::info!(path, error = %e, "prompt template not readable, using built-in");
            DEFAULT_TEMPLATE.to_string()
        }
    };

    match render(&template, &vars) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path, error = %e, "prompt template invalid, using built-in");
            render(DEFAULT_TEMPLATE, &vars).unwrap_or_else(|_| DEFAULT_TEMPLATE.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([("business_name", "Acme"), ("knowledge_base", "We sell anvils.")])
    }

    #[test]
    fn substitutes_both_placeholder_forms() {
        let text = render("Hi from $business_name. ${knowledge_base}!", &vars()).unwrap();
        assert_eq!(text, "Hi from Acme. We sell anvils.!");
    }

    #[test]
    fn double_dollar_is_literal() {
        assert_eq!(render("costs $$5", &vars()).unwrap(), "costs $5");
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        assert_eq!(
            render("$owner", &vars()),
            Err(TemplateError::UnknownPlaceholder("owner".into()))
        );
        assert_eq!(render("${oops", &vars()), Err(TemplateError::InvalidPlaceholder(0)));
    }

    #[test]
    fn template_file_is_rendered() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Agent for $business_name").unwrap();
        let text = default_instructions(file.path().to_str().unwrap(), "Acme", "kb");
        assert_eq!(text, "Agent for Acme");
    }

    #[test]
    fn missing_file_uses_built_in_template() {
        let text = default_instructions("/nonexistent/prompt.template", "Acme", "We sell anvils.");
        assert!(text.contains("answering the phone for Acme"));
        assert!(text.ends_with("We sell anvils.\n"));
    }
}
