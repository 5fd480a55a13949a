//! Minijinja rendering of alert subjects and bodies.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! `minijinja::Environment` is created per render call.

use crate::traits::{AlertNotification, NotifyError};

/// Default subject template for committee alerts.
pub const DEFAULT_SUBJECT: &str =
    "[{{ event | upper }}] {{ property_code }} {{ period_label }} — {{ rule_code }}";

/// Default body template for committee alerts.
pub const DEFAULT_BODY: &str = "\
Committee alert {{ event }} for {{ property_name }} ({{ property_code }}), period {{ period_label }}.

Rule:        {{ rule_code }}
Materiality: ${{ materiality }}
Triggered:   {{ trigger_count }} time(s)

Why flagged: {{ explanation.why | default('(no detail)') }}
Resolution:  {{ explanation.resolution | default('(no suggestion)') }}
";

/// A rendered alert message ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

/// Render subject and body for a notification, using the defaults when
/// no custom templates are configured.
pub fn render(
    notification: &AlertNotification,
    subject_template: Option<&str>,
    body_template: Option<&str>,
) -> Result<AlertMessage, NotifyError> {
    Ok(AlertMessage {
        subject: render_one(subject_template.unwrap_or(DEFAULT_SUBJECT), notification)?,
        body: render_one(body_template.unwrap_or(DEFAULT_BODY), notification)?,
    })
}

/// Validate template syntax without rendering.
pub fn validate(template: &str) -> Result<(), NotifyError> {
    let mut env = minijinja::Environment::new();
    env.add_template("t", template)
        .map_err(|e| NotifyError::Template(e.to_string()))?;
    Ok(())
}

fn render_one(template: &str, notification: &AlertNotification) -> Result<String, NotifyError> {
    let mut env = minijinja::Environment::new();
    env.add_template("t", template)
        .map_err(|e| NotifyError::Template(e.to_string()))?;
    let tmpl = env
        .get_template("t")
        .map_err(|e| NotifyError::Template(e.to_string()))?;
    tmpl.render(notification)
        .map_err(|e| NotifyError::Template(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> AlertNotification {
        AlertNotification {
            property_code: "MAPLE-01".into(),
            property_name: "Maple Court".into(),
            rule_code: "COV-001".into(),
            period_label: "2025-07".into(),
            event: "opened".into(),
            materiality: "125,000.00".into(),
            trigger_count: 1,
            explanation: serde_json::json!({
                "why": "DSCR 0.93 below covenant 1.25",
                "resolution": "review debt service or NOI inputs",
            }),
        }
    }

    #[test]
    fn default_templates_render() {
        let msg = render(&notification(), None, None).unwrap();
        assert_eq!(msg.subject, "[OPENED] MAPLE-01 2025-07 — COV-001");
        assert!(msg.body.contains("Maple Court"));
        assert!(msg.body.contains("DSCR 0.93 below covenant 1.25"));
        assert!(msg.body.contains("$125,000.00"));
    }

    #[test]
    fn custom_template_overrides_default() {
        let msg = render(&notification(), Some("{{ rule_code }}!"), None).unwrap();
        assert_eq!(msg.subject, "COV-001!");
    }

    #[test]
    fn missing_explanation_fields_fall_back() {
        let mut n = notification();
        n.explanation = serde_json::json!({});
        let msg = render(&n, None, None).unwrap();
        assert!(msg.body.contains("(no detail)"));
    }

    #[test]
    fn invalid_template_rejected() {
        assert!(validate("{{ unclosed").is_err());
        assert!(validate("{{ ok }}").is_ok());
    }
}
