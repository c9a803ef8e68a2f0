//! claude.ai web session.
//!
//! The `sessionKey` cookie authenticates three calls:
//! `/api/organizations` to find the chat organization, its `/usage`
//! document, and `/api/account` for the signed-in email.

use quotawatch_core::ParseError;
use serde::Deserialize;

/// Cookie domain.
pub const CLAUDE_DOMAIN: &str = "claude.ai";

/// Session cookie name.
pub const SESSION_COOKIE: &str = "sessionKey";

/// Organizations listing.
pub const ORGANIZATIONS_URL: &str = "https://claude.ai/api/organizations";

/// Account endpoint.
pub const ACCOUNT_URL: &str = "https://claude.ai/api/account";

/// Usage page shown to people.
pub const DASHBOARD_URL: &str = "https://claude.ai/settings/usage";

/// Usage endpoint for an organization.
pub fn usage_url(org_uuid: &str) -> String {
    format!("{ORGANIZATIONS_URL}/{org_uuid}/usage")
}

// ============================================================================
// Organizations
// ============================================================================

/// One organization the session belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct WebOrganization {
    /// Organization UUID.
    pub uuid: String,
    /// Organization name.
    #[serde(default)]
    pub name: Option<String>,
    /// Capabilities such as `chat` or `claude_max`.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl WebOrganization {
    fn has(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Plan name implied by the organization's capabilities.
    pub fn plan_name(&self) -> Option<&'static str> {
        if self.has("claude_max") {
            Some("Max")
        } else if self.has("claude_pro") {
            Some("Pro")
        } else if self.has("raven") {
            Some("Team")
        } else {
            None
        }
    }
}

/// Picks the organization that carries chat usage: the first with the
/// `chat` capability, else the first listed.
///
/// # Errors
///
/// [`ParseError::NoUsageData`] for an empty listing.
pub fn select_organization(raw: &str) -> Result<WebOrganization, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let orgs: Vec<WebOrganization> = serde_json::from_str(raw)?;
    let index = orgs.iter().position(|o| o.has("chat")).unwrap_or(0);
    orgs.into_iter()
        .nth(index)
        .ok_or_else(|| ParseError::NoUsageData("session has no organizations".to_string()))
}

// ============================================================================
// Account
// ============================================================================

#[derive(Debug, Deserialize)]
struct WebAccount {
    #[serde(default, alias = "emailAddress")]
    email_address: Option<String>,
}

/// Extracts the signed-in email from an `/api/account` body.
pub fn parse_account_email(raw: &str) -> Option<String> {
    serde_json::from_str::<WebAccount>(raw)
        .ok()?
        .email_address
        .filter(|e| !e.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_chat_organization() {
        let raw = r#"[
            {"uuid": "api-org", "name": "Console", "capabilities": ["api"]},
            {"uuid": "chat-org", "name": "Personal", "capabilities": ["chat", "claude_max"]}
        ]"#;
        let org = select_organization(raw).unwrap();
        assert_eq!(org.uuid, "chat-org");
        assert_eq!(org.plan_name(), Some("Max"));
        assert_eq!(usage_url(&org.uuid), "https://claude.ai/api/organizations/chat-org/usage");
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let org = select_organization(r#"[{"uuid": "only"}]"#).unwrap();
        assert_eq!(org.uuid, "only");
        assert_eq!(org.plan_name(), None);
    }

    #[test]
    fn test_select_empty() {
        assert!(matches!(select_organization("[]"), Err(ParseError::NoUsageData(_))));
        assert!(matches!(select_organization(""), Err(ParseError::Empty)));
    }

    #[test]
    fn test_account_email() {
        let raw = r#"{"uuid": "u", "email_address": "me@example.com", "full_name": "Me"}"#;
        assert_eq!(parse_account_email(raw).as_deref(), Some("me@example.com"));
        assert_eq!(parse_account_email(r#"{"email_address": ""}"#), None);
        assert_eq!(parse_account_email("oops"), None);
    }
}
