use anyhow::{Context, Result};
use serde::Deserialize;

use crate::collaborators::RunIdentifiers;

/// Pull request actions that start a run. Others are acknowledged and ignored.
pub const HANDLED_ACTIONS: [&str; 3] = ["opened", "reopened", "synchronize"];

/// Subset of a pull request webhook event.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WebhookPayload {
    pub action: String,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    #[serde(default)]
    pub base: Option<BaseRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct BaseRef {
    #[serde(rename = "ref")]
    pub reference: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

impl WebhookPayload {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid pull request event payload")
    }

    pub fn is_handled(&self) -> bool {
        HANDLED_ACTIONS.contains(&self.action.as_str())
    }

    /// Identifiers of the run the event asks for, or `None` for ignored actions.
    ///
    /// ## Parameters:
    /// * `default_base` (`&str`): Base branch used when the event does not name one.
    pub fn identifiers(&self, default_base: &str) -> Option<RunIdentifiers> {
        if !self.is_handled() {
            return None;
        }
        let base_branch = self
            .pull_request
            .base
            .as_ref()
            .map_or(default_base, |base| base.reference.as_str());
        Some(RunIdentifiers {
            repository: self.repository.full_name.clone(),
            pr_number: self.pull_request.number,
            pr_url: self.pull_request.html_url.clone(),
            base_branch: base_branch.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "action": "synchronize",
        "number": 12,
        "pull_request": {
            "number": 12,
            "html_url": "https://github.com/acme/shop/pull/12",
            "base": { "ref": "develop", "sha": "abc" }
        },
        "repository": { "full_name": "acme/shop", "private": false }
    }"#;

    #[test]
    fn handled_event_yields_identifiers() {
        let payload = WebhookPayload::from_json(EVENT).expect("payload parses");
        let identifiers = payload.identifiers("main").expect("action is handled");
        assert_eq!(identifiers.repository, "acme/shop");
        assert_eq!(identifiers.pr_number, 12);
        assert_eq!(identifiers.pr_url, "https://github.com/acme/shop/pull/12");
        assert_eq!(identifiers.base_branch, "develop");
    }

    #[test]
    fn other_actions_are_ignored() {
        let payload = WebhookPayload::from_json(&EVENT.replace("synchronize", "closed"))
            .expect("payload parses");
        assert!(!payload.is_handled());
        assert!(payload.identifiers("main").is_none());
    }

    #[test]
    fn missing_base_falls_back_to_default() {
        let payload = WebhookPayload::from_json(
            r#"{"action":"opened","pull_request":{"number":1,"html_url":"u"},"repository":{"full_name":"a/b"}}"#,
        )
        .expect("payload parses");
        assert_eq!(
            payload.identifiers("main").expect("handled").base_branch,
            "main"
        );
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(WebhookPayload::from_json("{\"action\":\"opened\"}").is_err());
    }
}
