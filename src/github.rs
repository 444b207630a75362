//! GitHub Actions context and the pull request comment.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{CovtrendError, Result};

const API_ROOT: &str = "https://api.github.com";
const USER_AGENT: &str = "covtrend";

/// The parts of the triggering event payload that matter here.
#[derive(Debug, Default, Deserialize)]
pub struct Event {
    pub pull_request: Option<PullRequest>,
    /// Previous head of the branch for `push` events.
    pub before: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub base: BaseRef,
}

#[derive(Debug, Deserialize)]
pub struct BaseRef {
    pub sha: String,
}

/// Resolved GitHub Actions context, read from environment variables.
#[derive(Debug, Default)]
pub struct Context {
    token: Option<String>,
    pub repo: Option<String>,
    pub sha: Option<String>,
    pub event: Event,
}

impl Context {
    /// Build a context from the standard GitHub Actions environment
    /// (`GITHUB_TOKEN`, `GITHUB_REPOSITORY`, `GITHUB_SHA`, `GITHUB_EVENT_PATH`).
    /// Everything is optional so the tool also runs outside of Actions.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let event = match var("GITHUB_EVENT_PATH") {
            Some(path) => read_event(Path::new(&path))?,
            None => Event::default(),
        };
        Ok(Self {
            token: var("GITHUB_TOKEN"),
            repo: var("GITHUB_REPOSITORY"),
            sha: var("GITHUB_SHA"),
            event,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        if token.is_some() {
            self.token = token;
        }
        self
    }

    pub fn is_pull_request(&self) -> bool {
        self.event.pull_request.is_some()
    }

    pub fn pr_number(&self) -> Option<u64> {
        self.event.pull_request.as_ref().map(|pr| pr.number)
    }

    /// Where history lookup starts: the PR base, else the pre-push head.
    pub fn base_ref(&self) -> Option<&str> {
        self.event
            .pull_request
            .as_ref()
            .map(|pr| pr.base.sha.as_str())
            .or(self.event.before.as_deref())
            .filter(|sha| !sha.is_empty() && !is_null_sha(sha))
    }

    /// Fail early when a comment was requested but cannot be posted.
    pub fn check_comment_access(&self) -> Result<()> {
        self.comment_target().map(|_| ())
    }

    fn comment_target(&self) -> Result<(&str, &str, u64)> {
        let token = self.token.as_deref().ok_or_else(|| {
            CovtrendError::Config("GITHUB_TOKEN is required to comment on pull requests".into())
        })?;
        let repo = self.repo.as_deref().ok_or_else(|| {
            CovtrendError::Config("GITHUB_REPOSITORY is required to comment on pull requests".into())
        })?;
        let number = self.pr_number().ok_or_else(|| {
            CovtrendError::Config("event is not a pull request".into())
        })?;
        Ok((token, repo, number))
    }

    /// Create or update the coverage comment identified by `marker`.
    pub fn post_comment(&self, marker: &str, body: &str) -> Result<()> {
        let (token, repo, number) = self.comment_target()?;
        post_comment(token, repo, number, marker, body)?;
        info!("Comment posted to {}/pull/{}", repo, number);
        Ok(())
    }
}

/// `before` is all zeros for the first push of a branch.
fn is_null_sha(sha: &str) -> bool {
    sha.bytes().all(|b| b == b'0')
}

pub fn read_event(path: &Path) -> Result<Event> {
    let raw = std::fs::read_to_string(path)?;
    parse_event(&raw)
}

pub fn parse_event(raw: &str) -> Result<Event> {
    serde_json::from_str(raw)
        .map_err(|e| CovtrendError::Config(format!("invalid event payload: {e}")))
}

#[derive(Deserialize)]
struct Comment {
    id: u64,
    body: Option<String>,
}

fn request(method: &str, url: &str, token: &str) -> ureq::Request {
    ureq::request(method, url)
        .set("Authorization", &format!("Bearer {}", token))
        .set("Accept", "application/vnd.github+json")
        .set("User-Agent", USER_AGENT)
        .set("X-GitHub-Api-Version", "2022-11-28")
}

fn api_error(action: &str, err: ureq::Error) -> CovtrendError {
    match err {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            CovtrendError::Publish(format!(
                "GitHub API error {action} (HTTP {code}): {body}"
            ))
        }
        e => CovtrendError::Publish(format!("Failed {action}: {e}")),
    }
}

/// Find an earlier comment whose body starts with `marker`.
fn find_existing_comment(
    token: &str,
    repo: &str,
    pr_number: u64,
    marker: &str,
) -> Result<Option<u64>> {
    let mut page = 1u32;
    loop {
        let url = format!(
            "{API_ROOT}/repos/{repo}/issues/{pr_number}/comments?per_page=100&page={page}"
        );
        let resp = request("GET", &url, token)
            .call()
            .map_err(|e| api_error("listing comments", e))?;

        let comments: Vec<Comment> = resp
            .into_json()
            .map_err(|e| CovtrendError::Publish(format!("Failed to parse comments JSON: {e}")))?;
        if comments.is_empty() {
            break;
        }
        if let Some(id) = matching_comment(&comments, marker) {
            return Ok(Some(id));
        }
        page += 1;
    }
    Ok(None)
}

fn matching_comment(comments: &[Comment], marker: &str) -> Option<u64> {
    comments
        .iter()
        .find(|c| c.body.as_deref().is_some_and(|b| b.starts_with(marker)))
        .map(|c| c.id)
}

fn post_comment(token: &str, repo: &str, pr_number: u64, marker: &str, body: &str) -> Result<()> {
    let payload = serde_json::json!({ "body": body });

    match find_existing_comment(token, repo, pr_number, marker)? {
        Some(comment_id) => {
            debug!("updating comment {comment_id}");
            let url = format!("{API_ROOT}/repos/{repo}/issues/comments/{comment_id}");
            request("PATCH", &url, token)
                .send_json(payload)
                .map_err(|e| api_error("updating comment", e))?;
        }
        None => {
            let url = format!("{API_ROOT}/repos/{repo}/issues/{pr_number}/comments");
            request("POST", &url, token)
                .send_json(payload)
                .map_err(|e| api_error("creating comment", e))?;
        }
    }

    Ok(())
}
