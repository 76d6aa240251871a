//! Quick-attach matching.
//!
//! Queries and haystacks are normalized to lowercase alphanumeric words.
//! A single token is matched against everything known about a session.
//! With two or more tokens the first one selects the repo group and the
//! rest select the session within it, so `op la` means "repo op..., session
//! la...".

use serde::Serialize;

use crate::workspace::{trim_repo_prefix, RepoGroup, Session};

const SUBSTRING_BASE: i32 = 10;
const SUBSEQUENCE_BASE: i32 = 4;
const SESSION_NAME_BONUS: i32 = 3;

/// Lowercase and collapse every run of non `[a-z0-9]` into one space.
pub fn normalize_for_match(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut space = false;
    for ch in s.trim().to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
            space = false;
        } else if !space {
            out.push(' ');
            space = true;
        }
    }
    out.trim().to_string()
}

/// Whether `needle`'s characters appear in `hay` in order.
pub fn is_subsequence(hay: &str, needle: &str) -> bool {
    let mut hay = hay.chars();
    needle.chars().all(|n| hay.any(|h| h == n))
}

/// Score already-normalized tokens against one haystack; every token must
/// hit, as a substring or failing that as a subsequence.
pub fn score_tokens<S: AsRef<str>>(tokens: &[S], hay: &str) -> Option<i32> {
    let mut score = 0;
    for token in tokens {
        let token = token.as_ref();
        let len = token.chars().count() as i32;
        if hay.contains(token) {
            score += SUBSTRING_BASE + len;
        } else if is_subsequence(hay, token) {
            score += SUBSEQUENCE_BASE + len;
        } else {
            return None;
        }
    }
    Some(score)
}

/// Normalized query tokens.
pub fn query_tokens<S: AsRef<str>>(query: &[S]) -> Vec<String> {
    let joined = query
        .iter()
        .map(|q| q.as_ref())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_for_match(&joined)
        .split_whitespace()
        .map(String::from)
        .collect()
}

fn haystack(parts: &[&str]) -> String {
    normalize_for_match(&parts.join(" "))
}

/// Score `session` within `group` for `query`; `None` means no match.
pub fn score_session<S: AsRef<str>>(query: &[S], group: &RepoGroup, session: &Session) -> Option<i32> {
    let tokens = query_tokens(query);
    let (first, rest) = tokens.split_first()?;

    let full = haystack(&[
        session.name.as_str(),
        group.name.as_str(),
        group.workspace.as_str(),
        group.repo.as_str(),
        session.workdir.as_str(),
    ]);

    let mut score = if rest.is_empty() {
        score_tokens(&tokens, &full)?
    } else {
        let group_hay = haystack(&[
            group.workspace.as_str(),
            group.repo.as_str(),
            group.name.as_str(),
        ]);
        let session_hay = haystack(&[trim_repo_prefix(&group.repo, &session.name)]);
        score_tokens(std::slice::from_ref(first), &group_hay)? + score_tokens(rest, &session_hay)?
    };

    let name = normalize_for_match(&session.name);
    if !name.is_empty() && full.contains(&name) {
        score += SESSION_NAME_BONUS;
    }
    Some(score)
}

/// A scored quick-attach hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickCandidate {
    pub workspace: String,
    pub repo: String,
    pub session: Session,
    pub score: i32,
}

/// Every matching session across `groups`, best first.
///
/// Ties are broken by session name, then workspace, then repo.
pub fn rank_candidates<S: AsRef<str>>(query: &[S], groups: &[RepoGroup]) -> Vec<QuickCandidate> {
    let mut out: Vec<QuickCandidate> = groups
        .iter()
        .flat_map(|g| {
            g.sessions.iter().filter_map(move |s| {
                score_session(query, g, s).map(|score| QuickCandidate {
                    workspace: g.workspace_name().to_string(),
                    repo: g.repo.clone(),
                    session: s.clone(),
                    score,
                })
            })
        })
        .collect();

    out.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.session.name.cmp(&b.session.name))
            .then_with(|| a.workspace.cmp(&b.workspace))
            .then_with(|| a.repo.cmp(&b.repo))
    });
    out
}
