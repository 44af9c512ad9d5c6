//! Request facts handed to strategies and collaborators.

use std::net::SocketAddr;

use axum::http::{header, request::Parts};
use serde::{Deserialize, Serialize};

use crate::config::ClassificationRule;
use crate::routing::matcher::{compile_rules, CompiledRule};

/// Classification used when nothing else applies.
pub const UNKNOWN_CLASSIFICATION: &str = "unknown";

/// What the request asks for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentInfo {
    pub method: String,
    pub path: String,
    pub query_params: usize,
    pub content_type: Option<String>,
    pub content_length: u64,
    /// Matched against backend specialization tags.
    pub classification: String,
}

/// Who is asking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub client_addr: Option<SocketAddr>,
    pub user_agent: Option<String>,
    pub device_type: String,
    pub session_id: Option<String>,
}

/// Derives request context from request metadata.
pub trait ContentAnalyzer: Send + Sync {
    fn content_info(&self, parts: &Parts) -> ContentInfo;

    fn user_info(&self, parts: &Parts, client_addr: Option<SocketAddr>) -> UserInfo;
}

/// Rule-based classification with a content-type fallback.
#[derive(Debug, Default)]
pub struct RuleAnalyzer {
    rules: Vec<CompiledRule>,
}

impl RuleAnalyzer {
    pub fn new(rules: &[ClassificationRule]) -> Self {
        Self {
            rules: compile_rules(rules),
        }
    }

    fn classify(&self, parts: &Parts, content_type: Option<&str>) -> String {
        if let Some(rule) = self.rules.iter().find(|rule| rule.matches(parts)) {
            tracing::trace!(rule = %rule.name, tag = %rule.tag, "Classification rule matched");
            return rule.tag.clone();
        }
        content_type
            .map(mime_essence)
            .filter(|essence| !essence.is_empty())
            .unwrap_or_else(|| UNKNOWN_CLASSIFICATION.to_string())
    }
}

/// `text/html; charset=utf-8` → `text/html`
fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn device_type(user_agent: Option<&str>) -> &'static str {
    let Some(agent) = user_agent.map(str::to_ascii_lowercase) else {
        return "desktop";
    };
    if agent.contains("ipad") || agent.contains("tablet") {
        "tablet"
    } else if agent.contains("mobi") || agent.contains("iphone") || agent.contains("android") {
        "mobile"
    } else {
        "desktop"
    }
}

fn header_str<'a>(parts: &'a Parts, name: header::HeaderName) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

impl ContentAnalyzer for RuleAnalyzer {
    fn content_info(&self, parts: &Parts) -> ContentInfo {
        let content_type = header_str(parts, header::CONTENT_TYPE).map(str::to_string);
        let content_length = header_str(parts, header::CONTENT_LENGTH)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        let query_params = parts
            .uri
            .query()
            .map(|q| q.split('&').filter(|pair| !pair.is_empty()).count())
            .unwrap_or(0);

        ContentInfo {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            query_params,
            classification: self.classify(parts, content_type.as_deref()),
            content_type,
            content_length,
        }
    }

    fn user_info(&self, parts: &Parts, client_addr: Option<SocketAddr>) -> UserInfo {
        let user_agent = header_str(parts, header::USER_AGENT).map(str::to_string);
        UserInfo {
            client_addr,
            device_type: device_type(user_agent.as_deref()).to_string(),
            user_agent,
            session_id: parts
                .headers
                .get("x-session-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_rule_wins_over_content_type() {
        let analyzer = RuleAnalyzer::new(&[ClassificationRule {
            name: "api".into(),
            host: None,
            path_prefix: Some("/api".into()),
            tag: "api".into(),
            priority: 0,
        }]);
        let info = analyzer.content_info(&parts(
            Request::builder()
                .method("POST")
                .uri("/api/users?page=2&sort=asc")
                .header("content-type", "application/json")
                .header("content-length", "17"),
        ));
        assert_eq!(info.classification, "api");
        assert_eq!(info.method, "POST");
        assert_eq!(info.path, "/api/users");
        assert_eq!(info.query_params, 2);
        assert_eq!(info.content_length, 17);
    }

    #[test]
    fn test_content_type_fallback() {
        let analyzer = RuleAnalyzer::default();
        let info = analyzer.content_info(&parts(
            Request::builder()
                .uri("/index.html")
                .header("content-type", "Text/HTML; charset=utf-8"),
        ));
        assert_eq!(info.classification, "text/html");

        let info = analyzer.content_info(&parts(Request::builder().uri("/")));
        assert_eq!(info.classification, UNKNOWN_CLASSIFICATION);
        assert_eq!(info.content_length, 0);
    }

    #[test]
    fn test_user_info() {
        let analyzer = RuleAnalyzer::default();
        let addr: SocketAddr = "10.0.0.7:50000".parse().unwrap();
        let user = analyzer.user_info(
            &parts(
                Request::builder()
                    .uri("/")
                    .header("user-agent", "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile")
                    .header("x-session-id", "s-42"),
            ),
            Some(addr),
        );
        assert_eq!(user.device_type, "mobile");
        assert_eq!(user.session_id.as_deref(), Some("s-42"));
        assert_eq!(user.client_addr, Some(addr));

        assert_eq!(device_type(Some("Mozilla/5.0 (iPad; CPU OS 17_0)")), "tablet");
        assert_eq!(device_type(None), "desktop");
    }
}
