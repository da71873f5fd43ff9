//! Offline response synthesis.
//!
//! When neither the network nor a tier can answer, the arbitrator returns a
//! typed 503 placeholder shaped for what the caller accepts. Synthesis is
//! total: every input produces a response.

use serde_json::json;

/// Status of every synthesized response.
pub const OFFLINE_STATUS: u16 = 503;

/// Shape of the placeholder body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineContentType {
    Json,
    Html,
    Text,
}

impl OfflineContentType {
    /// Pick the body shape for a caller's `Accept` header.
    pub fn for_accept(accept: Option<&str>) -> Self {
        let accept = accept.unwrap_or_default().to_ascii_lowercase();
        if accept.contains("application/json") {
            OfflineContentType::Json
        } else if accept.contains("text/html") {
            OfflineContentType::Html
        } else {
            OfflineContentType::Text
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            OfflineContentType::Json => "application/json",
            OfflineContentType::Html => "text/html",
            OfflineContentType::Text => "text/plain",
        }
    }
}

/// A synthesized placeholder. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineResponse {
    pub status: u16,
    pub content_type: OfflineContentType,
    pub body: String,
}

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Offline - Weather App</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            color: white;
            text-align: center;
        }
        .offline-content {
            max-width: 400px;
            padding: 40px;
            background: rgba(255, 255, 255, 0.1);
            border-radius: 16px;
        }
        button {
            background: #60a5fa;
            color: white;
            border: none;
            padding: 12px 24px;
            border-radius: 8px;
            cursor: pointer;
            font-size: 16px;
            margin-top: 20px;
        }
    </style>
</head>
<body>
    <div class="offline-content">
        <h1>You're Offline</h1>
        <p>Weather data is not available without an internet connection.</p>
        <p>Please check your connection and try again.</p>
        <button onclick="window.location.reload()">Retry</button>
    </div>
</body>
</html>
"#;

/// Build the placeholder for a caller that sent `accept`.
pub fn synthesize(accept: Option<&str>) -> OfflineResponse {
    let content_type = OfflineContentType::for_accept(accept);
    let body = match content_type {
        OfflineContentType::Json => json!({
            "error": "Offline",
            "message": "This request is not available offline",
        })
        .to_string(),
        OfflineContentType::Html => OFFLINE_PAGE.to_string(),
        OfflineContentType::Text => "Offline".to_string(),
    };

    OfflineResponse { status: OFFLINE_STATUS, content_type, body }
}
