//! Request classification.
//!
//! A request's class is a pure function of its path and host. Rules are
//! tried in order and the first match wins:
//!
//! 1. path listed in the static asset manifest: [`RequestClass::StaticAsset`]
//! 2. path under the animation prefix: [`RequestClass::AnimationAsset`]
//! 3. host on the API allowlist (exact or subdomain): [`RequestClass::RemoteApi`]
//! 4. anything else: [`RequestClass::Other`]

use std::collections::HashSet;

use fairweather_core::AppConfig;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    StaticAsset,
    RemoteApi,
    AnimationAsset,
    Other,
}

/// How a request class is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from the tiers when present; the network only fills misses.
    CacheFirst,
    /// Prefer a fresh response; the tiers only cover network failures.
    NetworkFirst,
}

impl RequestClass {
    pub fn strategy(self) -> Strategy {
        match self {
            RequestClass::StaticAsset | RequestClass::AnimationAsset => Strategy::CacheFirst,
            RequestClass::RemoteApi | RequestClass::Other => Strategy::NetworkFirst,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    static_assets: HashSet<String>,
    animation_prefix: String,
    api_hosts: Vec<String>,
}

impl Classifier {
    pub fn new<A, H>(static_assets: A, animation_prefix: impl Into<String>, api_hosts: H) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        H: IntoIterator,
        H::Item: Into<String>,
    {
        Self {
            static_assets: static_assets.into_iter().map(Into::into).collect(),
            animation_prefix: animation_prefix.into(),
            api_hosts: api_hosts.into_iter().map(|h| h.into().to_ascii_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.static_assets.iter().cloned(),
            config.animation_prefix.clone(),
            config.api_hosts.iter().cloned(),
        )
    }

    pub fn classify(&self, url: &Url) -> RequestClass {
        let path = url.path();
        if self.static_assets.contains(path) {
            return RequestClass::StaticAsset;
        }
        if !self.animation_prefix.is_empty() && path.starts_with(&self.animation_prefix) {
            return RequestClass::AnimationAsset;
        }
        if let Some(host) = url.host_str()
            && self.is_api_host(host)
        {
            return RequestClass::RemoteApi;
        }
        RequestClass::Other
    }

    fn is_api_host(&self, host: &str) -> bool {
        self.api_hosts.iter().any(|allowed| {
            host == allowed || (host.ends_with(allowed.as_str()) && host[..host.len() - allowed.len()].ends_with('.'))
        })
    }
}
