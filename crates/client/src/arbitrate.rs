//! Request arbitration.
//!
//! Every read goes through [`Arbitrator::handle`]:
//!
//! - cache-first (static and animation assets): serve a tier hit without
//!   touching the network; otherwise fetch, store 2xx into `static`, serve.
//! - network-first (remote API and everything else): fetch, store 2xx into
//!   `dynamic`, serve; on failure serve the stale tier entry.
//!
//! A transport failure, a timeout, or a non-2xx status all send the request
//! down the fallback chain. When the tiers cannot answer, an upstream error
//! response is passed through as-is; with no response at all the caller gets
//! a synthesized offline placeholder. Only 2xx responses are ever stored.
//!
//! Non-read requests are not arbitrated and never touch the tiers.
//!
//! Without tiers (the cache database could not be opened) the arbitrator
//! still serves: every read is fetched, and failures go straight to the
//! offline placeholder.

use std::time::Duration;

use fairweather_core::{ActiveTiers, AppConfig, CacheDb, CachedResponse, TierKind, TierManager};
use url::Url;

use crate::classify::{Classifier, RequestClass, Strategy};
use crate::fetch::{FetchConfig, FetchError, Fetcher, HttpFetcher};
use crate::offline::synthesize;
use crate::request::{Request, Response};

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache(TierKind),
    Offline,
}

/// An arbitrated answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
    pub class: RequestClass,
}

/// Outcome of [`Arbitrator::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// A read, answered by the network, a tier, or the synthesizer.
    Arbitrated(Served),
    /// A non-read, passed straight to the network.
    Bypassed(Result<Response, FetchError>),
}

impl Disposition {
    /// The arbitrated answer, if this was a read.
    pub fn served(self) -> Option<Served> {
        match self {
            Disposition::Arbitrated(served) => Some(served),
            Disposition::Bypassed(_) => None,
        }
    }
}

/// Result of precaching the static asset manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: usize,
    pub failed: Vec<String>,
}

/// What one network attempt produced.
enum Attempt {
    /// 2xx.
    Fresh(Response),
    /// The upstream answered with an error status.
    Rejected(Response),
    /// No response at all.
    Failed(FetchError),
}

pub struct Arbitrator<F> {
    fetcher: F,
    tiers: Option<ActiveTiers>,
    classifier: Classifier,
    timeout: Duration,
}

impl Arbitrator<HttpFetcher> {
    /// Arbitrator over the reqwest fetcher, configured from `config`.
    pub fn from_config(config: &AppConfig, tiers: ActiveTiers) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(&FetchConfig::from(config))?;
        Ok(Self::new(fetcher, tiers, Classifier::from_config(config), config.fetch_timeout()))
    }

    /// Open and activate the tiers in `config.db_path`, then build the
    /// arbitrator. A database that cannot be opened or activated leaves the
    /// arbitrator without tiers rather than failing.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidRequest` if the HTTP client cannot be built.
    pub async fn open(config: &AppConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(&FetchConfig::from(config))?;
        let classifier = Classifier::from_config(config);
        let arbitrator = match open_tiers(config).await {
            Some(tiers) => Self::new(fetcher, tiers, classifier, config.fetch_timeout()),
            None => Self::untiered(fetcher, classifier, config.fetch_timeout()),
        };
        Ok(arbitrator)
    }
}

async fn open_tiers(config: &AppConfig) -> Option<ActiveTiers> {
    if !config.durable_store {
        tracing::info!("durable storage disabled, arbitrating without cache tiers");
        return None;
    }

    let path = &config.db_path;
    if let Some(parent) = path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        tracing::warn!(path = %parent.display(), error = %e, "failed to create cache directory");
    }

    let activated = match CacheDb::open(path).await {
        Ok(db) => TierManager::new(db).activate(config.tier_names()).await,
        Err(e) => Err(e),
    };
    match activated {
        Ok(tiers) => Some(tiers),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "cache tiers unavailable, arbitrating without them"
            );
            None
        }
    }
}

impl<F: Fetcher> Arbitrator<F> {
    /// `timeout` bounds every network attempt regardless of the fetcher.
    pub fn new(fetcher: F, tiers: ActiveTiers, classifier: Classifier, timeout: Duration) -> Self {
        Self { fetcher, tiers: Some(tiers), classifier, timeout }
    }

    /// Arbitrator with no cache tiers: network or offline placeholder only.
    pub fn untiered(fetcher: F, classifier: Classifier, timeout: Duration) -> Self {
        Self { fetcher, tiers: None, classifier, timeout }
    }

    /// The active tiers, if the arbitrator has any.
    pub fn tiers(&self) -> Option<&ActiveTiers> {
        self.tiers.as_ref()
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Answer one request.
    pub async fn handle(&self, request: &Request) -> Disposition {
        if !request.is_read() {
            tracing::debug!(method = %request.method, url = %request.url, "bypassing arbitration");
            return Disposition::Bypassed(self.fetch_bounded(request).await);
        }

        let class = self.classifier.classify(&request.url);
        let served = match class.strategy() {
            Strategy::CacheFirst => self.cache_first(request, class).await,
            Strategy::NetworkFirst => self.network_first(request, class).await,
        };
        Disposition::Arbitrated(served)
    }

    /// Fetch and store every manifest path, resolved against `base`, into
    /// the static tier. Failures are counted, never raised.
    pub async fn install<S: AsRef<str>>(&self, base: &Url, assets: &[S]) -> InstallReport {
        let mut report = InstallReport::default();

        for asset in assets {
            let path = asset.as_ref();
            let request = match base.join(path).map(|url| Request::get(url.as_str())) {
                Ok(Ok(request)) => request,
                Ok(Err(e)) => {
                    tracing::warn!(asset = %path, error = %e, "skipping unfetchable asset");
                    report.failed.push(path.to_string());
                    continue;
                }
                Err(e) => {
                    tracing::warn!(asset = %path, error = %e, "skipping unresolvable asset");
                    report.failed.push(path.to_string());
                    continue;
                }
            };

            match self.attempt(&request).await {
                Attempt::Fresh(_) if self.tiers.is_none() => {
                    tracing::warn!(asset = %path, "no cache tiers to precache into");
                    report.failed.push(path.to_string());
                }
                Attempt::Fresh(response) => {
                    if self.remember(TierKind::Static, &request, &response).await {
                        report.cached += 1;
                    } else {
                        report.failed.push(path.to_string());
                    }
                }
                Attempt::Rejected(response) => {
                    tracing::warn!(asset = %path, status = response.status, "asset precache rejected");
                    report.failed.push(path.to_string());
                }
                Attempt::Failed(e) => {
                    tracing::warn!(asset = %path, error = %e, "asset precache failed");
                    report.failed.push(path.to_string());
                }
            }
        }

        tracing::info!(
            tier = self.tiers.as_ref().map(|t| t.names().static_tier.as_str()),
            cached = report.cached,
            failed = report.failed.len(),
            "static assets precached"
        );
        report
    }

    async fn cache_first(&self, request: &Request, class: RequestClass) -> Served {
        let key = request.cache_key();
        if let Some((kind, cached)) = self.lookup(&key).await {
            tracing::debug!(url = %request.url, ?kind, "tier hit");
            return Served { response: cached.into(), source: ResponseSource::Cache(kind), class };
        }

        match self.attempt(request).await {
            Attempt::Fresh(response) => {
                self.remember(TierKind::Static, request, &response).await;
                Served { response, source: ResponseSource::Network, class }
            }
            // Another request may have filled the tier while this one was out.
            Attempt::Rejected(response) => self.fall_back(request, class, &key, Some(response)).await,
            Attempt::Failed(_) => self.fall_back(request, class, &key, None).await,
        }
    }

    async fn network_first(&self, request: &Request, class: RequestClass) -> Served {
        match self.attempt(request).await {
            Attempt::Fresh(response) => {
                self.remember(TierKind::Dynamic, request, &response).await;
                Served { response, source: ResponseSource::Network, class }
            }
            Attempt::Rejected(response) => self.fall_back(request, class, &request.cache_key(), Some(response)).await,
            Attempt::Failed(_) => self.fall_back(request, class, &request.cache_key(), None).await,
        }
    }

    /// Tier entry if any, else the upstream's answer if any, else offline.
    async fn fall_back(&self, request: &Request, class: RequestClass, key: &str, upstream: Option<Response>) -> Served {
        if let Some((kind, cached)) = self.lookup(key).await {
            tracing::info!(
                url = %request.url,
                ?kind,
                stored_at = %cached.stored_at,
                "serving cached response after network failure"
            );
            return Served { response: cached.into(), source: ResponseSource::Cache(kind), class };
        }

        if let Some(response) = upstream {
            return Served { response, source: ResponseSource::Network, class };
        }

        let offline = synthesize(request.accept.as_deref());
        tracing::warn!(url = %request.url, content_type = offline.content_type.mime(), "serving offline placeholder");
        Served { response: offline.into(), source: ResponseSource::Offline, class }
    }

    async fn attempt(&self, request: &Request) -> Attempt {
        match self.fetch_bounded(request).await {
            Ok(response) if response.is_success() => Attempt::Fresh(response),
            Ok(response) => {
                tracing::debug!(url = %request.url, status = response.status, "upstream returned error status");
                Attempt::Rejected(response)
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "network fetch failed");
                Attempt::Failed(e)
            }
        }
    }

    async fn fetch_bounded(&self, request: &Request) -> Result<Response, FetchError> {
        match tokio::time::timeout(self.timeout, self.fetcher.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    /// Tier read; a tier error or a missing tier set reads as a miss.
    async fn lookup(&self, key: &str) -> Option<(TierKind, CachedResponse)> {
        let tiers = self.tiers.as_ref()?;
        match tiers.lookup_any(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "tier lookup failed");
                None
            }
        }
    }

    /// Tier write; a tier error is logged and dropped. Returns whether the
    /// tier now holds a response for the request.
    async fn remember(&self, kind: TierKind, request: &Request, response: &Response) -> bool {
        let Some(tiers) = &self.tiers else {
            return false;
        };
        let cached = response.to_cached(&request.url);
        match tiers.store(kind, &request.cache_key(), &cached).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(url = %request.url, ?kind, error = %e, "failed to store response in tier");
                false
            }
        }
    }
}
