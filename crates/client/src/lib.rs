//! Request arbitration for the fairweather offline caching layer.
//!
//! This crate provides the network-facing half: request classification,
//! cache-first and network-first strategies over the core crate's tiers,
//! static asset precaching, and typed offline placeholders for when neither
//! the network nor a tier can answer.

pub mod arbitrate;
pub mod classify;
pub mod fetch;
pub mod offline;
pub mod request;

pub use arbitrate::{Arbitrator, Disposition, InstallReport, ResponseSource, Served};
pub use classify::{Classifier, RequestClass, Strategy};
pub use fetch::{FetchConfig, FetchError, Fetcher, HttpFetcher};
pub use offline::{OfflineContentType, OfflineResponse, synthesize};
pub use request::{Request, RequestError, Response};
