//! Sports API clients
//!
//! `DataProvider` is the REST boundary consumed by the fetch path;
//! `HttpDataProvider` implements it over HTTP/JSON and
//! `TracedDataProvider` wraps any implementation with call logging.

pub mod http;
pub mod provider;
pub mod traced;

pub use http::HttpDataProvider;
pub use provider::{DataProvider, DataProviderError};
pub use traced::TracedDataProvider;
