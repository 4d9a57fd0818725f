//! Catalog API access
//!
//! Endpoint builders, the transport seam, and the error taxonomy shared by
//! the scheduler and the fetch façade.

pub mod endpoints;
mod error;
mod http;
pub mod transport;

pub use error::{ErrorKind, FetchError};
pub use http::HttpTransport;
pub use transport::{Transport, TransportError, TransportResponse};
