//! Upstream index access
//!
//! Plain HTTP fetching plus the directory proxy used once to seed the
//! serial table.

mod http;
mod proxy;
#[cfg(test)]
pub(crate) mod testing;

pub use http::{HttpFetch, HttpResponse, UreqFetcher, DEVPI_SERIAL_HEADER, PYPI_SERIAL_HEADER};
pub use proxy::SimpleIndexProxy;
