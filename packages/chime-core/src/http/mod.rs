//! Minimal HTTP/1.1 client.
//!
//! Fixed-length bodies only: chunked transfer encoding, redirects and
//! trailers are not handled.

pub mod client;
pub mod headers;
pub mod parsed_url;
pub mod parser;
pub mod response;

pub use client::HttpClient;
pub use headers::{find_header, Header, Headers, RangeHeader};
pub use parsed_url::ParsedUrl;
pub use response::Response;
