//! Client IP extraction utilities.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::ConnectInfo,
    http::{Extensions, HeaderMap},
};

/// Proxy header carrying the client IP.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIpHeader {
    /// First address in `X-Forwarded-For`.
    XForwardedFor,
    /// `X-Real-IP`.
    XRealIp,
}

impl ClientIpHeader {
    pub fn header_name(&self) -> &'static str {
        match self {
            ClientIpHeader::XForwardedFor => "x-forwarded-for",
            ClientIpHeader::XRealIp => "x-real-ip",
        }
    }

    fn parse(&self, value: &str) -> Option<IpAddr> {
        let candidate = match self {
            ClientIpHeader::XForwardedFor => value.split(',').next()?,
            ClientIpHeader::XRealIp => value,
        };
        candidate.trim().parse().ok()
    }
}

/// Trait for types that provide access to HTTP headers and extensions.
/// Implemented for both `Parts` and `Request` to allow flexible IP extraction.
pub trait HasHeadersAndExtensions {
    fn headers(&self) -> &HeaderMap;
    fn extensions(&self) -> &Extensions;
}

impl HasHeadersAndExtensions for axum::http::request::Parts {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }
    fn extensions(&self) -> &Extensions {
        &self.extensions
    }
}

impl<B> HasHeadersAndExtensions for axum::extract::Request<B> {
    fn headers(&self) -> &HeaderMap {
        axum::extract::Request::headers(self)
    }
    fn extensions(&self) -> &Extensions {
        axum::extract::Request::extensions(self)
    }
}

/// Extract the client IP.
///
/// With a configured header, only that header is trusted; it is never mixed
/// with the socket address. Without one, the `ConnectInfo` socket address is
/// used. Returns `None` when neither yields an address.
pub fn extract_client_ip<T: HasHeadersAndExtensions>(
    source: &T,
    ip_header: Option<ClientIpHeader>,
) -> Option<IpAddr> {
    match ip_header {
        Some(header) => {
            let value = source.headers().get(header.header_name())?.to_str().ok()?;
            header.parse(value)
        }
        None => source
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip()),
    }
}
