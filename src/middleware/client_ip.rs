use actix_web::dev::ServiceRequest;
use actix_web::http::header::HeaderMap;
use std::net::SocketAddr;

/// Identity used when no client address can be resolved. Unresolvable clients
/// share one rate-limit bucket, so limiting degrades to a conservative
/// aggregate instead of switching off.
pub const FALLBACK_CLIENT_ADDR: &str = "unknown";

// Relies on the immediate upstream proxy correctly setting the configured
// forwarding header. The first address in the chain is the original client;
// later entries are proxies appended along the way.
pub fn resolve_client_addr(req: &ServiceRequest, forwarded_header: &str) -> String {
    resolve_from_parts(req.headers(), req.peer_addr(), forwarded_header)
}

pub fn resolve_from_parts(
    headers: &HeaderMap,
    peer_addr: Option<SocketAddr>,
    forwarded_header: &str,
) -> String {
    if let Some(forwarded) = headers.get(forwarded_header) {
        if let Ok(forwarded_str) = forwarded.to_str() {
            // Multi-hop values may be comma or space separated.
            if let Some(first_hop) = forwarded_str
                .split([',', ' '])
                .find(|part| !part.trim().is_empty())
            {
                return first_hop.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(real_ip_str) = real_ip.to_str() {
            let real_ip_str = real_ip_str.trim();
            if !real_ip_str.is_empty() {
                return real_ip_str.to_string();
            }
        }
    }

    // Fallback to connection info
    if let Some(peer_addr) = peer_addr {
        return peer_addr.ip().to_string();
    }

    FALLBACK_CLIENT_ADDR.to_string()
}
