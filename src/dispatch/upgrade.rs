//! The upgrade-request decision chain.
//!
//! Two probes, no pipeline involvement: the bare proxy claims first, the
//! tunnel takes URLs ending in its endpoint suffix, and everything else
//! tears the connection down with no bytes written.

use hyper::Uri;

/// Where an upgrade request is delegated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeRoute {
    /// Claimed by the bare-proxy collaborator.
    Bare,
    /// URL ends with the tunnel endpoint suffix.
    Tunnel,
    /// Unclaimed: drop the connection without responding.
    Reject,
}

/// Classify an upgrade request, first match wins.
pub fn classify_upgrade(bare_claims: bool, uri: &Uri, tunnel_suffix: &str) -> UpgradeRoute {
    if bare_claims {
        UpgradeRoute::Bare
    } else if uri.path().ends_with(tunnel_suffix) {
        UpgradeRoute::Tunnel
    } else {
        UpgradeRoute::Reject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn bare_claim_wins_over_tunnel_suffix() {
        assert_eq!(
            classify_upgrade(true, &uri("/anything/wisp/"), "/wisp/"),
            UpgradeRoute::Bare
        );
    }

    #[test]
    fn tunnel_suffix_matches_on_path_end() {
        assert_eq!(
            classify_upgrade(false, &uri("/wisp/"), "/wisp/"),
            UpgradeRoute::Tunnel
        );
        assert_eq!(
            classify_upgrade(false, &uri("/proxy/wisp/"), "/wisp/"),
            UpgradeRoute::Tunnel
        );
    }

    #[test]
    fn everything_else_is_rejected() {
        assert_eq!(
            classify_upgrade(false, &uri("/wisp"), "/wisp/"),
            UpgradeRoute::Reject
        );
        assert_eq!(
            classify_upgrade(false, &uri("/ws"), "/wisp/"),
            UpgradeRoute::Reject
        );
    }
}
