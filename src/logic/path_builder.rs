use super::types::SwapPath;
use crate::utils::TokenWrapper;
use eyre::Result;

/// Build candidate paths for a trade, in the order they should be tried.
///
/// `from` and `to` must already be mapped to on-chain tokens (native replaced by the wrapped
/// token). When either endpoint is the bridge token only the direct path exists; otherwise the
/// direct path comes first and the path through the bridge second. Returns an empty list when no
/// path can be built, e.g. both endpoints are the same token.
pub fn candidate_paths(from: &TokenWrapper, to: &TokenWrapper, bridge: &TokenWrapper) -> Vec<SwapPath> {
    let mut candidates = Vec::with_capacity(2);
    if from == to {
        return candidates;
    }

    if let Ok(direct) = SwapPath::direct(from.clone(), to.clone()) {
        candidates.push(direct);
    }

    let touches_bridge = from == bridge || to == bridge;
    if !touches_bridge {
        if let Ok(bridged) = SwapPath::via(from.clone(), bridge.clone(), to.clone()) {
            candidates.push(bridged);
        }
    }

    candidates
}

/// Single pool path used by the concentrated-liquidity router.
pub fn single_pool_path(from: &TokenWrapper, to: &TokenWrapper) -> Result<SwapPath> {
    SwapPath::direct(from.clone(), to.clone())
}
