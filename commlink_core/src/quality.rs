//! Link quality model.
//!
//! Quality is a scalar in [0, 1]: 1 is a perfect link, 0 means no link.
//! Along a path qualities multiply, so the search engines compare products.

use crate::node::{Broadcaster, EndpointKind, Receiver};

/// Quality of the link from `broadcaster` to `receiver`.
///
/// For two ranged radios:
/// ```text
/// q = (1 - clamp(d² / r², 0, 1))²
/// ```
/// where `d` is the distance between broadcast origin and receiver and `r`
/// the broadcaster's radius. Any other endpoint pairing is an always-on
/// link with quality 1.
pub fn link_quality(broadcaster: &Broadcaster, receiver: &Receiver) -> f64 {
    match (broadcaster.kind, receiver.kind) {
        (EndpointKind::RangedRadio { radius }, EndpointKind::RangedRadio { .. }) => {
            let dist2 = (broadcaster.position - receiver.position).norm_squared();
            radio_quality(dist2, radius)
        }
        _ => 1.0,
    }
}

/// Radio falloff for a squared distance and a broadcast radius.
pub fn radio_quality(dist2: f64, radius: f64) -> f64 {
    let radius2 = radius * radius;
    if radius2 <= 0.0 {
        return 0.0;
    }
    let q = 1.0 - (dist2 / radius2).clamp(0.0, 1.0);
    q * q
}

/// Distance at which a radio of `radius` yields `quality`.
///
/// Inverse of [`radio_quality`]; used to place endpoints in scenes and fixtures.
pub fn distance_for_quality(quality: f64, radius: f64) -> f64 {
    radius * (1.0 - quality.clamp(0.0, 1.0).sqrt()).sqrt()
}
