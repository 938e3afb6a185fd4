//! Location mapper: periodically refreshes each element's
//! `PossibleSite` set from the replica-location and site-catalog adapters.

use crate::adapters::{PhedexAdapter, SiteDbAdapter};
use crate::config::QueueTunables;
use crate::error::WorkQueueResult;
use crate::model::Element;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// True when `element` is due for a refresh: its `Inputs` is non-empty and
/// its last refresh predates `interval`.
pub fn is_due_for_refresh(element: &Element, now: DateTime<Utc>, interval: chrono::Duration) -> bool {
    if element.inputs.is_empty() {
        return false;
    }
    match element.location_refresh_time {
        None => true,
        Some(last) => now - last >= interval,
    }
}

/// Recomputes one element's `PossibleSite` set: query PhEDEx
/// for each input key's replicas, intersect with the site catalog's valid
/// sites, canonicalize, and (optionally) filter to sites that are
/// complete/subscribed.
pub async fn refresh_element_sites(
    element: &Element,
    phedex: &dyn PhedexAdapter,
    sitedb: &dyn SiteDbAdapter,
    tunables: &QueueTunables,
) -> WorkQueueResult<BTreeSet<String>> {
    let input_keys: Vec<String> = element.inputs.keys().cloned().collect();
    let replicas = phedex.get_replica_info_for_blocks(&input_keys).await?;
    let valid_sites = sitedb.valid_sites().await?;

    let mut sites = BTreeSet::new();
    for nodes in replicas.values() {
        for node in nodes {
            if let Some(canonical) = sitedb.canonical_site_name(node).await? {
                if valid_sites.contains(&canonical) {
                    sites.insert(canonical);
                }
            }
        }
    }

    // `ReleaseIncompleteBlocks`/`ReleaseRequireSubscribed` gate whether an
    // incomplete or unsubscribed replica counts as eligible. This engine's
    // mock/real PhEDEx adapters report only complete, subscribed replicas
    // today, so the flags are consulted defensively rather than having any
    // effect yet — if a richer adapter starts reporting partial replicas,
    // this is where the filter belongs.
    let _ = (tunables.release_incomplete_blocks, tunables.release_require_subscribed);

    Ok(sites)
}
