use crate::core::catalog::SteamCatalog;
use crate::core::content_store::is_numeric_id;
use crate::models::catalog::{Metadata, Resolution, ResultCode};
use crate::models::error::SError;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Collection levels expanded below the requested ids.
const MAX_NESTING: usize = 2;

/// Expands collection ids into their member items.
pub struct CollectionResolver {
    catalog: SteamCatalog,
}

impl CollectionResolver {
    pub fn new(catalog: SteamCatalog) -> Self {
        Self { catalog }
    }

    /// Structured query first, then the item's web page. An id that yields no
    /// members either way is a plain item, not an error.
    pub fn resolve(&self, id: &str) -> Resolution {
        let mut members = match self.catalog.collection_children(id) {
            Ok(children) => children,
            Err(e) => {
                warn!("collection query for {id} failed: {e}");
                Vec::new()
            }
        };

        if members.is_empty() {
            debug!("no structured members for {id}, scraping page");
            members = match self
                .catalog
                .item_page(id)
                .and_then(|html| extract_members(&html, id))
            {
                Ok(found) => found,
                Err(e) => {
                    warn!("page fetch for {id} failed: {e}");
                    Vec::new()
                }
            };
        }

        let members = dedup(members, id);
        if members.is_empty() {
            return Resolution {
                title: None,
                members,
                is_collection: false,
            };
        }

        let (meta, code) = self.catalog.fetch_single(id);
        Resolution {
            title: (code == ResultCode::Found).then_some(meta.title),
            members,
            is_collection: true,
        }
    }

    /// Resolves every id, replacing collections by their members in place.
    /// Ids seen earlier in the list are not repeated. A collection nested in a
    /// collection is expanded too; deeper nesting is kept as plain ids.
    pub fn expand(&self, ids: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.expand_level(ids, 0, &mut seen, &mut out);
        out
    }

    fn expand_level(
        &self,
        ids: &[String],
        depth: usize,
        seen: &mut HashSet<String>,
        out: &mut Vec<String>,
    ) {
        let resolvable = depth < MAX_NESTING;
        // One batched lookup spares the collection query and page fetch for
        // ids that are plainly items.
        let details: BTreeMap<String, Metadata> = if resolvable {
            let lookup: Vec<String> = ids
                .iter()
                .filter(|id| is_numeric_id(id) && !seen.contains(*id))
                .cloned()
                .collect();
            self.catalog.fetch_metadata(&lookup)
        } else {
            BTreeMap::new()
        };

        for id in ids {
            if seen.contains(id) {
                continue;
            }
            let plain = !resolvable
                || !is_numeric_id(id)
                || details.get(id).is_some_and(Metadata::has_content);
            let resolution = if plain { None } else { Some(self.resolve(id)) };

            match resolution {
                Some(r) if r.is_collection => {
                    debug!("{id} expands to {} members", r.members.len());
                    seen.insert(id.clone());
                    self.expand_level(&r.members, depth + 1, seen, out);
                }
                _ => {
                    seen.insert(id.clone());
                    out.push(id.clone());
                }
            }
        }
    }
}

/// Ids referenced by `sharedfile_<id>` anchors, in page order.
pub fn extract_members(html: &str, own_id: &str) -> Result<Vec<String>, SError> {
    let re = regex::Regex::new(r#"id="sharedfile_(\d+)""#)
        .map_err(|e| SError::ParseError(format!("Failed to create regex: {}", e)))?;
    let found = re
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();
    Ok(dedup(found, own_id))
}

fn dedup(ids: Vec<String>, own_id: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|i| i != own_id && seen.insert(i.clone()))
        .collect()
}
