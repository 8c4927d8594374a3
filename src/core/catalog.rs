use crate::config::catalog::CatalogSettings;
use crate::models::catalog::{Metadata, ResultCode};
use crate::models::error::SError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The two HTTP shapes the catalog needs.
pub trait CatalogTransport: Send + Sync {
    fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<String, SError>;
    fn get(&self, url: &str) -> Result<String, SError>;
}

pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(settings: &CatalogSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(settings.connect_timeout_secs))
            .timeout_read(Duration::from_secs(settings.read_timeout_secs))
            .user_agent(&settings.user_agent)
            .build();
        Self { agent }
    }
}

impl CatalogTransport for UreqTransport {
    fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<String, SError> {
        let pairs: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Ok(self.agent.post(url).send_form(&pairs)?.into_string()?)
    }

    fn get(&self, url: &str) -> Result<String, SError> {
        Ok(self.agent.get(url).call()?.into_string()?)
    }
}

#[derive(Deserialize)]
struct DetailsEnvelope {
    response: DetailsResponse,
}

#[derive(Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    publishedfiledetails: Vec<FileDetails>,
}

#[derive(Deserialize)]
struct FileDetails {
    publishedfileid: String,
    #[serde(default)]
    result: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    file_size: Option<Value>,
}

impl FileDetails {
    fn into_metadata(self) -> Metadata {
        let result = ResultCode::from_api(self.result);
        if result != ResultCode::Found {
            return Metadata::placeholder(&self.publishedfileid, result);
        }
        let file_size = self.file_size.and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Addon {}", self.publishedfileid));
        Metadata {
            id: self.publishedfileid,
            title,
            description: self.description.unwrap_or_default(),
            file_size,
            result,
        }
    }
}

#[derive(Deserialize)]
struct CollectionEnvelope {
    response: CollectionResponse,
}

#[derive(Deserialize)]
struct CollectionResponse {
    #[serde(default)]
    collectiondetails: Vec<CollectionDetails>,
}

#[derive(Deserialize)]
struct CollectionDetails {
    #[serde(default)]
    result: i64,
    #[serde(default)]
    children: Vec<CollectionChild>,
}

#[derive(Deserialize)]
struct CollectionChild {
    publishedfileid: String,
    #[serde(default)]
    sortorder: i64,
}

/// Client for the workshop catalog. Metadata lookups are best-effort: any
/// transport or decoding failure turns into placeholder entries.
#[derive(Clone)]
pub struct SteamCatalog {
    transport: Arc<dyn CatalogTransport>,
    settings: CatalogSettings,
}

impl SteamCatalog {
    pub fn new(transport: Arc<dyn CatalogTransport>, settings: CatalogSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn from_settings(settings: CatalogSettings) -> Self {
        Self::new(Arc::new(UreqTransport::new(&settings)), settings)
    }

    pub fn fetch_metadata(&self, ids: &[String]) -> BTreeMap<String, Metadata> {
        let batch_size = self.settings.batch_size.max(1);
        ids.chunks(batch_size)
            .flat_map(|batch| self.fetch_batch(batch))
            .collect()
    }

    pub fn fetch_single(&self, id: &str) -> (Metadata, ResultCode) {
        let meta = self
            .fetch_batch(&[id.to_string()])
            .remove(id)
            .unwrap_or_else(|| Metadata::placeholder(id, ResultCode::Unknown));
        let code = meta.result;
        (meta, code)
    }

    /// Member ids reported by the structured collection query, in sort order.
    pub fn collection_children(&self, id: &str) -> Result<Vec<String>, SError> {
        let fields = numbered_fields("collectioncount", &[id.to_string()]);
        let body = self
            .transport
            .post_form(&self.settings.collection_url, &fields)?;
        let envelope: CollectionEnvelope = serde_json::from_str(&body)?;

        let mut children: Vec<CollectionChild> = envelope
            .response
            .collectiondetails
            .into_iter()
            .filter(|d| ResultCode::from_api(d.result) == ResultCode::Found)
            .flat_map(|d| d.children)
            .collect();
        children.sort_by_key(|c| c.sortorder);
        Ok(children.into_iter().map(|c| c.publishedfileid).collect())
    }

    pub fn item_page(&self, id: &str) -> Result<String, SError> {
        self.transport.get(&self.settings.page_for(id))
    }

    fn fetch_batch(&self, batch: &[String]) -> BTreeMap<String, Metadata> {
        let mut out: BTreeMap<String, Metadata> = match self.query_details(batch) {
            Ok(found) => found,
            Err(e) => {
                warn!("catalog lookup for {} items failed: {e}", batch.len());
                BTreeMap::new()
            }
        };
        for id in batch {
            out.entry(id.clone())
                .or_insert_with(|| Metadata::placeholder(id, ResultCode::Unknown));
        }
        out
    }

    fn query_details(&self, batch: &[String]) -> Result<BTreeMap<String, Metadata>, SError> {
        let fields = numbered_fields("itemcount", batch);
        let body = self.transport.post_form(&self.settings.details_url, &fields)?;
        let envelope: DetailsEnvelope = serde_json::from_str(&body)?;
        debug!(
            "catalog returned {} of {} items",
            envelope.response.publishedfiledetails.len(),
            batch.len()
        );
        Ok(envelope
            .response
            .publishedfiledetails
            .into_iter()
            .map(|d| {
                let meta = d.into_metadata();
                (meta.id.clone(), meta)
            })
            .collect())
    }
}

fn numbered_fields(count_key: &str, ids: &[String]) -> Vec<(String, String)> {
    std::iter::once((count_key.to_string(), ids.len().to_string()))
        .chain(
            ids.iter()
                .enumerate()
                .map(|(i, id)| (format!("publishedfileids[{i}]"), id.clone())),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_fields_layout() {
        let fields = numbered_fields("itemcount", &["1".into(), "2".into()]);
        assert_eq!(
            fields,
            vec![
                ("itemcount".to_string(), "2".to_string()),
                ("publishedfileids[0]".to_string(), "1".to_string()),
                ("publishedfileids[1]".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_file_details_string_size_and_codes() {
        let found: FileDetails = serde_json::from_str(
            r#"{"publishedfileid":"5","result":1,"title":"Tank","file_size":"1024"}"#,
        )
        .unwrap();
        let meta = found.into_metadata();
        assert_eq!(meta.title, "Tank");
        assert_eq!(meta.file_size, Some(1024));

        let private: FileDetails =
            serde_json::from_str(r#"{"publishedfileid":"6","result":17}"#).unwrap();
        let meta = private.into_metadata();
        assert_eq!(meta.result, ResultCode::Private);
        assert!(meta.is_placeholder());
    }
}
