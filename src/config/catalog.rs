use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CatalogSettings {
    pub details_url: String,
    pub collection_url: String,
    /// `{id}` is replaced with the item id.
    pub page_url: String,
    pub batch_size: usize,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            details_url: "https://api.steampowered.com/ISteamRemoteStorage/GetPublishedFileDetails/v1/"
                .into(),
            collection_url:
                "https://api.steampowered.com/ISteamRemoteStorage/GetCollectionDetails/v1/".into(),
            page_url: "https://steamcommunity.com/sharedfiles/filedetails/?id={id}".into(),
            batch_size: 50,
            connect_timeout_secs: 5,
            read_timeout_secs: 10,
            user_agent: concat!("addon-keeper/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl CatalogSettings {
    pub fn page_for(&self, id: &str) -> String {
        self.page_url.replace("{id}", id)
    }
}
