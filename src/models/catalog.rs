use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    Found,
    Removed,
    Private,
    Unknown,
}

impl ResultCode {
    pub fn from_api(code: i64) -> Self {
        match code {
            1 => ResultCode::Found,
            9 => ResultCode::Removed,
            17 => ResultCode::Private,
            _ => ResultCode::Unknown,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Metadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub file_size: Option<u64>,
    pub result: ResultCode,
}

impl Metadata {
    /// Stand-in used when the catalog cannot describe an item.
    pub fn placeholder(id: &str, result: ResultCode) -> Self {
        let title = match result {
            ResultCode::Removed => format!("Removed addon {id}"),
            ResultCode::Private => format!("Private addon {id}"),
            _ => format!("Unavailable addon {id}"),
        };
        Self {
            id: id.to_string(),
            title,
            description: String::new(),
            file_size: None,
            result,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.result != ResultCode::Found
    }

    /// A found item with a file behind it. Collections carry no file of their own.
    pub fn has_content(&self) -> bool {
        self.result == ResultCode::Found && self.file_size.is_some_and(|size| size > 0)
    }
}

/// What a collection id expanded to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Resolution {
    pub title: Option<String>,
    pub members: Vec<String>,
    pub is_collection: bool,
}
