use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable fingerprint of an article link.
///
/// Lowercase hex SHA-256 of the link with its query string removed, so
/// tracking parameters never produce a second identity for the same article.
/// Nothing else is needed to re-derive it, which is what lets dedup work
/// across restarts without keeping the original links around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn from_link(link: &str) -> Self {
        let core = link.split('?').next().unwrap_or(link);
        let mut hasher = Sha256::new();
        hasher.update(core.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shorthand for [`ArticleId::from_link`].
pub fn article_id(link: &str) -> ArticleId {
    ArticleId::from_link(link)
}
