//! Process-wide streaming session

use crate::config::Config;
use crate::errors::{Result, ShipperError};
use reqwest::Url;
use uuid::Uuid;

/// Identity and target of one streaming process. Built once, shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub server_url: String,
    pub dataspace_id: String,
    pub auth_token: String,
}

impl Session {
    /// Start a new session with a freshly generated id
    pub fn new(config: &Config) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: config.name.clone(),
            server_url: config.server_url.clone(),
            dataspace_id: config.dataspace_id.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    /// Endpoint batches are POSTed to
    pub fn ingest_url(&self) -> String {
        format!(
            "{}api/v1/dataspaces/{}/ingest",
            self.server_url, self.dataspace_id
        )
    }

    /// Live search showing this stream, by name when there is one
    pub fn search_url(&self) -> Result<Url> {
        let base = format!("{}{}/search", self.server_url, self.dataspace_id);
        let mut url = Url::parse(&base)
            .map_err(|e| ShipperError::Config(format!("invalid search url {}: {}", base, e)))?;

        let query = if self.name.is_empty() {
            format!("@session={}", self.id)
        } else {
            format!("@name={}", self.name)
        };

        url.query_pairs_mut()
            .append_pair("live", "true")
            .append_pair("start", "1d")
            .append_pair("query", &query);

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str) -> Session {
        Session {
            id: "s1".to_string(),
            name: name.to_string(),
            server_url: "https://cloud.humio.com/".to_string(),
            dataspace_id: "scratch".to_string(),
            auth_token: "token".to_string(),
        }
    }

    #[test]
    fn test_new_sessions_get_distinct_ids() {
        let config = Config::default();
        let a = Session::new(&config);
        let b = Session::new(&config);

        assert_ne!(a.id, b.id);
        assert_eq!(a.dataspace_id, "scratch");
    }

    #[test]
    fn test_ingest_url() {
        assert_eq!(
            session("demo").ingest_url(),
            "https://cloud.humio.com/api/v1/dataspaces/scratch/ingest"
        );
    }

    #[test]
    fn test_search_url_uses_name() {
        let url = session("demo").search_url().unwrap();

        assert_eq!(
            url.as_str(),
            "https://cloud.humio.com/scratch/search?live=true&start=1d&query=%40name%3Ddemo"
        );
    }

    #[test]
    fn test_search_url_falls_back_to_session() {
        let url = session("").search_url().unwrap();

        assert!(url.as_str().ends_with("query=%40session%3Ds1"));
    }
}
