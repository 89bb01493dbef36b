use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use genopos_core::chrom::parse_chrom_sizes;
use genopos_core::GeneSuggestion;

/// One source advertised by a server: the assembly it covers and the
/// server-side id used to query it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceEntry {
    pub assembly_id: String,
    pub source_id: String,
}

/// The remote collaborators: chrom-size providers and gene suggestion
/// services, addressed by server base URL.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_chrom_size_sources(
        &self,
        server: &str,
    ) -> Result<Vec<SourceEntry>>;

    async fn list_gene_annotation_sources(
        &self,
        server: &str,
    ) -> Result<Vec<SourceEntry>>;

    async fn fetch_chrom_sizes(
        &self,
        server: &str,
        source_id: &str,
    ) -> Result<Vec<(String, u64)>>;

    /// Ranked candidates for a partial gene name, best match first.
    async fn fetch_suggestions(
        &self,
        server: &str,
        source_id: &str,
        partial: &str,
    ) -> Result<Vec<GeneSuggestion>>;
}

#[derive(Debug, Deserialize)]
struct SourceList {
    results: Vec<SourceRecord>,
}

#[derive(Debug, Deserialize)]
struct SourceRecord {
    #[serde(rename = "coordSystem", default)]
    coord_system: String,
    uuid: String,
}

impl SourceList {
    fn into_entries(self) -> Vec<SourceEntry> {
        self.results
            .into_iter()
            .filter(|r| !r.coord_system.is_empty())
            .map(|r| SourceEntry {
                assembly_id: r.coord_system,
                source_id: r.uuid,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn url(server: &str, path: &str) -> String {
        format!("{}/{path}", server.trim_end_matches('/'))
    }

    async fn source_list(
        &self,
        server: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<SourceEntry>> {
        let list: SourceList = self
            .client
            .get(Self::url(server, path))
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(list.into_entries())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_chrom_size_sources(
        &self,
        server: &str,
    ) -> Result<Vec<SourceEntry>> {
        self.source_list(server, "available-chrom-sizes/", &[]).await
    }

    async fn list_gene_annotation_sources(
        &self,
        server: &str,
    ) -> Result<Vec<SourceEntry>> {
        self.source_list(server, "tilesets/", &[("dt", "gene-annotation")])
            .await
    }

    async fn fetch_chrom_sizes(
        &self,
        server: &str,
        source_id: &str,
    ) -> Result<Vec<(String, u64)>> {
        let text = self
            .client
            .get(Self::url(server, "chrom-sizes/"))
            .query(&[("id", source_id)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(parse_chrom_sizes(&text)?)
    }

    async fn fetch_suggestions(
        &self,
        server: &str,
        source_id: &str,
        partial: &str,
    ) -> Result<Vec<GeneSuggestion>> {
        let suggestions = self
            .client
            .get(Self::url(server, "suggest/"))
            .query(&[("d", source_id), ("ac", partial)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(suggestions)
    }
}
