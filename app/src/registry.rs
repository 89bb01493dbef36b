use std::collections::{BTreeMap, BTreeSet};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::RwLock;

use crate::backend::{Backend, SourceEntry};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssemblySource {
    pub assembly_id: String,
    pub server: String,
    pub source_id: String,
}

impl AssemblySource {
    fn from_entry(server: &str, entry: SourceEntry) -> Self {
        Self {
            assembly_id: entry.assembly_id,
            server: server.to_string(),
            source_id: entry.source_id,
        }
    }
}

pub type SourceMap = BTreeMap<String, BTreeSet<AssemblySource>>;

/// Which assemblies have gene suggestion sources and chrom-size sources,
/// accumulated over discovery responses from any number of servers.
///
/// Entries are only ever added, so the set of available assemblies (those
/// with both capabilities) can only grow.
#[derive(Debug, Default, Clone)]
pub struct AssemblyRegistry {
    suggestion_sources: SourceMap,
    chrom_size_sources: SourceMap,
    available: BTreeSet<String>,
}

impl AssemblyRegistry {
    /// Returns `true` if the set of available assemblies grew.
    pub fn merge_suggestion_sources(
        &mut self,
        server: &str,
        entries: impl IntoIterator<Item = SourceEntry>,
    ) -> bool {
        merge_into(&mut self.suggestion_sources, server, entries);
        self.recompute()
    }

    /// Returns `true` if the set of available assemblies grew.
    pub fn merge_chrom_size_sources(
        &mut self,
        server: &str,
        entries: impl IntoIterator<Item = SourceEntry>,
    ) -> bool {
        merge_into(&mut self.chrom_size_sources, server, entries);
        self.recompute()
    }

    fn recompute(&mut self) -> bool {
        let before = self.available.len();

        let both = self
            .suggestion_sources
            .keys()
            .filter(|a| self.chrom_size_sources.contains_key(*a))
            .cloned()
            .collect::<Vec<_>>();
        self.available.extend(both);

        self.available.len() > before
    }

    pub fn available_assemblies(&self) -> &BTreeSet<String> {
        &self.available
    }

    pub fn is_available(&self, assembly: &str) -> bool {
        self.available.contains(assembly)
    }

    pub fn suggestion_sources(&self) -> &SourceMap {
        &self.suggestion_sources
    }

    pub fn chrom_size_sources(&self) -> &SourceMap {
        &self.chrom_size_sources
    }

    pub fn suggestion_source(&self, assembly: &str) -> Option<&AssemblySource> {
        self.suggestion_sources.get(assembly)?.iter().next()
    }

    pub fn chrom_size_source(&self, assembly: &str) -> Option<&AssemblySource> {
        self.chrom_size_sources.get(assembly)?.iter().next()
    }

    pub fn chrom_size_servers(&self, assembly: &str) -> BTreeSet<&str> {
        self.chrom_size_sources
            .get(assembly)
            .into_iter()
            .flatten()
            .map(|s| s.server.as_str())
            .collect()
    }
}

fn merge_into(
    map: &mut SourceMap,
    server: &str,
    entries: impl IntoIterator<Item = SourceEntry>,
) {
    for entry in entries {
        let source = AssemblySource::from_entry(server, entry);
        map.entry(source.assembly_id.clone())
            .or_default()
            .insert(source);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capability {
    Suggestions,
    ChromSizes,
}

async fn discover_capability(
    backend: &dyn Backend,
    servers: &[String],
    registry: &RwLock<AssemblyRegistry>,
    capability: Capability,
) -> SourceMap {
    let mut requests = servers
        .iter()
        .map(|server| async move {
            let result = match capability {
                Capability::Suggestions => {
                    backend.list_gene_annotation_sources(server).await
                }
                Capability::ChromSizes => {
                    backend.list_chrom_size_sources(server).await
                }
            };
            (server, result)
        })
        .collect::<FuturesUnordered<_>>();

    // merge each response as soon as it arrives
    while let Some((server, result)) = requests.next().await {
        let entries = match result {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("{capability:?} discovery on {server} failed: {err}");
                continue;
            }
        };

        let mut registry = registry.write().await;
        let grew = match capability {
            Capability::Suggestions => {
                registry.merge_suggestion_sources(server, entries)
            }
            Capability::ChromSizes => {
                registry.merge_chrom_size_sources(server, entries)
            }
        };

        if grew {
            log::info!(
                "available assemblies: {:?}",
                registry.available_assemblies()
            );
        }
    }

    let registry = registry.read().await;
    match capability {
        Capability::Suggestions => registry.suggestion_sources().clone(),
        Capability::ChromSizes => registry.chrom_size_sources().clone(),
    }
}

pub async fn discover_suggestion_sources(
    backend: &dyn Backend,
    servers: &[String],
    registry: &RwLock<AssemblyRegistry>,
) -> SourceMap {
    discover_capability(backend, servers, registry, Capability::Suggestions)
        .await
}

/// Returns assembly -> chrom-size servers.
pub async fn discover_chrom_size_sources(
    backend: &dyn Backend,
    servers: &[String],
    registry: &RwLock<AssemblyRegistry>,
) -> BTreeMap<String, BTreeSet<String>> {
    discover_capability(backend, servers, registry, Capability::ChromSizes)
        .await
        .into_iter()
        .map(|(assembly, sources)| {
            let servers = sources.into_iter().map(|s| s.server).collect();
            (assembly, servers)
        })
        .collect()
}

/// Runs both discovery streams concurrently and returns the available
/// assemblies once every server has answered or failed.
pub async fn discover(
    backend: &dyn Backend,
    servers: &[String],
    registry: &RwLock<AssemblyRegistry>,
) -> BTreeSet<String> {
    futures::join!(
        discover_suggestion_sources(backend, servers, registry),
        discover_chrom_size_sources(backend, servers, registry),
    );

    registry.read().await.available_assemblies().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::backend::tests::MockBackend;

    fn entries(list: &[(&str, &str)]) -> Vec<SourceEntry> {
        list.iter()
            .map(|(a, s)| MockBackend::entry(a, s))
            .collect()
    }

    #[test]
    fn intersection_of_capabilities() {
        let mut registry = AssemblyRegistry::default();

        assert!(!registry.merge_suggestion_sources(
            "http://a",
            entries(&[("hg19", "g1"), ("hg38", "g2")])
        ));
        assert!(registry.available_assemblies().is_empty());

        assert!(registry
            .merge_chrom_size_sources("http://b", entries(&[("hg19", "c1")])));
        assert_eq!(
            registry.available_assemblies().iter().collect::<Vec<_>>(),
            ["hg19"]
        );
        assert!(!registry.is_available("hg38"));

        assert_eq!(
            registry.chrom_size_source("hg19"),
            Some(&AssemblySource {
                assembly_id: "hg19".into(),
                server: "http://b".into(),
                source_id: "c1".into(),
            })
        );
        assert_eq!(registry.suggestion_source("hg38").unwrap().source_id, "g2");
    }

    #[test]
    fn merges_accumulate() {
        let mut registry = AssemblyRegistry::default();
        registry.merge_chrom_size_sources("http://a", entries(&[("hg19", "c1")]));
        registry.merge_chrom_size_sources("http://b", entries(&[("hg19", "c2")]));
        registry.merge_chrom_size_sources("http://a", entries(&[("hg19", "c1")]));

        assert_eq!(
            registry.chrom_size_servers("hg19").into_iter().collect::<Vec<_>>(),
            ["http://a", "http://b"]
        );
        assert_eq!(registry.chrom_size_sources()["hg19"].len(), 2);

        registry.merge_suggestion_sources("http://a", entries(&[("hg19", "g")]));
        // an empty response never removes anything
        registry.merge_suggestion_sources("http://b", Vec::new());
        registry.merge_chrom_size_sources("http://b", Vec::new());
        assert!(registry.is_available("hg19"));
    }

    #[tokio::test]
    async fn discovery_across_servers() {
        let mut backend = MockBackend::default();
        backend.gene_sources.insert(
            "http://a".into(),
            entries(&[("hg19", "g19"), ("hg38", "g38")]),
        );
        backend
            .chrom_size_sources
            .insert("http://a".into(), entries(&[("hg19", "c19")]));
        // http://b fails both requests

        let servers = ["http://a", "http://b"].map(String::from);
        let registry = RwLock::new(AssemblyRegistry::default());

        let available = discover(&backend, &servers, &registry).await;
        assert_eq!(available.into_iter().collect::<Vec<_>>(), ["hg19"]);

        let chrom_servers =
            discover_chrom_size_sources(&backend, &servers, &registry).await;
        assert_eq!(
            chrom_servers["hg19"].iter().collect::<Vec<_>>(),
            ["http://a"]
        );

        let genes =
            discover_suggestion_sources(&backend, &servers, &registry).await;
        assert_eq!(genes.keys().collect::<Vec<_>>(), ["hg19", "hg38"]);
    }
}
