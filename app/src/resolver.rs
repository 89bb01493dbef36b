use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use genopos_core::genes::best_suggestion;
use genopos_core::{GeneSuggestion, Resolutions};

use crate::backend::Backend;
use crate::registry::AssemblySource;

#[async_trait]
pub trait SuggestionLookup: Send + Sync {
    async fn lookup(&self, token: &str) -> Result<Vec<GeneSuggestion>>;
}

/// Looks tokens up in one suggestion source on one server.
pub struct SourceLookup {
    backend: Arc<dyn Backend>,
    source: AssemblySource,
}

impl SourceLookup {
    pub fn new(backend: Arc<dyn Backend>, source: AssemblySource) -> Self {
        Self { backend, source }
    }
}

#[async_trait]
impl SuggestionLookup for SourceLookup {
    async fn lookup(&self, token: &str) -> Result<Vec<GeneSuggestion>> {
        self.backend
            .fetch_suggestions(
                &self.source.server,
                &self.source.source_id,
                token,
            )
            .await
    }
}

/// Issues one lookup per distinct non-empty token and waits for every
/// one of them to settle before returning.
///
/// Tokens whose lookup fails or comes back empty are left out of the
/// result; that is not an error for the whole batch.
pub async fn resolve<L>(
    tokens: impl IntoIterator<Item = String>,
    lookup: &L,
) -> Resolutions
where
    L: SuggestionLookup + ?Sized,
{
    let tokens = tokens
        .into_iter()
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect::<BTreeSet<_>>();

    let requests = tokens.iter().map(|token| async move {
        let result = lookup.lookup(token).await;
        (token, result)
    });

    let results = futures::future::join_all(requests).await;

    let mut resolutions = Resolutions::new();

    for (token, result) in results {
        match result {
            Ok(candidates) => {
                if let Some(best) = best_suggestion(token, &candidates) {
                    resolutions.insert(token.clone(), best.clone());
                } else {
                    log::debug!("no gene suggestions for `{token}`");
                }
            }
            Err(err) => {
                log::warn!("gene lookup for `{token}` failed: {err}");
            }
        }
    }

    resolutions
}
