use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use tokio::sync::RwLock;

use genopos_core::codec::parse_token;
use genopos_core::genes::{apply_resolutions, replace_token, unresolved_tokens};
use genopos_core::tokens::{tokenize, TokenDiffTracker};
use genopos_core::{CoordSpace, GeneSuggestion, Resolutions};

use crate::backend::Backend;
use crate::config::Config;
use crate::registry::{self, AssemblyRegistry, AssemblySource};
use crate::resolver::{resolve, SourceLookup, SuggestionLookup};
use crate::sync::{ScaleCoupling, ViewTarget, ViewportSync};
use crate::viewport::{ViewDomains, Viewport};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPhase {
    #[default]
    Idle,
    ResolvingGenes,
    ParseFailed,
    Applying,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Applied(ViewTarget),
    ParseFailed,
    /// A later submission or assembly switch replaced this one.
    Superseded,
    NoAssembly,
}

/// Snapshot of everything a front end displays.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchView {
    pub text: String,
    pub loading: bool,
    pub suggestions: Vec<GeneSuggestion>,
    pub assemblies: BTreeSet<String>,
    pub assembly: Option<String>,
    pub phase: SubmitPhase,
}

struct ActiveAssembly {
    id: String,
    sync: Arc<ViewportSync>,
    suggestions: Option<AssemblySource>,
}

struct SearchState {
    text: String,
    loading: bool,
    suggestions: Vec<GeneSuggestion>,
    tracker: TokenDiffTracker,
    // token index the current suggestion list was queried for
    changed_token: Option<usize>,
    phase: SubmitPhase,
    active: Option<ActiveAssembly>,

    assembly_gen: u64,
    edit_gen: u64,
    submit_gen: u64,
}

impl SearchState {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            loading: false,
            suggestions: Vec::new(),
            tracker: TokenDiffTracker::new(text),
            changed_token: None,
            phase: SubmitPhase::Idle,
            active: None,
            assembly_gen: 0,
            edit_gen: 0,
            submit_gen: 0,
        }
    }

    fn set_text(&mut self, text: String) {
        self.tracker.reset(&text);
        self.text = text;
    }

    fn clear_suggestions(&mut self) {
        self.suggestions.clear();
        self.loading = false;
    }
}

/// The search box controller: owns the text, keeps it in step with the
/// viewport, and drives autocomplete, gene resolution and submission.
///
/// State lives behind an async `RwLock` that is never held across an
/// await; every async continuation checks the generation it was
/// dispatched under and is dropped if something newer has happened.
pub struct SearchBox {
    backend: Arc<dyn Backend>,
    viewport: Arc<dyn Viewport>,

    servers: Vec<String>,
    two_d: bool,
    coupling: ScaleCoupling,
    margin: f64,

    registry: RwLock<AssemblyRegistry>,
    state: RwLock<SearchState>,
}

impl SearchBox {
    pub fn new(
        backend: Arc<dyn Backend>,
        viewport: Arc<dyn Viewport>,
        config: &Config,
    ) -> Self {
        Self {
            backend,
            viewport,
            servers: config.servers.clone(),
            two_d: config.two_d,
            coupling: config.coupling,
            margin: config.margin,
            registry: RwLock::new(AssemblyRegistry::default()),
            state: RwLock::new(SearchState::new(&config.initial_text)),
        }
    }

    pub fn viewport(&self) -> &Arc<dyn Viewport> {
        &self.viewport
    }

    /// Queries every server for both source kinds and returns the
    /// assemblies available so far.
    pub async fn discover(&self) -> BTreeSet<String> {
        registry::discover(self.backend.as_ref(), &self.servers, &self.registry)
            .await
    }

    pub async fn view(&self) -> SearchView {
        let assemblies =
            self.registry.read().await.available_assemblies().clone();
        let state = self.state.read().await;

        SearchView {
            text: state.text.clone(),
            loading: state.loading,
            suggestions: state.suggestions.clone(),
            assemblies,
            assembly: state.active.as_ref().map(|a| a.id.clone()),
            phase: state.phase,
        }
    }

    pub async fn space(&self) -> Option<Arc<CoordSpace>> {
        let state = self.state.read().await;
        state.active.as_ref().map(|a| a.sync.space().clone())
    }

    /// Fetches the chromosome sizes for `assembly` and makes it active.
    ///
    /// Returns `Ok(None)` if another selection was made while the sizes
    /// were loading. On error the previous assembly stays active.
    pub async fn on_assembly_selected(
        &self,
        assembly: &str,
    ) -> Result<Option<Arc<CoordSpace>>> {
        let (chrom_source, suggestion_source) = {
            let registry = self.registry.read().await;
            if !registry.is_available(assembly) {
                anyhow::bail!("assembly `{assembly}` is not available");
            }
            let chrom_source =
                registry.chrom_size_source(assembly).cloned().with_context(
                    || format!("no chrom-size source for {assembly}"),
                )?;
            (chrom_source, registry.suggestion_source(assembly).cloned())
        };

        // a selection that cannot even start does not cancel one in flight
        let generation = {
            let mut state = self.state.write().await;
            state.assembly_gen += 1;
            state.assembly_gen
        };

        let chroms = self
            .backend
            .fetch_chrom_sizes(&chrom_source.server, &chrom_source.source_id)
            .await
            .with_context(|| {
                format!("fetching chrom sizes for {assembly}")
            })?;

        let space = Arc::new(CoordSpace::build(chroms)?);

        let mut state = self.state.write().await;

        if state.assembly_gen != generation {
            log::debug!("discarding stale chrom sizes for {assembly}");
            return Ok(None);
        }

        let sync = Arc::new(ViewportSync::new(
            space.clone(),
            self.viewport.clone(),
            self.two_d,
            self.coupling,
        ));

        if let Some(text) = sync.current_text() {
            state.set_text(text);
        }

        // in-flight lookups and submissions belong to the old space
        state.edit_gen += 1;
        state.submit_gen += 1;
        state.clear_suggestions();
        state.changed_token = None;
        state.phase = SubmitPhase::Idle;

        state.active = Some(ActiveAssembly {
            id: assembly.to_string(),
            sync,
            suggestions: suggestion_source,
        });

        log::info!(
            "activated {assembly} ({} chromosomes, {} bp)",
            space.chrom_count(),
            space.total_len()
        );

        Ok(Some(space))
    }

    /// Regenerates the text from the viewport's domains.
    pub async fn on_viewport_changed(&self, domains: ViewDomains) {
        let mut state = self.state.write().await;

        let Some(active) = state.active.as_ref() else {
            return;
        };

        if let Some(text) = active.sync.text_for_domains(domains) {
            state.set_text(text);
        }
    }

    /// Applies the latest of any pending viewport notifications and
    /// returns how many were pending.
    pub async fn drain_viewport_events(
        &self,
        events: &Receiver<ViewDomains>,
    ) -> usize {
        let mut count = 0;
        let mut latest = None;

        for domains in events.try_iter() {
            count += 1;
            latest = Some(domains);
        }

        if let Some(domains) = latest {
            self.on_viewport_changed(domains).await;
        }

        count
    }

    /// Updates the text and fetches autocomplete suggestions for the one
    /// token that changed.
    pub async fn on_user_edit(&self, text: &str) {
        let (generation, token, lookup) = {
            let mut state = self.state.write().await;

            state.text = text.to_string();
            state.edit_gen += 1;
            if state.phase == SubmitPhase::ParseFailed {
                state.phase = SubmitPhase::Idle;
            }

            let changed = state.tracker.update(text);
            state.changed_token = changed;

            let Some(index) = changed else {
                state.loading = false;
                return;
            };

            let token = tokenize(text)
                .get(index)
                .map(|t| t.to_string())
                .unwrap_or_default();

            let source = state.active.as_ref().and_then(|active| {
                let space = active.sync.space();
                let queryable = !token.is_empty()
                    && token != "and"
                    && parse_token(&token, space).is_unresolved();
                queryable.then(|| active.suggestions.clone()).flatten()
            });

            let Some(source) = source else {
                state.clear_suggestions();
                return;
            };

            state.loading = true;

            let lookup = SourceLookup::new(self.backend.clone(), source);
            (state.edit_gen, token, lookup)
        };

        let result = lookup.lookup(&token).await;

        let mut state = self.state.write().await;

        if state.edit_gen != generation {
            log::debug!("discarding stale suggestions for `{token}`");
            return;
        }

        state.loading = false;

        match result {
            Ok(suggestions) => state.suggestions = suggestions,
            Err(err) => {
                log::warn!("suggestions for `{token}` failed: {err}");
                state.suggestions.clear();
            }
        }
    }

    /// Replaces the token the suggestions were queried for with the
    /// chosen gene's name.
    pub async fn on_suggestion_selected(&self, suggestion: &GeneSuggestion) {
        let mut state = self.state.write().await;

        let Some(index) = state.changed_token.take() else {
            return;
        };

        let text = replace_token(&state.text, index, &suggestion.gene_name);
        state.set_text(text);
        state.edit_gen += 1;
        state.clear_suggestions();
    }

    /// Resolves gene names in the text, parses it and moves the viewport.
    pub async fn on_user_submit(&self) -> SubmitOutcome {
        let (generation, text, sync, lookup) = {
            let mut state = self.state.write().await;

            state.edit_gen += 1;
            state.clear_suggestions();
            state.changed_token = None;

            let Some(active) = state.active.as_ref() else {
                log::debug!("submit without an active assembly");
                return SubmitOutcome::NoAssembly;
            };

            let sync = active.sync.clone();
            let lookup = active
                .suggestions
                .clone()
                .map(|source| SourceLookup::new(self.backend.clone(), source));

            state.submit_gen += 1;
            state.phase = SubmitPhase::ResolvingGenes;

            (state.submit_gen, state.text.clone(), sync, lookup)
        };

        let tokens = unresolved_tokens(&text, sync.space());

        let resolutions = match lookup {
            Some(lookup) if !tokens.is_empty() => resolve(tokens, &lookup).await,
            _ => Resolutions::new(),
        };

        let mut state = self.state.write().await;

        if state.submit_gen != generation {
            log::debug!("discarding stale submission of `{text}`");
            return SubmitOutcome::Superseded;
        }

        // the text may have been edited while genes were resolving
        let text = apply_resolutions(&state.text, &resolutions, self.margin);
        state.set_text(text.clone());

        let target = sync
            .parse(&text)
            .and_then(|expr| sync.target_for(&expr));

        let target = match target {
            Ok(target) => target,
            Err(err) => {
                log::debug!("not applying `{text}`: {err}");
                state.phase = SubmitPhase::ParseFailed;
                return SubmitOutcome::ParseFailed;
            }
        };

        state.phase = SubmitPhase::Applying;
        sync.push(target);
        state.phase = SubmitPhase::Idle;

        SubmitOutcome::Applied(target)
    }
}
