//! Per-pass render context and the side outputs it collects.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::application::data::{DataClient, QueryRequest};
use crate::domain::request::{CurrentUser, Location};
use crate::domain::state::StateStore;

use super::{HeadTags, RouteParams, StyleSheet};

/// Everything a component may reach during one render pass: the data client,
/// the state store, the document head, the router location and the lazy-module
/// and style collectors.
pub struct RenderContext<'a> {
    client: &'a DataClient,
    state: &'a mut StateStore,
    location: &'a Location,
    params: &'a RouteParams,
    user: Option<&'a CurrentUser>,
    pending: BTreeMap<String, QueryRequest>,
    styles: StyleSheet,
    modules: Vec<String>,
    head: HeadTags,
    redirect: Option<String>,
}

/// What a single pass produced. Nothing here is shared with the next pass.
#[derive(Debug, Default)]
pub struct PassOutput {
    pub chunks: Vec<String>,
    /// Distinct requests that had no cached result, in cache-key order.
    pub pending: Vec<QueryRequest>,
    pub styles: StyleSheet,
    /// Lazy modules in first-touch order; repeats are kept.
    pub modules: Vec<String>,
    pub head: HeadTags,
    pub redirect: Option<String>,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        client: &'a DataClient,
        state: &'a mut StateStore,
        location: &'a Location,
        params: &'a RouteParams,
        user: Option<&'a CurrentUser>,
    ) -> Self {
        Self {
            client,
            state,
            location,
            params,
            user,
            pending: BTreeMap::new(),
            styles: StyleSheet::new(),
            modules: Vec::new(),
            head: HeadTags::new(),
            redirect: None,
        }
    }

    /// Cached result of `request`. A miss registers the request for the next
    /// fetch batch and returns `None`; the component should render its
    /// loading state and will be rendered again once the data is in.
    pub fn query(&mut self, request: QueryRequest) -> Option<Value> {
        if let Some(data) = self.client.read(&request) {
            return Some(data);
        }
        self.pending.entry(request.cache_key()).or_insert(request);
        None
    }

    pub fn state(&self) -> &StateStore {
        self.state
    }

    pub fn state_mut(&mut self) -> &mut StateStore {
        self.state
    }

    pub fn head(&mut self) -> &mut HeadTags {
        &mut self.head
    }

    pub fn style(&mut self, rule: impl Into<String>) {
        self.styles.add(rule);
    }

    pub fn location(&self) -> &Location {
        self.location
    }

    pub fn params(&self) -> &RouteParams {
        self.params
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.user
    }

    /// Ask the router to send the client to `target`. The first target wins.
    pub fn redirect(&mut self, target: impl Into<String>) {
        if self.redirect.is_none() {
            self.redirect = Some(target.into());
        }
    }

    pub(crate) fn record_module(&mut self, module: &str) {
        self.modules.push(module.to_string());
    }

    pub(crate) fn finish(self, chunks: Vec<String>) -> PassOutput {
        PassOutput {
            chunks,
            pending: self.pending.into_values().collect(),
            styles: self.styles,
            modules: self.modules,
            head: self.head,
            redirect: self.redirect,
        }
    }
}
