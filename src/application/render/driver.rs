//! Fixed-point render loop.
//!
//! Every pass renders the whole tree from the root. Queries without a cached
//! result are collected, fetched together, and written to the cache; the next
//! pass then sees them and may reveal further queries deeper in the tree. The
//! loop ends on the first pass that asks for nothing new.

use std::num::NonZeroU32;

use futures::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use crate::application::data::DataClient;
use crate::domain::request::{CurrentUser, Location};
use crate::domain::state::StateStore;

use super::context::{PassOutput, RenderContext};
use super::node::write_node;
use super::router::MatchedRoute;
use super::{HeadTags, MarkupStream, RenderError, Routes};

pub const DEFAULT_MAX_PASSES: u32 = 32;

/// Request-scoped inputs moved into the driver for one render.
pub struct RenderScope {
    pub client: DataClient,
    pub state: StateStore,
    pub location: Location,
    pub user: Option<CurrentUser>,
}

#[derive(Debug)]
pub enum RenderOutcome {
    Redirect { location: String, passes: u32 },
    Rendered(RenderOutput),
}

/// Settled render, ready for the response assembler.
#[derive(Debug)]
pub struct RenderOutput {
    pub markup: MarkupStream,
    /// Final state-store tree.
    pub state: Value,
    /// Data-client snapshot.
    pub data: Value,
    /// Lazy modules touched, in first-touch order with repeats.
    pub modules: Vec<String>,
    pub head: HeadTags,
    pub passes: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderDriver {
    max_passes: NonZeroU32,
}

impl Default for RenderDriver {
    fn default() -> Self {
        Self::new(NonZeroU32::new(DEFAULT_MAX_PASSES).unwrap_or(NonZeroU32::MIN))
    }
}

impl RenderDriver {
    pub fn new(max_passes: NonZeroU32) -> Self {
        Self { max_passes }
    }

    pub fn max_passes(&self) -> u32 {
        self.max_passes.get()
    }

    pub async fn render(
        &self,
        routes: &Routes,
        scope: RenderScope,
    ) -> Result<RenderOutcome, RenderError> {
        let RenderScope {
            mut client,
            mut state,
            location,
            user,
        } = scope;
        let matched = routes.resolve(&location.path);
        let mut redirect: Option<String> = None;

        for pass in 1..=self.max_passes.get() {
            let output = render_pass(&matched, &client, &mut state, &location, user.as_ref())?;
            if redirect.is_none() {
                redirect = output.redirect.clone();
            }

            if output.pending.is_empty() {
                debug!(
                    target = "trellis::render",
                    path = %location.path,
                    passes = pass,
                    redirect = redirect.as_deref().unwrap_or(""),
                    "render settled"
                );
                if let Some(location) = redirect {
                    return Ok(RenderOutcome::Redirect {
                        location,
                        passes: pass,
                    });
                }
                return Ok(RenderOutcome::Rendered(RenderOutput {
                    markup: MarkupStream::new(&output.styles, output.chunks),
                    state: state.into_snapshot(),
                    data: client.extract(),
                    modules: output.modules,
                    head: output.head,
                    passes: pass,
                }));
            }

            debug!(
                target = "trellis::render",
                pass,
                pending = output.pending.len(),
                "fetching pending queries"
            );
            let results =
                try_join_all(output.pending.iter().map(|request| client.execute(request))).await?;
            for (request, data) in output.pending.iter().zip(&results) {
                client.write(request, data);
            }
        }

        Err(RenderError::Unsettled {
            passes: self.max_passes.get(),
        })
    }
}

fn render_pass(
    matched: &MatchedRoute,
    client: &DataClient,
    state: &mut StateStore,
    location: &Location,
    user: Option<&CurrentUser>,
) -> Result<PassOutput, RenderError> {
    let mut cx = RenderContext::new(client, state, location, &matched.params, user);
    let root = matched.component.render(&mut cx)?;

    let mut chunks = Vec::new();
    for node in root.into_top_level() {
        let mut chunk = String::new();
        write_node(&node, &mut cx, &mut chunk)?;
        chunks.push(chunk);
    }
    Ok(cx.finish(chunks))
}
