//! Bundled community application: a route table, components, and an in-memory
//! schema wired into the server renderer.

pub mod components;
pub mod data;
pub mod schema;

use std::sync::Arc;

use crate::application::data::{CacheOptions, DataClientFactory, LoaderFactory, PossibleTypes};
use crate::application::failure::FailureReporter;
use crate::application::render::{RenderDriver, Routes};
use crate::application::response::ResponseAssembler;
use crate::application::ssr::ServerRenderer;

use components::{LegacyThread, NewThread, NotFound, ThreadList, ThreadView};
use data::InMemoryStore;
use schema::CommunitySchema;

/// Introspection payload published by the schema for fragment matching.
pub const INTROSPECTION: &str = r#"{
  "__schema": {
    "types": [
      {
        "kind": "INTERFACE",
        "name": "Node",
        "possibleTypes": [{"name": "Thread"}, {"name": "Message"}, {"name": "User"}]
      },
      {"kind": "OBJECT", "name": "Thread", "possibleTypes": null},
      {"kind": "OBJECT", "name": "Message", "possibleTypes": null},
      {"kind": "OBJECT", "name": "User", "possibleTypes": null}
    ]
  }
}"#;

pub fn routes() -> Routes {
    Routes::new(NotFound)
        .route("/", ThreadList)
        .route("/thread/{id}", ThreadView)
        .route("/t/{id}", LegacyThread)
        .route("/new", NewThread)
}

pub fn possible_types() -> PossibleTypes {
    PossibleTypes::from_json(INTROSPECTION).unwrap_or_default()
}

pub fn cache_options() -> CacheOptions {
    CacheOptions::default()
}

pub fn clients() -> DataClientFactory {
    DataClientFactory::new(
        Arc::new(CommunitySchema),
        LoaderFactory::new(Arc::new(InMemoryStore::seeded())),
        cache_options(),
        possible_types(),
    )
}

/// Server renderer for the community app.
pub fn renderer(
    driver: RenderDriver,
    assembler: ResponseAssembler,
    failures: FailureReporter,
) -> ServerRenderer {
    ServerRenderer::new(clients(), Arc::new(routes()), driver, assembler, failures)
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;
    use crate::application::render::{MarkupStream, RenderOutcome, RenderOutput, RenderScope};
    use crate::application::state::initialize_store;
    use crate::domain::request::{CurrentUser, Location};

    fn scope(url: &str, user: Option<CurrentUser>) -> RenderScope {
        let location = Location::new("localhost", url);
        RenderScope {
            client: clients().create(user.clone()),
            state: initialize_store(&location.query),
            location,
            user,
        }
    }

    async fn render(url: &str, user: Option<CurrentUser>) -> RenderOutcome {
        RenderDriver::default()
            .render(&routes(), scope(url, user))
            .await
            .expect("render succeeds")
    }

    fn rendered(outcome: RenderOutcome) -> RenderOutput {
        match outcome {
            RenderOutcome::Rendered(output) => output,
            RenderOutcome::Redirect { location, .. } => panic!("unexpected redirect to {location}"),
        }
    }

    async fn collect(markup: MarkupStream) -> String {
        let chunks: Vec<_> = markup.collect().await;
        chunks
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect()
    }

    #[test]
    fn introspection_groups_concrete_types_under_node() {
        let types = possible_types();
        assert!(types.matches("Thread", "Node"));
        assert!(types.matches("User", "Node"));
        assert!(!types.matches("Thread", "User"));
    }

    #[tokio::test]
    async fn thread_list_highlights_the_active_thread() {
        let output = rendered(render("/?t=2", None).await);
        let html = collect(output.markup).await;

        assert!(
            html.contains(r#"<li class="thread active"><a href="/thread/2">Release planning</a>"#)
        );
        assert!(html.contains(r#"<li class="thread"><a href="/thread/1">"#));
        assert_eq!(output.state["dashboardFeed"]["activeThread"], json!("2"));
        assert_eq!(output.head.title_text(), Some("Threads · Community"));
    }

    #[tokio::test]
    async fn thread_view_resolves_lazy_message_list() {
        let output = rendered(render("/thread/1", None).await);

        assert_eq!(output.passes, 3);
        assert_eq!(output.modules, vec![components::THREAD_MESSAGES_MODULE.to_string()]);
        assert!(output.data["Message:m2"].is_object());

        let html = collect(output.markup).await;
        assert!(html.contains("<h1>Welcome to the community</h1>"));
        assert!(html.contains("Say hello here."));
        assert!(!html.contains("Loading"));
    }

    #[tokio::test]
    async fn unknown_thread_renders_not_found() {
        let output = rendered(render("/thread/404", None).await);

        assert!(output.modules.is_empty());
        assert!(collect(output.markup).await.contains("Page not found"));
    }

    #[tokio::test]
    async fn legacy_links_redirect() {
        match render("/t/2", None).await {
            RenderOutcome::Redirect { location, .. } => assert_eq!(location, "/thread/2"),
            RenderOutcome::Rendered(_) => panic!("expected redirect"),
        }
    }

    #[tokio::test]
    async fn composer_requires_a_viewer() {
        assert!(matches!(
            render("/new", None).await,
            RenderOutcome::Redirect { ref location, .. } if location == "/"
        ));

        let output = rendered(render("/new", Some(CurrentUser::new("u1"))).await);
        assert!(collect(output.markup).await.contains("<form"));
    }

    #[tokio::test]
    async fn signed_in_viewer_is_greeted() {
        let output = rendered(render("/", Some(CurrentUser::new("u2"))).await);

        assert!(collect(output.markup).await.contains("Signed in as grace"));
    }
}
