//! Component tree of the community app.

use serde_json::Value;

use crate::application::data::QueryRequest;
use crate::application::render::{Component, Node, Redirect, RenderContext, RenderError, el};
use crate::application::state::ACTIVE_THREAD_PATH;

use super::schema::{THREAD_BY_ID, THREAD_MESSAGES, THREADS, VIEWER};

pub const THREAD_MESSAGES_MODULE: &str = "ThreadMessages";
const SITE_NAME: &str = "Community";

fn loading() -> Node {
    el("p").class("loading").child("Loading…").into()
}

fn page_title(cx: &mut RenderContext<'_>, title: &str) {
    cx.head()
        .title(format!("{title} · {SITE_NAME}"))
        .property("og:title", title)
        .property("og:site_name", SITE_NAME);
}

fn str_field<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or_default()
}

/// `/`: every thread, with the one named by `?t=` highlighted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadList;

impl Component for ThreadList {
    fn name(&self) -> &str {
        "ThreadList"
    }

    fn render(&self, cx: &mut RenderContext<'_>) -> Result<Node, RenderError> {
        page_title(cx, "Threads");
        cx.head().meta("description", "Recent community threads");
        cx.style(".threads{list-style:none;padding:0}");
        cx.style(".thread.active{font-weight:bold}");

        let Some(data) = cx.query(QueryRequest::new(THREADS)) else {
            return Ok(loading());
        };
        let threads = data[THREADS]
            .as_array()
            .ok_or_else(|| RenderError::component(self.name(), "threads is not a list"))?;
        let active = cx.state().get_str(ACTIVE_THREAD_PATH).unwrap_or_default();

        let items = threads.iter().map(|thread| {
            let id = str_field(thread, "id");
            let class = if !active.is_empty() && id == active {
                "thread active"
            } else {
                "thread"
            };
            let count = thread["messageCount"].as_u64().unwrap_or_default();
            el("li")
                .class(class)
                .child(
                    el("a")
                        .attr("href", format!("/thread/{id}"))
                        .child(str_field(thread, "title")),
                )
                .child(el("span").class("count").child(count.to_string()))
                .into()
        });

        Ok(Node::fragment([
            Node::component(ViewerBar),
            el("h1").child("Threads").into(),
            el("ul").class("threads").children(items).into(),
        ]))
    }
}

/// Greets the signed-in viewer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewerBar;

impl Component for ViewerBar {
    fn name(&self) -> &str {
        "ViewerBar"
    }

    fn render(&self, cx: &mut RenderContext<'_>) -> Result<Node, RenderError> {
        if cx.user().is_none() {
            return Ok(el("nav")
                .class("viewer")
                .child(el("a").attr("href", "/login").child("Sign in"))
                .into());
        }
        let Some(data) = cx.query(QueryRequest::new(VIEWER)) else {
            return Ok(Node::Empty);
        };
        let username = str_field(&data[VIEWER], "username");
        Ok(el("nav")
            .class("viewer")
            .child(format!("Signed in as {username}"))
            .into())
    }
}

/// `/thread/{id}`: the thread header plus its lazily loaded message list.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadView;

impl Component for ThreadView {
    fn name(&self) -> &str {
        "ThreadView"
    }

    fn render(&self, cx: &mut RenderContext<'_>) -> Result<Node, RenderError> {
        let id = cx
            .params()
            .get("id")
            .ok_or_else(|| RenderError::component(self.name(), "route is missing `id`"))?
            .to_string();

        let Some(data) = cx.query(QueryRequest::new(THREAD_BY_ID).var("id", id.clone())) else {
            return Ok(loading());
        };
        let thread = &data[THREAD_BY_ID];
        if thread.is_null() {
            return Ok(Node::component(NotFound));
        }

        let title = str_field(thread, "title").to_string();
        page_title(cx, &title);
        cx.style(".thread-header h1{margin:0}");

        let author = str_field(&thread["author"], "username");
        Ok(Node::fragment([
            el("header")
                .class("thread-header")
                .child(el("h1").child(title))
                .child(el("p").class("author").child(format!("Started by {author}")))
                .into(),
            Node::lazy(THREAD_MESSAGES_MODULE, ThreadMessages { thread_id: id }),
        ]))
    }
}

/// Messages of one thread. Only queried once the thread itself has loaded.
#[derive(Debug, Clone)]
pub struct ThreadMessages {
    pub thread_id: String,
}

impl Component for ThreadMessages {
    fn name(&self) -> &str {
        "ThreadMessages"
    }

    fn render(&self, cx: &mut RenderContext<'_>) -> Result<Node, RenderError> {
        cx.style(".messages{padding:0}");
        let request = QueryRequest::new(THREAD_MESSAGES).var("threadId", self.thread_id.clone());
        let Some(data) = cx.query(request) else {
            return Ok(loading());
        };
        let messages = data[THREAD_MESSAGES].as_array().cloned().unwrap_or_default();
        if messages.is_empty() {
            return Ok(el("p").class("empty").child("No messages yet.").into());
        }

        let items = messages.iter().map(|message| {
            let mut item = el("li")
                .class("message")
                .attr("id", format!("message-{}", str_field(message, "id")))
                .child(el("strong").child(str_field(&message["author"], "username")))
                .child(el("p").child(str_field(message, "body")));
            if let Some(url) = message["attachmentUrl"].as_str() {
                item = item.child(el("a").attr("href", url).child("Attachment"));
            }
            item.into()
        });
        Ok(el("ul").class("messages").children(items).into())
    }
}

/// `/new`: composer for signed-in viewers; everyone else goes home.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewThread;

impl Component for NewThread {
    fn name(&self) -> &str {
        "NewThread"
    }

    fn render(&self, cx: &mut RenderContext<'_>) -> Result<Node, RenderError> {
        if cx.user().is_none() {
            return Ok(Node::component(Redirect::to("/")));
        }
        page_title(cx, "New thread");
        Ok(el("form")
            .attr("method", "post")
            .attr("action", "/new")
            .child(el("input").attr("name", "title").attr("placeholder", "Title"))
            .child(el("textarea").attr("name", "body").child(""))
            .child(el("button").attr("type", "submit").child("Post"))
            .into())
    }
}

/// `/t/{id}`: old short links.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyThread;

impl Component for LegacyThread {
    fn name(&self) -> &str {
        "LegacyThread"
    }

    fn render(&self, cx: &mut RenderContext<'_>) -> Result<Node, RenderError> {
        let id = cx.params().get("id").unwrap_or_default().to_string();
        cx.redirect(format!("/thread/{id}"));
        Ok(Node::Empty)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

impl Component for NotFound {
    fn name(&self) -> &str {
        "NotFound"
    }

    fn render(&self, cx: &mut RenderContext<'_>) -> Result<Node, RenderError> {
        page_title(cx, "Not found");
        cx.head().meta("robots", "noindex");
        Ok(el("h1").child("Page not found").into())
    }
}
