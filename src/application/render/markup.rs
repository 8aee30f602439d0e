use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use futures::stream::{self, BoxStream, StreamExt};

use super::StyleSheet;

/// Settled markup as a one-shot byte stream: the collected `<style>` block
/// first, then one chunk per top-level node.
pub struct MarkupStream {
    inner: BoxStream<'static, Bytes>,
    len: usize,
}

impl MarkupStream {
    pub fn new(styles: &StyleSheet, chunks: Vec<String>) -> Self {
        let style_tag = styles.to_style_tag();
        let mut parts = Vec::with_capacity(chunks.len() + 1);
        if !style_tag.is_empty() {
            parts.push(Bytes::from(style_tag));
        }
        parts.extend(
            chunks
                .into_iter()
                .filter(|chunk| !chunk.is_empty())
                .map(Bytes::from),
        );
        let len = parts.iter().map(Bytes::len).sum();

        Self {
            inner: stream::iter(parts).boxed(),
            len,
        }
    }

    /// Total byte length of the markup.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Stream for MarkupStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for MarkupStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkupStream").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn styles_lead_the_markup() {
        let mut styles = StyleSheet::new();
        styles.add(".a{}");
        let stream = MarkupStream::new(
            &styles,
            vec!["<p>1</p>".into(), String::new(), "<p>2</p>".into()],
        );

        let chunks: Vec<Bytes> = stream.collect().await;
        assert_eq!(
            chunks,
            vec![
                Bytes::from("<style data-trellis>.a{}</style>"),
                Bytes::from("<p>1</p>"),
                Bytes::from("<p>2</p>"),
            ]
        );
    }

    #[tokio::test]
    async fn no_styles_means_no_style_chunk() {
        let stream = MarkupStream::new(&StyleSheet::new(), vec!["<main></main>".into()]);
        assert_eq!(stream.len(), 13);
        let chunks: Vec<Bytes> = stream.collect().await;
        assert_eq!(chunks.len(), 1);
    }
}
