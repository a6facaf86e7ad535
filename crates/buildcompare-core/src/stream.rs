use std::time::Duration;

use futures::stream::{self, Stream};

/// Chunking of an answer for progressive delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Characters per chunk, never splitting a character.
    pub chunk_chars: usize,
    /// Pause between consecutive chunks.
    pub delay: Duration,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 12,
            delay: Duration::from_millis(15),
        }
    }
}

struct ChunkState {
    text: String,
    offset: usize,
    started: bool,
}

/// Lazy, finite stream of `text` in fixed-size chunks with a delay between them.
///
/// Nothing is emitted until polled. Dropping the stream cancels any pending delay.
pub fn chunk_stream(text: String, config: ChunkConfig) -> impl Stream<Item = String> + Send {
    let chunk_chars = config.chunk_chars.max(1);
    let state = ChunkState {
        text,
        offset: 0,
        started: false,
    };

    stream::unfold(state, move |mut state| async move {
        if state.offset >= state.text.len() {
            return None;
        }
        if state.started && !config.delay.is_zero() {
            tokio::time::sleep(config.delay).await;
        }
        state.started = true;

        let rest = &state.text[state.offset..];
        let end = rest
            .char_indices()
            .nth(chunk_chars)
            .map_or(rest.len(), |(index, _)| index);
        let chunk = rest[..end].to_owned();
        state.offset += end;
        Some((chunk, state))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn reassembles_original_text() {
        let text = String::from("Howzit! Use 42.5N cement for the slab.");
        let chunks: Vec<String> = chunk_stream(
            text.clone(),
            ChunkConfig {
                chunk_chars: 12,
                delay: Duration::ZERO,
            },
        )
        .collect()
        .await;

        assert_eq!(chunks.len(), 4);
        assert!(chunks[..3].iter().all(|chunk| chunk.chars().count() == 12));
        assert_eq!(chunks.concat(), text);
    }

    #[tokio::test]
    async fn multibyte_characters_are_never_split() {
        let text = String::from("R1 500 → ✓ Sawubona 🧱🧱🧱");
        let chunks: Vec<String> = chunk_stream(
            text.clone(),
            ChunkConfig {
                chunk_chars: 3,
                delay: Duration::ZERO,
            },
        )
        .collect()
        .await;

        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 3));
        assert_eq!(chunks.concat(), text);
    }

    #[tokio::test]
    async fn empty_text_yields_nothing() {
        let chunks: Vec<String> = chunk_stream(String::new(), ChunkConfig::default())
            .collect()
            .await;
        assert!(chunks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied_between_chunks_only() {
        let started = tokio::time::Instant::now();
        let chunks: Vec<String> = chunk_stream(String::from("abcdefghij"), ChunkConfig {
            chunk_chars: 4,
            delay: Duration::from_millis(15),
        })
        .collect()
        .await;

        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(started.elapsed() < Duration::from_millis(45));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_stream_stops_emission() {
        let mut stream = Box::pin(chunk_stream(
            String::from("one two three four five"),
            ChunkConfig {
                chunk_chars: 4,
                delay: Duration::from_secs(1),
            },
        ));

        assert_eq!(stream.next().await.as_deref(), Some("one "));
        let pending = tokio::time::timeout(Duration::from_millis(10), stream.next()).await;
        assert!(pending.is_err());
        drop(stream);
    }
}
