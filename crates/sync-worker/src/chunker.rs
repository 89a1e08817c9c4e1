//! Transcript chunking
//!
//! Splits transcript text into bounded, overlapping segments for
//! embedding. This is a pure function of its inputs: identical text
//! and segment lists always produce identical chunk boundaries, which
//! the idempotent vector-store upsert depends on.
//!
//! Two paths:
//! - timed segments from the source are accumulated into chunks until
//!   the character budget would overflow, carrying start/end
//!   timestamps and the dominant speaker label;
//! - flat text falls back to a sliding character window that prefers
//!   sentence boundaries over hard cuts, with null timing.

use std::collections::{BTreeMap, VecDeque};

/// Configuration for transcript chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub max_chars: usize,
    /// Overlap between consecutive chunks in characters
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 800,
            overlap_chars: 100,
        }
    }
}

/// A timed transcript segment from source segmentation
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSegment {
    pub text: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub speaker: Option<String>,
}

/// A chunk ready for embedding and upsert
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptChunk {
    /// Index of this chunk in the transcript
    pub index: i32,
    pub content: String,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub speaker: Option<String>,
}

/// Chunk a transcript. Timed segments take the accumulation path;
/// flat text takes the character window.
pub fn chunk_transcript(
    text: &str,
    segments: &[TimedSegment],
    config: &ChunkingConfig,
) -> Vec<TranscriptChunk> {
    let usable: Vec<&TimedSegment> = segments
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .collect();

    if usable.is_empty() {
        chunk_flat(text, config)
    } else {
        chunk_timed(&usable, config)
    }
}

/// Sliding character window with sentence-boundary preference. The
/// window advances by `end - overlap`, so consecutive chunks share
/// exactly the overlap unless a boundary shortened the window.
fn chunk_flat(text: &str, config: &ChunkingConfig) -> Vec<TranscriptChunk> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }

    let max = config.max_chars.max(1);
    let overlap = config.overlap_chars.min(max.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + max).min(total);
        let end = if hard_end < total {
            sentence_break(&chars[start..hard_end])
                .map(|rel| start + rel)
                .unwrap_or(hard_end)
        } else {
            hard_end
        };

        chunks.push(TranscriptChunk {
            index: chunks.len() as i32,
            content: chars[start..end].iter().collect(),
            start_time: None,
            end_time: None,
            speaker: None,
        });

        if end >= total {
            break;
        }

        // Progress is guaranteed: end - start >= 80% of max > overlap
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Find a sentence boundary in the last 20% of the window. Returns the
/// position just past the terminator and its trailing whitespace.
fn sentence_break(window: &[char]) -> Option<usize> {
    let len = window.len();
    let search_start = (len as f64 * 0.8) as usize;

    let mut best = None;
    for i in search_start..len.saturating_sub(1) {
        if matches!(window[i], '.' | '!' | '?') && window[i + 1].is_whitespace() {
            best = Some(i + 2);
        }
    }
    best
}

/// Joined length of segments separated by single spaces
fn joined_len(segments: &[&TimedSegment]) -> usize {
    if segments.is_empty() {
        0
    } else {
        segments.iter().map(|s| s.text.chars().count()).sum::<usize>() + segments.len() - 1
    }
}

/// Accumulate timed segments into chunks under the character budget,
/// carrying trailing segments forward as overlap
fn chunk_timed(segments: &[&TimedSegment], config: &ChunkingConfig) -> Vec<TranscriptChunk> {
    let max = config.max_chars.max(1);
    let overlap = config.overlap_chars.min(max.saturating_sub(1));

    let mut chunks: Vec<TranscriptChunk> = Vec::new();
    let mut current: Vec<&TimedSegment> = Vec::new();

    for seg in segments {
        let seg_len = seg.text.chars().count();

        // A single segment over budget takes the character splitter,
        // every piece inheriting the segment's timing and speaker
        if seg_len > max {
            if !current.is_empty() {
                push_chunk(&mut chunks, &current);
                current.clear();
            }
            for piece in chunk_flat(&seg.text, config) {
                chunks.push(TranscriptChunk {
                    index: chunks.len() as i32,
                    content: piece.content,
                    start_time: seg.start_time,
                    end_time: seg.end_time,
                    speaker: seg.speaker.clone(),
                });
            }
            continue;
        }

        if !current.is_empty() && joined_len(&current) + 1 + seg_len > max {
            push_chunk(&mut chunks, &current);

            // Carry trailing segments totaling at least the overlap,
            // as long as they leave room for the incoming segment
            let mut carried: VecDeque<&TimedSegment> = VecDeque::new();
            let mut carried_chars = 0usize;
            for prev in current.iter().rev() {
                if carried_chars >= overlap {
                    break;
                }
                let prev_len = prev.text.chars().count();
                let projected = carried_chars + prev_len + carried.len() + 1 + seg_len + 1;
                if projected > max {
                    break;
                }
                carried.push_front(prev);
                carried_chars += prev_len;
            }
            current = carried.into_iter().collect();
        }

        current.push(seg);
    }

    if !current.is_empty() {
        push_chunk(&mut chunks, &current);
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<TranscriptChunk>, segments: &[&TimedSegment]) {
    let content = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    chunks.push(TranscriptChunk {
        index: chunks.len() as i32,
        content,
        start_time: segments.iter().find_map(|s| s.start_time),
        end_time: segments.iter().rev().find_map(|s| s.end_time),
        speaker: dominant_speaker(segments),
    });
}

/// The speaker contributing the most characters to the chunk. Ties
/// resolve alphabetically for determinism.
fn dominant_speaker(segments: &[&TimedSegment]) -> Option<String> {
    let mut weights: BTreeMap<&str, usize> = BTreeMap::new();
    for seg in segments {
        if let Some(ref speaker) = seg.speaker {
            *weights.entry(speaker.as_str()).or_default() += seg.text.chars().count();
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, weight) in weights {
        match best {
            Some((_, best_weight)) if weight <= best_weight => {}
            _ => best = Some((name, weight)),
        }
    }

    best.map(|(name, _)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str, start: f64, end: f64, speaker: Option<&str>) -> TimedSegment {
        TimedSegment {
            text: text.to_string(),
            start_time: Some(start),
            end_time: Some(end),
            speaker: speaker.map(String::from),
        }
    }

    #[test]
    fn test_flat_1700_chars_three_chunks_exact_overlap() {
        // 1700 characters with no sentence boundaries
        let text = "ab".repeat(850);
        let config = ChunkingConfig {
            max_chars: 800,
            overlap_chars: 100,
        };

        let chunks = chunk_transcript(&text, &[], &config);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content.chars().count(), 800);
        assert_eq!(chunks[1].content.chars().count(), 800);
        assert_eq!(chunks[2].content.chars().count(), 300);

        // Exactly 100 characters shared between adjacent chunks
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].content.chars().collect();
            let next: Vec<char> = pair[1].content.chars().collect();
            let tail: String = prev[prev.len() - 100..].iter().collect();
            let head: String = next[..100].iter().collect();
            assert_eq!(tail, head);
        }

        for chunk in &chunks {
            assert!(chunk.start_time.is_none());
            assert!(chunk.end_time.is_none());
            assert!(chunk.speaker.is_none());
        }
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(60);
        let segments = vec![
            seg("Hello and welcome back to the show.", 0.0, 3.0, Some("Host")),
            seg("Thanks for having me, great to be here.", 3.0, 6.0, Some("Guest")),
        ];
        let config = ChunkingConfig::default();

        assert_eq!(
            chunk_transcript(&text, &segments, &config),
            chunk_transcript(&text, &segments, &config)
        );
        assert_eq!(
            chunk_transcript(&text, &[], &config),
            chunk_transcript(&text, &[], &config)
        );
    }

    #[test]
    fn test_chunk_length_law() {
        let text = "Some sentences are short. Others ramble on for quite a while before \
                    reaching any kind of conclusion! Does that matter? "
            .repeat(40);
        let config = ChunkingConfig {
            max_chars: 300,
            overlap_chars: 50,
        };

        let chunks = chunk_transcript(&text, &[], &config);
        assert!(chunks.len() > 1);

        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 300);
        }
    }

    #[test]
    fn test_flat_prefers_sentence_boundary() {
        let text = "One sentence here. ".repeat(30);
        let config = ChunkingConfig {
            max_chars: 100,
            overlap_chars: 20,
        };

        let chunks = chunk_transcript(&text, &[], &config);

        // Every non-final chunk breaks just past a sentence terminator
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.content.ends_with(". ") || chunk.content.ends_with("."),
                "chunk did not end at a sentence boundary: {:?}",
                chunk.content
            );
        }
    }

    #[test]
    fn test_flat_short_text_single_chunk() {
        let text = "Barely anything here.";
        let chunks = chunk_transcript(text, &[], &ChunkingConfig::default());

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(chunk_transcript("", &[], &ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn test_timed_segments_carry_timestamps_and_overlap() {
        let segments: Vec<TimedSegment> = (0..6)
            .map(|i| {
                seg(
                    &format!("Segment number {} with some padding words here", i),
                    i as f64 * 10.0,
                    (i + 1) as f64 * 10.0,
                    Some("Host"),
                )
            })
            .collect();

        let config = ChunkingConfig {
            max_chars: 120,
            overlap_chars: 30,
        };

        let chunks = chunk_transcript("ignored when segments exist", &segments, &config);
        assert!(chunks.len() > 1);

        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 120);
            assert!(chunk.start_time.is_some());
            assert!(chunk.end_time.is_some());
            assert!(chunk.start_time.unwrap() < chunk.end_time.unwrap());
        }

        // Chunks overlap by at least one full carried segment
        for pair in chunks.windows(2) {
            let carried = pair[1].content.split(" Segment").next().unwrap();
            assert!(
                pair[0].content.contains(carried.trim()),
                "no carried overlap between {:?} and {:?}",
                pair[0].content,
                pair[1].content
            );
        }

        // Timestamps are monotonically non-decreasing across chunks
        for pair in chunks.windows(2) {
            assert!(pair[0].start_time.unwrap() <= pair[1].start_time.unwrap());
        }
    }

    #[test]
    fn test_oversized_segment_is_split_with_inherited_timing() {
        let long = seg(&"word ".repeat(80), 5.0, 65.0, Some("Guest"));
        let config = ChunkingConfig {
            max_chars: 100,
            overlap_chars: 20,
        };

        let chunks = chunk_transcript("", std::slice::from_ref(&long), &config);
        assert!(chunks.len() > 1);

        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 100);
            assert_eq!(chunk.start_time, Some(5.0));
            assert_eq!(chunk.end_time, Some(65.0));
            assert_eq!(chunk.speaker.as_deref(), Some("Guest"));
        }
    }

    #[test]
    fn test_dominant_speaker() {
        let segments = vec![
            seg("Short line.", 0.0, 1.0, Some("Guest")),
            seg(
                "A much longer stretch of speech that dominates the chunk by character count.",
                1.0,
                8.0,
                Some("Host"),
            ),
        ];
        let refs: Vec<&TimedSegment> = segments.iter().collect();

        assert_eq!(dominant_speaker(&refs).as_deref(), Some("Host"));
    }

    #[test]
    fn test_dominant_speaker_none_when_unlabeled() {
        let segments = vec![seg("No speakers here.", 0.0, 2.0, None)];
        let refs: Vec<&TimedSegment> = segments.iter().collect();

        assert_eq!(dominant_speaker(&refs), None);
    }

    #[test]
    fn test_chunk_indices_are_sequential() {
        let text = "abc ".repeat(600);
        let chunks = chunk_transcript(&text, &[], &ChunkingConfig::default());

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as i32);
        }
    }
}
