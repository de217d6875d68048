//! Transcript reconciliation.
//!
//! Folds the ordered per-chunk recognition results into one
//! speaker-annotated transcript. The recognition service reports
//! diarization-complete speaker tags reliably only on a late segment of
//! each result; earlier segments carry partial attribution and are ignored,
//! otherwise speaker runs duplicate or contradict each other. Speaker runs
//! may continue silently across a chunk boundary, so the trailing speaker
//! of one chunk seeds the next.

use crate::recognition::{RecognitionResult, WordInfo};

/// Merge ordered chunk results into one transcript string.
///
/// Chunks with diarized words become labeled speaker runs; chunks without
/// any speaker tag degrade to their plain transcripts joined by newlines.
/// Only trailing whitespace is trimmed from the final string.
pub fn reconcile_transcript(chunks: &[RecognitionResult], language_code: &str) -> String {
    let joiner = word_joiner(language_code);
    let mut out = String::new();
    let mut current_speaker: Option<i32> = None;
    // Set while the last emitted text came from a plain-fallback chunk, so
    // a resumed diarized stream is not glued onto it with the word joiner.
    let mut after_plain = false;

    for chunk in chunks {
        match diarized_words(chunk) {
            Some(words) => {
                for word in words {
                    match word.speaker_tag {
                        Some(tag) if current_speaker != Some(tag) => {
                            // Blank line closes the previous run, unless
                            // nothing has been emitted yet.
                            if !out.is_empty() {
                                out.push_str("\n\n");
                            }
                            out.push_str(&format!("[speaker {}]: ", tag));
                            out.push_str(&word.word);
                            current_speaker = Some(tag);
                        }
                        // Untagged words continue the current run; so do
                        // words re-tagged with the current speaker.
                        _ => {
                            if after_plain {
                                out.push('\n');
                            } else if !out.is_empty() {
                                out.push_str(joiner);
                            }
                            out.push_str(&word.word);
                        }
                    }
                    after_plain = false;
                }
            }
            None => {
                let plain = plain_text(chunk);
                if !plain.is_empty() {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(&plain);
                    after_plain = true;
                }
            }
        }
    }

    out.trim_end().to_string()
}

/// The diarized word stream of a chunk, if it has one.
///
/// Segments are searched from last to first; the first whose word list
/// carries any speaker tag wins.
fn diarized_words(chunk: &RecognitionResult) -> Option<&[WordInfo]> {
    chunk
        .results
        .iter()
        .rev()
        .filter_map(|segment| segment.best())
        .find(|alt| alt.is_diarized())
        .map(|alt| alt.words.as_slice())
}

/// Newline-joined plain transcripts of all segments in a chunk.
fn plain_text(chunk: &RecognitionResult) -> String {
    chunk
        .results
        .iter()
        .filter_map(|segment| segment.best())
        .map(|alt| alt.transcript.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Word joiner for the given language tag: CJK scripts take no inter-word
/// separator, everything else a single space.
///
/// Only the primary subtag is compared, exactly — `kok` (Konkani) must not
/// match `ko`.
fn word_joiner(language_code: &str) -> &'static str {
    let lowered = language_code.to_lowercase();
    let primary = lowered.split(['-', '_']).next().unwrap_or("");
    if matches!(primary, "zh" | "ja" | "ko") {
        ""
    } else {
        " "
    }
}
