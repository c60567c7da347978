//! Best-effort parser for Zoom's VTT-style transcript files.
//!
//! Zoom transcripts interleave cue numbers, timing lines, and spoken text
//! where the speaker name precedes a colon. The parser is a line-oriented
//! heuristic, not a grammar: it must degrade gracefully on malformed input
//! rather than fail, so it is total over arbitrary text.

/// A spoken line, attributed to a speaker when one could be inferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub speaker: Option<String>,
    pub text: String,
}

const MAX_SPEAKER_LABEL_LEN: usize = 50;

/// Reduces subtitle markup to an ordered list of speaker-attributed cues.
///
/// Header, timing, and cue-number lines are dropped. A line whose pre-colon
/// prefix looks like a short speaker label sets the current speaker, which
/// carries forward onto subsequent unlabeled lines.
pub fn parse_vtt(input: &str) -> Vec<Cue> {
    let mut cues = Vec::new();
    let mut current_speaker: Option<String> = None;

    for raw_line in input.lines() {
        let line = raw_line.trim();
        if line.is_empty()
            || line.starts_with("WEBVTT")
            || line.contains("-->")
            || is_sequence_number(line)
        {
            continue;
        }

        match split_speaker_label(line) {
            Some((label, text)) => {
                current_speaker = Some(label.to_string());
                cues.push(Cue {
                    speaker: current_speaker.clone(),
                    text: text.to_string(),
                });
            }
            None => cues.push(Cue {
                speaker: current_speaker.clone(),
                text: line.to_string(),
            }),
        }
    }

    cues
}

/// Renders cues as `Speaker: text` lines in their original order.
pub fn render_cues(cues: &[Cue]) -> String {
    cues.iter()
        .map(|cue| match &cue.speaker {
            Some(speaker) => format!("{}: {}", speaker, cue.text),
            None => cue.text.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse-and-render convenience used by the pipeline.
pub fn normalize_vtt(input: &str) -> String {
    render_cues(&parse_vtt(input))
}

fn is_sequence_number(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

fn split_speaker_label(line: &str) -> Option<(&str, &str)> {
    let (label, rest) = line.split_once(':')?;
    let label = label.trim();
    let rest = rest.trim();
    if label.is_empty() || label.len() >= MAX_SPEAKER_LABEL_LEN || rest.is_empty() {
        return None;
    }
    Some((label, rest))
}
