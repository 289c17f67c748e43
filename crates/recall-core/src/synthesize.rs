//! Answer synthesis from retrieved context.
//!
//! Builds a numbered-context prompt, asks the generator for a JSON
//! `{"answer", "citations"}` payload, and converts cited block numbers
//! back into structured [`Citation`]s. Because citations are resolved by
//! index into the chunks that were actually provided, the model cannot
//! fabricate a source: out-of-range numbers are simply dropped.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::llm::Generator;
use crate::models::{Citation, ScoredChunk};

/// Fixed response when retrieval finds nothing relevant.
pub const NO_INFO_ANSWER: &str = "I don't have information about that in my knowledge base.";

const SYNTHESIS_SYSTEM: &str = "You answer questions using only the provided context blocks. \
Each block is numbered. Rules:\n\
- Use only facts stated in the context blocks. Do not add outside knowledge.\n\
- If the context does not contain the answer, say so plainly.\n\
- Respond with a JSON object: {\"answer\": \"<your answer>\", \"citations\": [<numbers of the \
blocks you used>]}\n\
- Cite every block you drew facts from. Do not cite blocks you did not use.";

const STRICT_ADDENDUM: &str = "\nYour previous answer included claims not supported by the \
context. This time, restrict yourself strictly to statements that appear verbatim or \
near-verbatim in the context blocks. When in doubt, leave it out.";

#[derive(Deserialize)]
struct RawSynthesis {
    answer: String,
    #[serde(default)]
    citations: Vec<i64>,
}

/// Produce an answer and its citations for `query` over `hits`.
///
/// Empty `hits` short-circuits to [`NO_INFO_ANSWER`] without calling the
/// generator. `strict` tightens the grounding instructions for the
/// bounded re-synthesis attempt after an output-guard rejection.
pub async fn synthesize(
    generator: &dyn Generator,
    query: &str,
    hits: &[ScoredChunk],
    strict: bool,
) -> Result<(String, Vec<Citation>)> {
    if hits.is_empty() {
        return Ok((NO_INFO_ANSWER.to_string(), Vec::new()));
    }

    let mut context = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let header = match &hit.chunk.url {
            Some(url) => format!("[{}] {} ({})", i + 1, hit.chunk.title, url),
            None => format!("[{}] {}", i + 1, hit.chunk.title),
        };
        context.push_str(&header);
        context.push('\n');
        context.push_str(&hit.chunk.text);
        context.push_str("\n\n");
    }

    let system = if strict {
        format!("{}{}", SYNTHESIS_SYSTEM, STRICT_ADDENDUM)
    } else {
        SYNTHESIS_SYSTEM.to_string()
    };
    let prompt = format!("Context:\n{}Question: {}", context, query);

    let response = generator.generate(&system, &prompt).await?;
    let raw = parse_synthesis(&response)?;

    let mut citations: Vec<Citation> = Vec::new();
    for number in raw.citations {
        // 1-based block numbers; anything outside the provided range is
        // a hallucinated reference and gets dropped.
        if number < 1 || number as usize > hits.len() {
            continue;
        }
        let chunk = &hits[(number - 1) as usize].chunk;
        let citation = Citation {
            title: chunk.title.clone(),
            url: chunk.url.clone(),
            chunk_id: chunk.id.clone(),
        };
        if !citations
            .iter()
            .any(|c| c.title == citation.title && c.url == citation.url)
        {
            citations.push(citation);
        }
    }

    Ok((raw.answer, citations))
}

/// Parse the model's JSON payload, tolerating a fenced code block.
fn parse_synthesis(response: &str) -> Result<RawSynthesis> {
    let trimmed = response.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body)
        .map_err(|e| Error::Generation(format!("malformed synthesis response: {}", e)))
}
