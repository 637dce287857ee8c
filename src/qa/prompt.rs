//! Grounding prompt assembly.

use crate::index::RetrievedChunk;

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const INSTRUCTIONS: &str = "\
You are an expert Question-Answering assistant.
Your task is to answer the user's question based ONLY on the provided context.
Do not use any external knowledge.
If the context does not contain the answer, state that you cannot answer the question with the information provided.
Cite the source filename for each piece of information you use by adding [Source: filename.ext] at the end of the sentence.

**VERY IMPORTANT INSTRUCTION:** When you cite a source, you MUST only use the filename. \
For example, if the context says \"Source: /documents/reports/quarterly/report_q4.pdf\", \
you must cite it as \"[Source: report_q4.pdf]\". Do not include the full path.";

/// Render retrieved chunks as `Source:`/`Content:` blocks separated by `---` rules.
pub fn assemble_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "Source: {}\nContent: {}",
                chunk.record.source_name(),
                chunk.record.content
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Build the full prompt sent to the language model.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!("{INSTRUCTIONS}\n\nCONTEXT:\n{context}\n\nUSER'S QUESTION:\n{question}\n\nANSWER:\n")
}

/// Base names of the chunk sources, first occurrence wins.
pub fn unique_sources(chunks: &[RetrievedChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for chunk in chunks {
        let name = chunk.record.source_name();
        if !sources.contains(&name) {
            sources.push(name);
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ChunkRecord;
    use std::path::PathBuf;

    fn chunk(source: &str, content: &str) -> RetrievedChunk {
        RetrievedChunk {
            record: ChunkRecord {
                source: PathBuf::from(source),
                content: content.into(),
            },
            distance: 0.0,
        }
    }

    #[test]
    fn context_uses_basenames_and_separators() {
        let context = assemble_context(&[
            chunk("/docs/reports/q4.pdf", "Revenue grew."),
            chunk("/docs/notes.txt", "Costs fell."),
        ]);
        assert_eq!(
            context,
            "Source: q4.pdf\nContent: Revenue grew.\n\n---\n\nSource: notes.txt\nContent: Costs fell."
        );
    }

    #[test]
    fn prompt_places_sections_in_order() {
        let prompt = build_prompt("Source: a.txt\nContent: x", "What is x?");
        let context_at = prompt.find("CONTEXT:\nSource: a.txt").expect("context");
        let question_at = prompt.find("USER'S QUESTION:\nWhat is x?").expect("question");
        let answer_at = prompt.rfind("ANSWER:").expect("answer");
        assert!(prompt.starts_with("You are an expert Question-Answering assistant."));
        assert!(prompt.contains("based ONLY on the provided context"));
        assert!(prompt.contains("[Source: report_q4.pdf]"));
        assert!(context_at < question_at && question_at < answer_at);
    }

    #[test]
    fn sources_keep_rank_order_without_duplicates() {
        let sources = unique_sources(&[
            chunk("/b/zeta.md", "1"),
            chunk("/a/alpha.txt", "2"),
            chunk("/c/zeta.md", "3"),
        ]);
        assert_eq!(sources, vec!["zeta.md", "alpha.txt"]);
    }

    #[test]
    fn empty_retrieval_yields_empty_context() {
        assert_eq!(assemble_context(&[]), "");
        assert!(unique_sources(&[]).is_empty());
    }
}
