//! Prompt templates for ontology-constrained extraction

use crate::models::ExtractionPrompt;

/// System prompt for the extraction model
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are an expert in extracting structured information out of natural language text. \
You extract entities with their attributes and relationships between entities. \
You can produce the output as RDF triples or as Cypher write statements on request. ";

/// Instruction that precedes the ontology and the document
pub const EXTRACTION_INSTRUCTIONS: &str = "Given the ontology below run your best entity extraction over the content.
 The extracted entities and relationships must be described using exclusively the terms in the ontology
 and in the way they are defined. This means that for attributes and relationships you will respect the domain and range constraints.
 You will never use terms not defined in the ontology.
Return the output as Cypher using merge to allow for linkage of nodes from multiple passes.
Absolutely no comments on the output. Just the structured output. ";

/// Marker that introduces the ontology text
pub const ONTOLOGY_MARKER: &str = "\n\nONTOLOGY: \n ";

/// Marker that introduces the document text
pub const CONTENT_MARKER: &str = "\n\nCONTENT: \n ";

/// Build the system/user prompt pair.
///
/// The user prompt is the fixed instructions, then the ontology, then the
/// document, each inserted verbatim.
pub fn build_extraction_prompt(ontology: &str, document: &str) -> ExtractionPrompt {
    let mut user = String::with_capacity(
        EXTRACTION_INSTRUCTIONS.len()
            + ONTOLOGY_MARKER.len()
            + ontology.len()
            + CONTENT_MARKER.len()
            + document.len(),
    );
    user.push_str(EXTRACTION_INSTRUCTIONS);
    user.push_str(ONTOLOGY_MARKER);
    user.push_str(ontology);
    user.push_str(CONTENT_MARKER);
    user.push_str(document);

    ExtractionPrompt {
        system: EXTRACTION_SYSTEM_PROMPT.to_string(),
        user,
    }
}
