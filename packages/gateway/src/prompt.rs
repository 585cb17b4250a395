use docextract_schema::RecordKind;
use serde_json::Value;

const INSTRUCTIONS_DEFAULT: &str = include_str!("../prompts/instructions_default.txt");
const INSTRUCTIONS_IDENTITY_DOCUMENT: &str =
    include_str!("../prompts/instructions_identity_document.txt");
const INSTRUCTIONS_INVOICE: &str = include_str!("../prompts/instructions_invoice.txt");
const INSTRUCTIONS_ITEMIZED_INVOICE: &str =
    include_str!("../prompts/instructions_itemized_invoice.txt");

/// Generic extraction instructions.
pub fn default_instructions() -> &'static str {
    INSTRUCTIONS_DEFAULT
}

/// Instructions tuned to the record kind.
pub fn instructions_for(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::IdentityDocument => INSTRUCTIONS_IDENTITY_DOCUMENT,
        RecordKind::Invoice => INSTRUCTIONS_INVOICE,
        RecordKind::ItemizedInvoice => INSTRUCTIONS_ITEMIZED_INVOICE,
    }
}

/// Build the text part sent after the document parts.
///
/// Falls back to the generic instructions when `instructions` is blank.
pub fn build_extraction_prompt(descriptor: &Value, instructions: &str) -> String {
    let schema =
        serde_json::to_string_pretty(descriptor).unwrap_or_else(|_| descriptor.to_string());
    let instructions = if instructions.trim().is_empty() {
        default_instructions()
    } else {
        instructions
    };

    let mut prompt = String::new();
    prompt.push_str(
        "Analyze the provided documents and extract the information strictly \
         following this schema and the description of each field:\n\n",
    );
    prompt.push_str(&schema);
    prompt.push_str("\n\n");
    prompt.push_str(instructions.trim_end());
    prompt.push('\n');
    prompt
}
