//! Default LLM prompts for SDS processing.

/// System message opening every per-document conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You extract product data from safety data sheets (SDS) and answer strictly in the JSON format requested. Use an empty string for any value you cannot find.";

/// Default prompt for stage one: product fields from the document text.
///
/// Placeholders: `{content}`.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"Read the safety data sheet below and find the product information it describes. The document may be written in any language.

Document Content:
{content}

Respond with ONLY a JSON object in this format:
{
    "product_code": "(e.g., ABC)",
    "product_name": "(e.g., Orius 200 EW)",
    "manufacturer_supplier": "(e.g., ADAMA)",
    "product_item_number": "(e.g., 16114071)",
    "ufi_code": "(e.g., XXXX-XXXX-XXXX-XXXX)",
    "current_sds_version": "(e.g., 1.0)",
    "current_sds_date": "(e.g., 27 October 2015)",
    "language_country": "(e.g., Danish / Denmark)",
    "intended_use": "(e.g., Herbicide for cereal crops)"
}
If a value is not available, use an empty string."#;

/// Default prompt for stage two: newest SDS version from search results.
///
/// Placeholders: `{product_info}`, `{query}`, `{results}`.
pub const DEFAULT_VERIFICATION_PROMPT: &str = r#"Find the newest version of the safety data sheet for this product:
{product_info}

Web search results for "{query}":
{results}

Respond with ONLY a JSON object in this format:
{
    "latest_sds_url": "(e.g., https://domain.com/something.pdf)",
    "latest_sds_version": "(e.g., 2.0)",
    "latest_sds_date": "(e.g., 27 October 2015)"
}
If a value is not available, use an empty string."#;
