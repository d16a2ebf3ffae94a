//! Few-shot extraction prompt and the JSON schema used for constrained
//! decoding.

use serde_json::json;

const INSTRUCTIONS: &str = "\
Extract and normalize both individual drug names and chemotherapy regimen names from the clinical text in JSON format.
Rules:
1. Normalize drug names to **generic forms**:
   - Convert brand names to generics (e.g., Oncovin → vincristine)
   - Expand abbreviations (e.g., MTX → methotrexate)
   - Correct misspellings (e.g., Methotrxate → methotrexate)
   - If generic equivalent is unknown, include the raw name in lowercase
2. Regimen names should be normalized to lowercase (e.g., R-CHOP → r-chop)
3. Only include drugs explicitly mentioned; do **not** expand regimens into their component drugs
4. Always include both `\"drugs\"` and `\"regimens\"` fields in the output
5. Use lowercase only for all entries";

/// (input, drugs, regimens)
const FEW_SHOT: [(&str, &[&str], &[&str]); 4] = [
    (
        "Started R-CHOP along with methotrexate. Prednisone added for symptom relief.",
        &["methotrexate", "prednisone"],
        &["r-chop"],
    ),
    ("Continued on ABVD and BEACOPP.", &[], &["abvd", "beacopp"]),
    (
        "Administered capecitabine, bevacizumab, and oxaliplatin.",
        &["capecitabine", "bevacizumab", "oxaliplatin"],
        &[],
    ),
    ("No active treatment initiated yet.", &[], &[]),
];

/// Build the extraction prompt for one clinical text.
pub fn format_prompt(text: &str) -> String {
    let mut prompt = String::from(INSTRUCTIONS);
    prompt.push_str("\nExamples:\n");
    for (input, drugs, regimens) in FEW_SHOT {
        let output = json!({ "drugs": drugs, "regimens": regimens });
        let rendered = serde_json::to_string_pretty(&output).unwrap_or_default();
        prompt.push_str(&format!("Input: {input}\nOutput:\n{rendered}\n"));
    }
    prompt.push_str(&format!("Process this text:\n{text}\nJSON Output:"));
    prompt
}

/// Schema requiring `drugs` and `regimens` string arrays.
pub fn extraction_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "drugs": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 0
            },
            "regimens": {
                "type": "array",
                "items": { "type": "string" },
                "minItems": 0
            }
        },
        "required": ["drugs", "regimens"]
    })
}
