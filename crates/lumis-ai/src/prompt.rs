//! Prompt templates for enrichment and conflict analysis

use crate::bridge::UnitView;

/// Marker a model returns for code not worth summarizing.
pub const SKIP_MARKER: &str = "SKIP";

/// Used when no explanation could be obtained for a legacy conflict.
pub const FALLBACK_EXPLANATION: &str = "Standard dependency risk detected.";

/// Impact assessments this short carry no usable warning.
pub const MIN_ASSESSMENT_LEN: usize = 6;

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a technical code analyst. \
Summarize the core logic in one clear sentence. \
If the code is purely boilerplate or empty, return: SKIP";

pub fn summary_prompt(unit_name: &str, source_text: &str) -> String {
    format!("Function Name: {}\nCode:\n{}", unit_name, source_text)
}

/// Whether a model's summary is the boilerplate marker.
pub fn is_skip(summary: &str) -> bool {
    summary.trim().is_empty() || summary.to_uppercase().contains(SKIP_MARKER)
}

pub const CONFLICT_SYSTEM_PROMPT: &str = "You are a Senior Software Architect specializing in legacy modernization. \
Analyze the interaction between a RECENTLY MODIFIED function and a LEGACY function (unchanged for months). \
Predict if the recent changes might break assumptions in the legacy code. \
Be concise. Focus on data types, null handling, and logic assumptions.";

pub fn conflict_prompt(recent: UnitView<'_>, legacy: UnitView<'_>) -> String {
    format!(
        "--- RECENT CODE ({}) ---\n{}\n\n--- LEGACY CODE ({}) ---\n{}\n\n\
TASK: Explain the potential risk in 1-2 sentences. If the risk is generic, say 'Standard dependency risk'. \
If you see a specific mismatch (e.g. arguments, types), explain it.",
        recent.identity, recent.source_text, legacy.identity, legacy.source_text
    )
}

pub const IMPACT_SYSTEM_PROMPT: &str = "You are a Senior Architect.";

pub fn impact_prompt(changed: UnitView<'_>, caller: UnitView<'_>, caller_is_legacy: bool) -> String {
    let describe = |unit: UnitView<'_>| unit.summary.unwrap_or(unit.source_text).to_string();
    format!(
        "Analyze if the change in 'Source' breaks the 'Target' unit.\n\n\
Source Function (Recently Changed, {}):\n{}\n\n\
Target Function (Caller, {}):\n{}\n\n\
Context:\nTarget unit is {}.\n\n\
Task:\nReturn a short warning string ONLY if there is a high risk of breakage \
(signature mismatch, assumption violation). If low risk, return an empty string.",
        changed.identity,
        describe(changed),
        caller.identity,
        describe(caller),
        if caller_is_legacy { "LEGACY (not updated in months)" } else { "Active" }
    )
}

/// Normalize a raw impact assessment, dropping empty or trivial answers.
pub fn usable_assessment(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('"').trim();
    (trimmed.chars().count() >= MIN_ASSESSMENT_LEN).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_detection() {
        assert!(is_skip("SKIP"));
        assert!(is_skip("skip."));
        assert!(is_skip("   "));
        assert!(!is_skip("Loads the user record by id."));
    }

    #[test]
    fn test_usable_assessment() {
        assert_eq!(usable_assessment(" \"\" "), None);
        assert_eq!(usable_assessment("none"), None);
        assert_eq!(
            usable_assessment("Return type changed from int to str."),
            Some("Return type changed from int to str.".to_string())
        );
    }

    #[test]
    fn test_conflict_prompt_names_both_units() {
        let recent = UnitView {
            identity: "a.py::a",
            source_text: "def a(): b()",
            summary: None,
        };
        let legacy = UnitView {
            identity: "a.py::b",
            source_text: "def b(): pass",
            summary: None,
        };
        let prompt = conflict_prompt(recent, legacy);
        assert!(prompt.contains("RECENT CODE (a.py::a)"));
        assert!(prompt.contains("LEGACY CODE (a.py::b)"));
    }
}
