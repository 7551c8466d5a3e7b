//! Python syntax profile

use super::{CallSite, NameSource, SyntaxProfile};

pub static PROFILE: SyntaxProfile = SyntaxProfile {
    // Covers methods and decorated functions; the decorator wraps the same node.
    definitions: &["function_definition"],
    calls: &[CallSite {
        kind: "call",
        callee_field: "function",
    }],
    name: NameSource::Field("name"),
};
