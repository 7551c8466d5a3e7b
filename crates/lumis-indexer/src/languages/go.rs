//! Go syntax profile

use super::{CallSite, NameSource, SyntaxProfile};

pub static PROFILE: SyntaxProfile = SyntaxProfile {
    definitions: &["function_declaration", "method_declaration"],
    calls: &[CallSite {
        kind: "call_expression",
        callee_field: "function",
    }],
    name: NameSource::Field("name"),
};
