//! JavaScript and TypeScript syntax profile
//!
//! Both TypeScript grammars reuse the JavaScript node names for
//! declarations and calls.

use super::{CallSite, NameSource, SyntaxProfile};

pub static PROFILE: SyntaxProfile = SyntaxProfile {
    definitions: &[
        "function_declaration",
        "generator_function_declaration",
        "method_definition",
    ],
    calls: &[CallSite {
        kind: "call_expression",
        callee_field: "function",
    }],
    name: NameSource::Field("name"),
};
