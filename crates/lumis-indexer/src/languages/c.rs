//! C and C++ syntax profile
//!
//! Definitions keep their name inside a declarator chain such as
//! `pointer_declarator > function_declarator > identifier`.

use super::{CallSite, NameSource, SyntaxProfile};

pub static PROFILE: SyntaxProfile = SyntaxProfile {
    definitions: &["function_definition"],
    calls: &[CallSite {
        kind: "call_expression",
        callee_field: "function",
    }],
    name: NameSource::Declarator,
};
