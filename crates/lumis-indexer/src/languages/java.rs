//! Java syntax profile

use super::{CallSite, NameSource, SyntaxProfile};

pub static PROFILE: SyntaxProfile = SyntaxProfile {
    definitions: &["method_declaration", "constructor_declaration"],
    // `method_invocation` keeps the receiver in `object` and the method in `name`.
    calls: &[CallSite {
        kind: "method_invocation",
        callee_field: "name",
    }],
    name: NameSource::Field("name"),
};
