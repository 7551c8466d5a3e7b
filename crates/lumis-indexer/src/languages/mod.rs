//! Grammar profiles: which syntax nodes are definitions and calls per language

pub mod c;
pub mod go;
pub mod java;
pub mod javascript;
pub mod python;
pub mod rust;

use std::path::Path;

use lumis_core::Language;

/// Where a definition node keeps its name.
#[derive(Debug, Clone, Copy)]
pub enum NameSource {
    /// A direct child field, usually `"name"`.
    Field(&'static str),
    /// Follow the `declarator` chain down to the identifier (C family).
    Declarator,
}

/// A call node kind and the field holding its callee.
#[derive(Debug, Clone, Copy)]
pub struct CallSite {
    pub kind: &'static str,
    pub callee_field: &'static str,
}

/// Node kinds the extractor cares about for one grammar.
#[derive(Debug)]
pub struct SyntaxProfile {
    pub definitions: &'static [&'static str],
    pub calls: &'static [CallSite],
    pub name: NameSource,
}

impl SyntaxProfile {
    pub fn is_definition(&self, kind: &str) -> bool {
        self.definitions.contains(&kind)
    }

    pub fn call_site(&self, kind: &str) -> Option<&CallSite> {
        self.calls.iter().find(|site| site.kind == kind)
    }
}

/// Fields that hold the trailing segment of a member or qualified access.
pub const MEMBER_FIELDS: &[&str] = &["attribute", "property", "field", "name"];

/// Grammars compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Rust,
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Go,
    Java,
    C,
    Cpp,
}

impl Grammar {
    /// `None` for recognised languages without a bundled grammar.
    pub fn for_language(language: Language) -> Option<Self> {
        match language {
            Language::Rust => Some(Grammar::Rust),
            Language::TypeScript => Some(Grammar::TypeScript),
            Language::Tsx => Some(Grammar::Tsx),
            Language::JavaScript => Some(Grammar::JavaScript),
            Language::Python => Some(Grammar::Python),
            Language::Go => Some(Grammar::Go),
            Language::Java => Some(Grammar::Java),
            Language::C => Some(Grammar::C),
            Language::Cpp => Some(Grammar::Cpp),
            _ => None,
        }
    }

    /// Get the tree-sitter language for this grammar
    pub fn tree_sitter_language(&self) -> tree_sitter::Language {
        match self {
            Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::Go => tree_sitter_go::LANGUAGE.into(),
            Grammar::Java => tree_sitter_java::LANGUAGE.into(),
            Grammar::C => tree_sitter_c::LANGUAGE.into(),
            Grammar::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }

    pub fn profile(&self) -> &'static SyntaxProfile {
        match self {
            Grammar::Rust => &rust::PROFILE,
            Grammar::TypeScript | Grammar::Tsx | Grammar::JavaScript => &javascript::PROFILE,
            Grammar::Python => &python::PROFILE,
            Grammar::Go => &go::PROFILE,
            Grammar::Java => &java::PROFILE,
            Grammar::C | Grammar::Cpp => &c::PROFILE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Grammar::Rust => "rust",
            Grammar::TypeScript => "typescript",
            Grammar::Tsx => "tsx",
            Grammar::JavaScript => "javascript",
            Grammar::Python => "python",
            Grammar::Go => "go",
            Grammar::Java => "java",
            Grammar::C => "c",
            Grammar::Cpp => "cpp",
        }
    }
}

/// Map a path to a grammar, or `None` when the file should be skipped.
pub fn route(path: &Path) -> Option<Grammar> {
    Language::from_path(path).and_then(Grammar::for_language)
}
