//! Extension → language table

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Languages recognised by file extension. Recognition does not imply that a
/// grammar is available; see `lumis_indexer::route`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Rust,
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Go,
    Java,
    C,
    Cpp,
    Ruby,
    CSharp,
    Bash,
    PowerShell,
    Kotlin,
    Swift,
    Php,
    Scala,
    Terraform,
    Yaml,
    Markdown,
}

/// Static alias table. Several extensions may share one language.
const EXTENSION_TABLE: &[(&str, Language)] = &[
    ("rs", Language::Rust),
    ("ts", Language::TypeScript),
    ("mts", Language::TypeScript),
    ("cts", Language::TypeScript),
    ("tsx", Language::Tsx),
    ("js", Language::JavaScript),
    ("mjs", Language::JavaScript),
    ("cjs", Language::JavaScript),
    ("jsx", Language::JavaScript),
    ("py", Language::Python),
    ("pyi", Language::Python),
    ("go", Language::Go),
    ("java", Language::Java),
    ("c", Language::C),
    ("h", Language::C),
    ("cpp", Language::Cpp),
    ("cc", Language::Cpp),
    ("cxx", Language::Cpp),
    ("hpp", Language::Cpp),
    ("hh", Language::Cpp),
    ("rb", Language::Ruby),
    ("cs", Language::CSharp),
    ("sh", Language::Bash),
    ("bash", Language::Bash),
    ("ps1", Language::PowerShell),
    ("kt", Language::Kotlin),
    ("kts", Language::Kotlin),
    ("swift", Language::Swift),
    ("php", Language::Php),
    ("scala", Language::Scala),
    ("tf", Language::Terraform),
    ("yml", Language::Yaml),
    ("yaml", Language::Yaml),
    ("md", Language::Markdown),
];

impl Language {
    /// Look up a bare extension (no leading dot, any case).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        EXTENSION_TABLE
            .iter()
            .find(|(candidate, _)| *candidate == ext)
            .map(|(_, language)| *language)
    }

    /// Detect language from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Ruby => "ruby",
            Language::CSharp => "csharp",
            Language::Bash => "bash",
            Language::PowerShell => "powershell",
            Language::Kotlin => "kotlin",
            Language::Swift => "swift",
            Language::Php => "php",
            Language::Scala => "scala",
            Language::Terraform => "terraform",
            Language::Yaml => "yaml",
            Language::Markdown => "markdown",
        }
    }
}
