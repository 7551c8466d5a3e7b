//! Routing, parsing and unit extraction, plus the sources files come from

pub mod extractor;
pub mod git;
pub mod languages;
pub mod parser_pool;
pub mod source;

#[cfg(test)]
pub mod tests;

pub use extractor::{ANONYMOUS, ExtractedUnit, UnitExtractor};
pub use git::{FileHistory, GitHistory};
pub use languages::{Grammar, SyntaxProfile, route};
pub use parser_pool::{ParseRequest, ParseResult, ParserPool, create_parser_pool};
pub use source::{FileMetadata, FsSource, MemorySource, SourceProvider};
