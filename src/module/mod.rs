//! Policy modules as they move through the resolver.
//!
//! A [`RawModule`] is created by a loader from bytes on disk, in an archive or
//! in a git tree. The linker turns it into an indexed module and, on demand,
//! into a linked module.

mod parser;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use parser::{ModuleParser, RegoHeaderParser};

#[cfg(test)]
pub use parser::MockModuleParser;

/// An `import` clause of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Referenced path, e.g. `data.pkg.a`.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// The parts of a parsed module the resolver cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedModule {
    /// Declared package path, rendered from the `data` root (`data.pkg.a`).
    pub package: String,
    /// Imports in declaration order.
    #[serde(default)]
    pub imports: Vec<Import>,
}

impl ParsedModule {
    pub fn import_paths(&self) -> Vec<String> {
        self.imports.iter().map(|i| i.path.clone()).collect()
    }
}

/// A module file together with its original bytes and parse result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawModule {
    /// Source location, unique within a registry.
    pub path: String,
    pub raw: Vec<u8>,
    pub parsed: ParsedModule,
}

impl RawModule {
    /// Read and parse `raw` as the module at `path`.
    pub fn parse<P: ModuleParser + ?Sized>(
        parser: &P,
        path: impl Into<String>,
        raw: Vec<u8>,
    ) -> anyhow::Result<Self> {
        let path = path.into();
        let source = String::from_utf8_lossy(&raw);
        let parsed = parser.parse(&path, &source)?;
        Ok(Self { path, raw, parsed })
    }

    pub fn package(&self) -> &str {
        &self.parsed.package
    }

    /// Lowercase hex SHA-256 of the original bytes.
    pub fn checksum(&self) -> String {
        format!("{:x}", Sha256::digest(&self.raw))
    }
}
