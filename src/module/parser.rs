//! Module header parsing.
//!
//! Full policy-language parsing lives outside this crate; the resolver only
//! needs the package clause and the import list, which is what
//! [`RegoHeaderParser`] extracts.

use anyhow::{Result, bail};

use super::{Import, ParsedModule};

/// Turns module source text into a [`ParsedModule`].
#[cfg_attr(test, mockall::automock)]
pub trait ModuleParser: Send + Sync {
    fn parse(&self, path: &str, source: &str) -> Result<ParsedModule>;
}

/// Reads `package` and `import` clauses of a Rego module.
///
/// Imports rooted at one of `pragma_roots` (e.g. `import rego.v1`,
/// `import future.keywords.if`) switch language features on and do not refer
/// to other modules, so they are left out of the import list.
#[derive(Debug, Clone)]
pub struct RegoHeaderParser {
    pub pragma_roots: Vec<String>,
}

impl Default for RegoHeaderParser {
    fn default() -> Self {
        Self {
            pragma_roots: vec!["future".to_string(), "rego".to_string()],
        }
    }
}

impl RegoHeaderParser {
    fn is_pragma(&self, reference: &str) -> bool {
        let root = reference.split(['.', '[']).next().unwrap_or_default();
        self.pragma_roots.iter().any(|r| r == root)
    }
}

impl ModuleParser for RegoHeaderParser {
    #[tracing::instrument(skip(self, source))]
    fn parse(&self, path: &str, source: &str) -> Result<ParsedModule> {
        let mut package: Option<String> = None;
        let mut imports = Vec::new();

        for (idx, line) in source.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(line).trim();

            if let Some(rest) = keyword(line, "package") {
                if package.is_some() {
                    bail!("{}:{}: duplicate package declaration", path, line_no);
                }
                let reference = parse_ref(rest)
                    .ok_or_else(|| anyhow::anyhow!("{}:{}: invalid package path", path, line_no))?;
                package = Some(format!("data.{}", reference));
            } else if let Some(rest) = keyword(line, "import") {
                if package.is_none() {
                    bail!("{}:{}: import before package declaration", path, line_no);
                }
                let mut parts = rest.split_whitespace();
                let reference = parts
                    .next()
                    .and_then(parse_ref)
                    .ok_or_else(|| anyhow::anyhow!("{}:{}: invalid import path", path, line_no))?;
                let alias = match (parts.next(), parts.next()) {
                    (None, _) => None,
                    (Some("as"), Some(alias)) => Some(alias.to_string()),
                    _ => bail!("{}:{}: malformed import clause", path, line_no),
                };
                if self.is_pragma(reference) {
                    continue;
                }
                imports.push(Import {
                    path: reference.to_string(),
                    alias,
                });
            }
        }

        let Some(package) = package else {
            bail!("{}: missing package declaration", path);
        };

        Ok(ParsedModule { package, imports })
    }
}

/// `rest` of a line starting with `word` followed by whitespace.
fn keyword<'a>(line: &'a str, word: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(word)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn parse_ref(text: &str) -> Option<&str> {
    let text = text.trim();
    let valid = !text.is_empty()
        && !text.starts_with('.')
        && !text.ends_with('.')
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']' | '"' | '-'));
    valid.then_some(text)
}

/// Drop a trailing `#` comment that is not inside a string literal.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}
