use anyhow::{Context, Result};
use log::debug;
use std::collections::BTreeMap;

use crate::bundle::{BpmWorkFile, Bundle, BundleFile, BundleLayout, BundleLockFile};
use crate::module::{ModuleParser, RawModule};
use crate::runtime::clean_path;

/// Classifies the files of an archive or repository and assembles a
/// [`Bundle`] from them.
pub struct BundleProcessor<P: ModuleParser> {
    parser: P,
    layout: BundleLayout,
}

impl<P: ModuleParser> BundleProcessor<P> {
    pub fn new(parser: P, layout: BundleLayout) -> Self {
        Self { parser, layout }
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn layout(&self) -> &BundleLayout {
        &self.layout
    }

    /// Manifest, lock and workspace files are matched by exact path; module
    /// files by extension. Anything else is ignored.
    #[tracing::instrument(skip(self, files), fields(files = files.len()))]
    pub fn process(&self, bundle_path: &str, files: BTreeMap<String, Vec<u8>>) -> Result<Bundle> {
        let mut bundle = Bundle::new(clean_path(bundle_path));

        for (path, content) in files {
            if self.layout.is_module(&path) {
                let module = RawModule::parse(&self.parser, path.clone(), content)
                    .with_context(|| format!("error parsing file contents of '{}'", path))?;
                bundle.modules.insert(path, module);
            } else if path == self.layout.manifest_file {
                bundle.manifest = Some(BundleFile::decode(&utf8(&path, &content)?)?);
            } else if path == self.layout.lock_file {
                bundle.lock = Some(BundleLockFile::decode(&utf8(&path, &content)?)?);
            } else if path == self.layout.work_file {
                bundle.workspace = Some(BpmWorkFile::decode(&utf8(&path, &content)?)?);
            } else {
                debug!("Ignoring {}", path);
            }
        }

        Ok(bundle)
    }
}

fn utf8(path: &str, content: &[u8]) -> Result<String> {
    String::from_utf8(content.to_vec()).with_context(|| format!("'{}' is not valid UTF-8", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{MockModuleParser, ParsedModule, RegoHeaderParser};

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    fn processor() -> BundleProcessor<RegoHeaderParser> {
        BundleProcessor::new(RegoHeaderParser::default(), BundleLayout::default())
    }

    #[test]
    fn test_process_classifies_files() {
        let bundle = processor()
            .process(
                "./dist/acme.tar.gz",
                files(&[
                    ("bundle.toml", "[package]\nname = \"acme\"\nversion = \"1.0.0\"\n"),
                    ("bundle.lock", "version = 1\n"),
                    ("bpm.work", "[workspace]\npackages = [\"acme\"]\n"),
                    ("policies/a.rego", "package pkg.a\n"),
                    ("README.md", "# acme"),
                ]),
            )
            .unwrap();

        assert_eq!(bundle.file_name, "dist/acme.tar.gz");
        assert_eq!(bundle.manifest.unwrap().package.unwrap().name, "acme");
        assert_eq!(bundle.lock.unwrap().version, 1);
        assert!(bundle.workspace.is_some());
        assert_eq!(bundle.modules.len(), 1);
        assert_eq!(bundle.modules["policies/a.rego"].package(), "data.pkg.a");
    }

    #[test]
    fn test_nested_manifest_is_not_the_bundle_manifest() {
        let bundle = processor()
            .process("b", files(&[("vendor/bundle.toml", "not toml [")]))
            .unwrap();
        assert!(bundle.manifest.is_none());
    }

    #[test]
    fn test_module_parse_failure_names_the_file() {
        let err = processor()
            .process("b", files(&[("broken.rego", "import data.x\n")]))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("broken.rego"));
    }

    #[test]
    fn test_bad_lock_file_fails() {
        let err = processor()
            .process("b", files(&[("bundle.lock", "version = [")]))
            .unwrap_err();
        assert!(err.to_string().contains("bundle.lock"));
    }

    #[test]
    fn test_uses_injected_parser() {
        let mut parser = MockModuleParser::new();
        parser.expect_parse().times(2).returning(|path, _| {
            Ok(ParsedModule {
                package: format!("data.{}", path.trim_end_matches(".rego")),
                imports: vec![],
            })
        });

        let processor = BundleProcessor::new(parser, BundleLayout::default());
        let bundle = processor
            .process("b", files(&[("x.rego", ""), ("y.rego", "")]))
            .unwrap();
        assert_eq!(bundle.modules["y.rego"].package(), "data.y");
    }
}
