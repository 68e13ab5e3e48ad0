//! Local symbol sources.

use crate::discovery::search_path::{SearchPath, archive_entry_names, entry_location};
use enclave_api::models::naming::{is_qualified_name, normalize_resource_path, symbol_to_path};
use enclave_api::{Location, SymbolSource};
use once_cell::sync::OnceCell;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::warn;

/// Extension of compiled symbol entries.
pub const SYMBOL_EXTENSION: &str = "class";

/// A fixed set of symbols and resources, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    name: String,
    symbols: BTreeSet<String>,
    resources: BTreeSet<String>,
}

impl InMemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols.extend(symbols.into_iter().map(Into::into));
        self
    }

    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resources
            .extend(resources.into_iter().map(|r| normalize_resource_path(r.as_ref())));
        self
    }
}

impl SymbolSource for InMemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_symbol(&self, name: &str) -> Option<Location> {
        self.symbols
            .contains(name)
            .then(|| Location::new(&self.name, symbol_to_path(name, SYMBOL_EXTENSION)))
    }

    fn find_resource(&self, path: &str) -> Option<Location> {
        let path = normalize_resource_path(path);
        self.resources
            .contains(&path)
            .then(|| Location::new(&self.name, path))
    }
}

/// Symbols and resources read from the entries of a [`SearchPath`].
///
/// Archive entry names are indexed on first use; directories are probed
/// directly.
pub struct SearchPathSource {
    name: String,
    search_path: SearchPath,
    indexes: Vec<OnceCell<HashSet<String>>>,
}

impl SearchPathSource {
    pub fn new(name: impl Into<String>, search_path: SearchPath) -> Self {
        let indexes = search_path.entries().iter().map(|_| OnceCell::new()).collect();
        Self {
            name: name.into(),
            search_path,
            indexes,
        }
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    fn entry_contains(&self, idx: usize, entry: &Path, path: &str) -> bool {
        if entry.is_dir() {
            return entry.join(path).is_file();
        }
        self.indexes[idx]
            .get_or_init(|| index_archive(entry))
            .contains(path)
    }

    fn locations<'a>(&'a self, path: &'a str) -> impl Iterator<Item = Location> + 'a {
        self.search_path
            .entries()
            .iter()
            .enumerate()
            .filter(move |(idx, entry)| self.entry_contains(*idx, entry, path))
            .map(move |(_, entry)| Location::new(&self.name, entry_location(entry, path)))
    }
}

/// Unreadable or missing archives index as empty: lookups miss, they never fail.
fn index_archive(entry: &Path) -> HashSet<String> {
    if !entry.is_file() {
        return HashSet::new();
    }
    match archive_entry_names(entry) {
        Ok(names) => names.into_iter().collect(),
        Err(e) => {
            warn!("Ignoring unreadable search path entry {:?}: {}", entry, e);
            HashSet::new()
        }
    }
}

impl SymbolSource for SearchPathSource {
    fn name(&self) -> &str {
        &self.name
    }

    /// Names with empty segments would map to paths outside the entries.
    fn find_symbol(&self, name: &str) -> Option<Location> {
        if !is_qualified_name(name) {
            return None;
        }
        let path = symbol_to_path(name, SYMBOL_EXTENSION);
        self.locations(&path).next()
    }

    fn find_resource(&self, path: &str) -> Option<Location> {
        let path = normalize_resource_path(path);
        self.locations(&path).next()
    }

    fn find_resources(&self, path: &str) -> Vec<Location> {
        let path = normalize_resource_path(path);
        self.locations(&path).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::search_path::test_support::{write_file, write_jar};

    #[test]
    fn test_in_memory_source() {
        let source = InMemorySource::new("base")
            .with_symbols(["org.acme.util.StringHelper"])
            .with_resources(["/META-INF/acme.xsd"]);

        let location = source.find_symbol("org.acme.util.StringHelper").unwrap();
        assert_eq!(location.provider, "base");
        assert_eq!(location.path, "org/acme/util/StringHelper.class");
        assert!(source.find_symbol("org.acme.util.Missing").is_none());
        assert!(source.find_resource("META-INF/acme.xsd").is_some());
        assert!(source.find_resource("x/../META-INF/acme.xsd").is_some());
    }

    #[test]
    fn test_search_path_source() {
        let temp = tempfile::tempdir().unwrap();
        let classes = temp.path().join("classes");
        write_file(&classes, "org/acme/Local.class", "");
        write_file(&classes, "META-INF/shared.txt", "dir");
        let jar = temp.path().join("lib.jar");
        write_jar(
            &jar,
            &[("org/acme/Packed.class", ""), ("META-INF/shared.txt", "jar")],
        );
        let bogus = temp.path().join("bogus.jar");
        std::fs::write(&bogus, "not a zip").unwrap();

        let source = SearchPathSource::new("app", SearchPath::new([classes, bogus, jar]));

        assert!(source.find_symbol("org.acme.Local").is_some());
        let packed = source.find_symbol("org.acme.Packed").unwrap();
        assert!(packed.path.ends_with("lib.jar!/org/acme/Packed.class"));
        assert!(source.find_symbol("org.acme.Missing").is_none());

        let shared = source.find_resources("/META-INF/shared.txt");
        assert_eq!(shared.len(), 2);
        assert!(shared[1].path.ends_with("lib.jar!/META-INF/shared.txt"));
    }

    #[test]
    fn test_malformed_symbol_names_stay_inside_entries() {
        let temp = tempfile::tempdir().unwrap();
        let classes = temp.path().join("classes");
        std::fs::create_dir_all(&classes).unwrap();
        let outside = temp.path().join("outside");
        write_file(&outside, "Secret.class", "");
        write_file(&classes, "org/acme/Local.class", "");

        let source = SearchPathSource::new("app", SearchPath::new([classes]));
        let absolute = format!("{}.Secret", outside.to_string_lossy().replace('/', "."));
        assert!(source.find_symbol(&absolute).is_none());
        assert!(source.find_symbol(".org.acme.Local").is_none());
        assert!(source.find_symbol("org..acme.Local").is_none());
        assert!(source.find_symbol("org.acme.Local.").is_none());
        assert!(source.find_symbol("org.acme.Local").is_some());
    }
}
