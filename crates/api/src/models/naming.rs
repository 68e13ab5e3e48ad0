//! Naming rules shared by policies, filters and sources.
//!
//! Symbols are dotted (`org.acme.util.StringHelper`); resources are
//! slash-separated (`META-INF/foo/bar.txt`). A resource folder has a
//! namespace-equivalent form obtained by swapping the separators.

pub const NAMESPACE_SEPARATOR: char = '.';
pub const PATH_SEPARATOR: char = '/';

/// Strips one trailing separator (`org.acme.` or `org/acme/`).
pub fn normalize_namespace(namespace: &str) -> &str {
    namespace
        .strip_suffix(NAMESPACE_SEPARATOR)
        .or_else(|| namespace.strip_suffix(PATH_SEPARATOR))
        .unwrap_or(namespace)
}

/// Namespace part of a dotted symbol name. Bare names live in the
/// empty (root) namespace.
pub fn namespace_of(symbol: &str) -> &str {
    match symbol.rfind(NAMESPACE_SEPARATOR) {
        Some(idx) => &symbol[..idx],
        None => "",
    }
}

/// Whether `namespace` equals `root` or lies below it.
pub fn is_within(namespace: &str, root: &str) -> bool {
    let root = normalize_namespace(root);
    if root.is_empty() {
        return false;
    }
    match namespace.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with(NAMESPACE_SEPARATOR),
        None => false,
    }
}

/// `a.b.c`, `a.b`, `a`.
pub fn ancestors(namespace: &str) -> impl Iterator<Item = &str> {
    let mut current = Some(namespace).filter(|ns| !ns.is_empty());
    std::iter::from_fn(move || {
        let ns = current?;
        current = ns.rfind(NAMESPACE_SEPARATOR).map(|idx| &ns[..idx]);
        Some(ns)
    })
}

/// Drops the leading separator and resolves `.` and `..` segments.
/// A `..` that would climb above the root is discarded.
pub fn normalize_resource_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(PATH_SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let mut normalized = segments.join("/");
    if path.ends_with(PATH_SEPARATOR) && !normalized.is_empty() {
        normalized.push(PATH_SEPARATOR);
    }
    normalized
}

/// Folder containing a resource, without trailing separator.
pub fn resource_folder(path: &str) -> &str {
    let path = path.strip_suffix(PATH_SEPARATOR).unwrap_or(path);
    match path.rfind(PATH_SEPARATOR) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// `META-INF/foo` -> `META-INF.foo`
pub fn folder_to_namespace(folder: &str) -> String {
    normalize_namespace(folder).replace(PATH_SEPARATOR, ".")
}

/// `org.acme.Foo` -> `org/acme/Foo.class` for extension `class`.
pub fn symbol_to_path(symbol: &str, extension: &str) -> String {
    let mut path = symbol.replace(NAMESPACE_SEPARATOR, "/");
    if !extension.is_empty() {
        path.push('.');
        path.push_str(extension);
    }
    path
}

/// A dotted name whose segments are all non-empty and free of path
/// separators (`org.acme.Foo`, `Outer$Inner`). Leading, trailing or doubled
/// dots fail.
pub fn is_qualified_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .split(NAMESPACE_SEPARATOR)
            .all(|segment| !segment.is_empty() && !segment.contains(['/', '\\']))
}

/// A [`is_qualified_name`] made of identifier characters only
/// (letters, digits, `_` and `$`), not starting a segment with a digit.
pub fn is_dotted_identifier(name: &str) -> bool {
    is_qualified_name(name)
        && name.split(NAMESPACE_SEPARATOR).all(|segment| {
            !segment.starts_with(|c: char| c.is_ascii_digit())
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        })
}

/// Whether a consumer identity is covered by an allow-list entry: exact
/// match, or `allowed` followed by `:` (`group:artifact` vs `group:artifact:1.0`).
pub fn consumer_matches(allowed: &str, consumer: &str) -> bool {
    match consumer.strip_prefix(allowed) {
        Some(rest) => !allowed.is_empty() && (rest.is_empty() || rest.starts_with(':')),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_of() {
        assert_eq!(namespace_of("org.acme.util.StringHelper"), "org.acme.util");
        assert_eq!(namespace_of("Bare"), "");
    }

    #[test]
    fn test_is_within_respects_segment_boundary() {
        assert!(is_within("java.lang", "java"));
        assert!(is_within("java", "java."));
        assert!(!is_within("javascript.foo", "java"));
        assert!(!is_within("anything", ""));
    }

    #[test]
    fn test_ancestors() {
        let all: Vec<_> = ancestors("a.b.c").collect();
        assert_eq!(all, vec!["a.b.c", "a.b", "a"]);
        assert_eq!(ancestors("").count(), 0);
    }

    #[test]
    fn test_normalize_resource_path() {
        assert_eq!(normalize_resource_path("/root/../dummy.txt"), "dummy.txt");
        assert_eq!(normalize_resource_path("a/./b//c.txt"), "a/b/c.txt");
        assert_eq!(normalize_resource_path("../../x"), "x");
        assert_eq!(normalize_resource_path("META-INF/foo/"), "META-INF/foo/");
    }

    #[test]
    fn test_resource_folder() {
        assert_eq!(resource_folder("META-INF/foo/bar.txt"), "META-INF/foo");
        assert_eq!(resource_folder("bar.txt"), "");
        assert_eq!(folder_to_namespace("META-INF/foo/"), "META-INF.foo");
    }

    #[test]
    fn test_qualified_names() {
        assert!(is_qualified_name("org.acme.Foo"));
        assert!(is_qualified_name("Bare"));
        assert!(!is_qualified_name(".tmp.outside.Secret"));
        assert!(!is_qualified_name("org..Foo"));
        assert!(!is_qualified_name("org.Foo."));
        assert!(!is_qualified_name("org/acme.Foo"));
        assert!(!is_qualified_name(""));
    }

    #[test]
    fn test_dotted_identifiers() {
        assert!(is_dotted_identifier("org.acme.Spi"));
        assert!(is_dotted_identifier("org.acme.Outer$Inner"));
        assert!(!is_dotted_identifier("../../escaped.txt"));
        assert!(!is_dotted_identifier("/etc/passwd"));
        assert!(!is_dotted_identifier("org.acme.1st"));
        assert!(!is_dotted_identifier("org.acme-http.Spi"));
    }

    #[test]
    fn test_symbol_to_path() {
        assert_eq!(symbol_to_path("org.acme.Foo", "class"), "org/acme/Foo.class");
    }
}
