//! Locating a JDK installation.
//!
//! Looked up in order:
//! - `JAVA_HOME`
//! - the macOS `java_home` tool
//! - common installation roots
//! - SDKMAN candidates

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static VERSION_IN_PATH: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"jdk-?(\d+(?:\.\d+)*)").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JdkHome {
    pub root: PathBuf,
    pub version: Option<String>,
    /// Runtime image, legacy `rt.jar`, or the `jmods/*.jmod` files.
    pub runtime: Vec<PathBuf>,
}

impl JdkHome {
    /// The JDK installed at `root`, if it has a runtime we can read.
    pub fn at(root: &Path) -> Option<Self> {
        let runtime = runtime_entries(root);
        if runtime.is_empty() {
            return None;
        }
        Some(Self {
            root: root.to_path_buf(),
            version: detect_version(root),
            runtime,
        })
    }

    pub fn locate() -> Option<Self> {
        Self::locate_with(|key| std::env::var(key).ok())
    }

    /// [`Self::locate`] with a custom environment resolver.
    pub fn locate_with(env: impl Fn(&str) -> Option<String>) -> Option<Self> {
        if let Some(home) = env("JAVA_HOME").and_then(|h| Self::at(Path::new(&h))) {
            return Some(home);
        }

        #[cfg(target_os = "macos")]
        if let Ok(output) = std::process::Command::new("/usr/libexec/java_home").output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if let Some(home) = Self::at(Path::new(&path)) {
                    return Some(home);
                }
            }
        }

        search_roots().iter().find_map(|root| Self::search(root))
    }

    /// `root` itself, or the first installation directly below it.
    fn search(root: &Path) -> Option<Self> {
        if !root.exists() {
            return None;
        }
        if let Some(home) = Self::at(root) {
            return Some(home);
        }

        let mut candidates: Vec<PathBuf> = std::fs::read_dir(root)
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .collect();
        candidates.sort();
        candidates.into_iter().find_map(|mut candidate| {
            if cfg!(target_os = "macos") && candidate.join("Contents/Home").exists() {
                candidate = candidate.join("Contents/Home");
            }
            Self::at(&candidate)
        })
    }
}

fn search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    #[cfg(target_os = "macos")]
    {
        roots.push(PathBuf::from("/Library/Java/JavaVirtualMachines/"));
        roots.push(PathBuf::from("/opt/homebrew/opt/openjdk/"));
        roots.push(PathBuf::from("/usr/local/opt/openjdk/"));
    }
    #[cfg(target_os = "linux")]
    {
        roots.push(PathBuf::from("/usr/lib/jvm/"));
    }
    #[cfg(target_os = "windows")]
    {
        roots.push(PathBuf::from("C:\\Program Files\\Java\\"));
    }

    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".sdkman/candidates/java/"));
    }
    roots
}

/// Runtime entries of a JDK root, best layout first.
pub fn runtime_entries(root: &Path) -> Vec<PathBuf> {
    let modules = root.join("lib/modules");
    if modules.is_file() {
        return vec![modules];
    }

    for rt in [root.join("jre/lib/rt.jar"), root.join("lib/rt.jar")] {
        if rt.is_file() {
            return vec![rt];
        }
    }

    let mut jmods: Vec<PathBuf> = std::fs::read_dir(root.join("jmods"))
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("jmod"))
        .collect();
    jmods.sort();
    jmods
}

/// `JAVA_VERSION` from the `release` file, else a version in the path.
pub fn detect_version(root: &Path) -> Option<String> {
    if let Ok(content) = std::fs::read_to_string(root.join("release")) {
        if let Some(line) = content.lines().find(|l| l.starts_with("JAVA_VERSION=")) {
            return Some(
                line.trim_start_matches("JAVA_VERSION=")
                    .trim_matches('"')
                    .to_string(),
            );
        }
    }

    let path = root.to_string_lossy();
    VERSION_IN_PATH
        .as_ref()?
        .captures(&path)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::File::create(path).unwrap();
    }

    #[test]
    fn test_runtime_image_layout() {
        let temp = tempfile::tempdir().unwrap();
        let modules = temp.path().join("lib/modules");
        touch(&modules);
        std::fs::write(temp.path().join("release"), "JAVA_VERSION=\"21.0.2\"\n").unwrap();

        let home = JdkHome::at(temp.path()).unwrap();
        assert_eq!(home.runtime, vec![modules]);
        assert_eq!(home.version.as_deref(), Some("21.0.2"));
    }

    #[test]
    fn test_legacy_rt_jar_layout() {
        let temp = tempfile::tempdir().unwrap();
        let rt = temp.path().join("jre/lib/rt.jar");
        touch(&rt);

        assert_eq!(runtime_entries(temp.path()), vec![rt]);
    }

    #[test]
    fn test_jmods_layout() {
        let temp = tempfile::tempdir().unwrap();
        touch(&temp.path().join("jmods/java.xml.jmod"));
        touch(&temp.path().join("jmods/java.base.jmod"));
        touch(&temp.path().join("jmods/README"));

        let names: Vec<_> = runtime_entries(temp.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["java.base.jmod", "java.xml.jmod"]);
    }

    #[test]
    fn test_not_a_jdk() {
        let temp = tempfile::tempdir().unwrap();
        assert!(JdkHome::at(temp.path()).is_none());
    }

    #[test]
    fn test_version_from_path() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("jdk-17.0.9");
        touch(&root.join("lib/modules"));
        assert_eq!(detect_version(&root).as_deref(), Some("17.0.9"));
    }

    #[test]
    fn test_locate_prefers_java_home() {
        let temp = tempfile::tempdir().unwrap();
        touch(&temp.path().join("lib/modules"));
        let java_home = temp.path().to_string_lossy().to_string();

        let home = JdkHome::locate_with(|key| (key == "JAVA_HOME").then(|| java_home.clone()));
        assert_eq!(home.unwrap().root, temp.path());
    }
}
