//! Sandboxed file access for `read_file` and `list_files`
//!
//! Every path handed in from the page is resolved against the sandbox root
//! and canonicalized; anything that lands outside the root is refused.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

/// Successful `read_file` payload
#[derive(Debug, Serialize)]
pub struct FileContent {
    pub success: bool,
    pub file_path: String,
    pub content: String,
    /// Length of `content` in bytes.
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub modified: Option<String>,
}

/// Successful `list_files` payload
#[derive(Debug, Serialize)]
pub struct DirectoryListing {
    pub success: bool,
    pub directory: String,
    pub count: usize,
    pub files: Vec<FileEntry>,
}

impl Sandbox {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| BridgeError::io(format!("resolving sandbox root {}", root.display()), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a page-supplied path to a canonical path inside the root.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let requested_path = Path::new(requested);
        let joined = if requested_path.is_absolute() {
            requested_path.to_path_buf()
        } else {
            self.root.join(requested_path)
        };

        let resolved = match joined.canonicalize() {
            Ok(p) => p,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Refuse escapes before reporting "missing", so the answer never
                // reveals what exists outside the root.
                if escapes(&self.root, &joined) {
                    return Err(BridgeError::OutsideSandbox {
                        path: requested_path.to_path_buf(),
                        root: self.root.clone(),
                    });
                }
                return Err(BridgeError::MissingFile(requested_path.to_path_buf()));
            }
            Err(e) => return Err(BridgeError::io(format!("resolving {}", requested), e)),
        };

        if !resolved.starts_with(&self.root) {
            return Err(BridgeError::OutsideSandbox {
                path: requested_path.to_path_buf(),
                root: self.root.clone(),
            });
        }

        Ok(resolved)
    }

    pub fn read_file(&self, requested: &str) -> Result<FileContent> {
        let path = self.resolve(requested)?;

        if !path.is_file() {
            return Err(BridgeError::io(
                format!("reading {}", requested),
                std::io::Error::new(ErrorKind::Other, "not a regular file"),
            ));
        }

        let bytes =
            fs::read(&path).map_err(|e| BridgeError::io(format!("reading {}", requested), e))?;
        let content =
            String::from_utf8(bytes).map_err(|_| BridgeError::NotText(PathBuf::from(requested)))?;

        log::debug!("read_file: {:?} ({} bytes)", path, content.len());

        Ok(FileContent {
            success: true,
            file_path: requested.to_string(),
            size: content.len(),
            content,
        })
    }

    /// Regular files directly under the root, sorted by name.
    pub fn list_files(&self) -> Result<DirectoryListing> {
        let read_dir = fs::read_dir(&self.root)
            .map_err(|e| BridgeError::io(format!("listing {}", self.root.display()), e))?;

        let mut files = Vec::new();
        for entry in read_dir {
            let entry =
                entry.map_err(|e| BridgeError::io(format!("listing {}", self.root.display()), e))?;
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("Skipping {:?}: {}", entry.path(), e);
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata
                .modified()
                .ok()
                .map(|t| DateTime::<Local>::from(t).to_rfc3339());

            files.push(FileEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path().to_string_lossy().to_string(),
                size: metadata.len(),
                modified,
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(DirectoryListing {
            success: true,
            directory: self.root.to_string_lossy().to_string(),
            count: files.len(),
            files,
        })
    }
}

/// Whether a path that cannot be canonicalized would land outside the root.
///
/// The nearest existing ancestor is canonicalized, which follows symlinks;
/// the missing remainder is applied lexically on top of it.
fn escapes(root: &Path, path: &Path) -> bool {
    use std::path::Component;

    let existing = path.ancestors().skip(1).find_map(|ancestor| {
        let canonical = ancestor.canonicalize().ok()?;
        let rest = path.strip_prefix(ancestor).ok()?;
        Some(canonical.join(rest))
    });
    let Some(candidate) = existing else {
        return true;
    };

    let mut normalized = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    !normalized.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox_with_files() -> (tempfile::TempDir, Sandbox) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), "hello, world\n").unwrap();
        fs::write(dir.path().join("a.md"), "# title").unwrap();
        fs::create_dir(dir.path().join("static")).unwrap();
        fs::write(dir.path().join("static").join("example.txt"), "nested").unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn test_read_text_file() {
        let (dir, sandbox) = sandbox_with_files();
        let file = sandbox.read_file("hello.txt").unwrap();

        let on_disk = fs::read(dir.path().join("hello.txt")).unwrap();
        assert!(file.success);
        assert_eq!(file.content.as_bytes(), on_disk.as_slice());
        assert_eq!(file.size, file.content.len());
        assert_eq!(file.file_path, "hello.txt");
    }

    #[test]
    fn test_read_nested_and_absolute_paths() {
        let (dir, sandbox) = sandbox_with_files();
        assert_eq!(sandbox.read_file("static/example.txt").unwrap().content, "nested");

        let absolute = dir.path().join("a.md");
        let file = sandbox.read_file(absolute.to_str().unwrap()).unwrap();
        assert_eq!(file.content, "# title");
    }

    #[test]
    fn test_missing_file() {
        let (_dir, sandbox) = sandbox_with_files();
        let err = sandbox.read_file("nope.txt").unwrap_err();
        assert!(matches!(err, BridgeError::MissingFile(_)));
    }

    #[test]
    fn test_escape_is_refused() {
        let (dir, sandbox) = sandbox_with_files();
        let outside = tempfile::NamedTempFile::new_in(dir.path().parent().unwrap()).unwrap();
        let name = outside.path().file_name().unwrap().to_str().unwrap().to_string();

        let err = sandbox.read_file(&format!("../{}", name)).unwrap_err();
        assert!(matches!(err, BridgeError::OutsideSandbox { .. }));

        let err = sandbox.read_file("../../definitely/missing").unwrap_err();
        assert!(matches!(err, BridgeError::OutsideSandbox { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_file_behind_outside_symlink_is_refused() {
        let (dir, sandbox) = sandbox_with_files();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link_out")).unwrap();

        let err = sandbox.read_file("link_out/missing.txt").unwrap_err();
        assert!(matches!(err, BridgeError::OutsideSandbox { .. }));

        fs::write(outside.path().join("present.txt"), "x").unwrap();
        let err = sandbox.read_file("link_out/present.txt").unwrap_err();
        assert!(matches!(err, BridgeError::OutsideSandbox { .. }));

        // Missing paths under a real subdirectory are still just missing.
        let err = sandbox.read_file("static/missing.txt").unwrap_err();
        assert!(matches!(err, BridgeError::MissingFile(_)));
    }

    #[test]
    fn test_binary_file_is_rejected() {
        let (dir, sandbox) = sandbox_with_files();
        fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let err = sandbox.read_file("blob.bin").unwrap_err();
        assert!(matches!(err, BridgeError::NotText(_)));
    }

    #[test]
    fn test_directory_is_not_readable_as_file() {
        let (_dir, sandbox) = sandbox_with_files();
        assert!(matches!(
            sandbox.read_file("static").unwrap_err(),
            BridgeError::Io { .. }
        ));
    }

    #[test]
    fn test_list_files_only_regular_files_sorted() {
        let (_dir, sandbox) = sandbox_with_files();
        let listing = sandbox.list_files().unwrap();

        assert!(listing.success);
        assert_eq!(listing.count, 2);
        let names: Vec<_> = listing.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "hello.txt"]);
        assert_eq!(listing.files[1].size, 13);
        assert!(listing.files[0].modified.is_some());
    }
}
