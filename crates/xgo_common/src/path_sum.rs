//! Stable, filesystem-safe directory names derived from absolute paths.
//!
//! Each installed toolchain gets its own private instance directory. The name
//! of that directory must not collide between two toolchains installed at
//! different locations, and must be identical every time the same toolchain
//! is used.

use std::io;
use std::path::{Path, PathBuf};

use crate::hash::ContentHash;

/// Returns `prefix` followed by a 32-character hex digest of the normalized
/// absolute form of `path`.
///
/// Characters of `prefix` outside `[A-Za-z0-9._-]` are replaced with `_`, so
/// the token never contains a path separator. Relative paths are resolved
/// against the current directory; existing paths are canonicalized so that
/// symlinked installs map to the same token as their target.
pub fn path_sum(prefix: &str, path: &Path) -> io::Result<String> {
    let normalized = normalize(path)?;
    let digest = ContentHash::from_bytes(normalized.as_os_str().as_encoded_bytes());
    Ok(format!("{}{digest}", sanitize_prefix(prefix)))
}

fn normalize(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    match std::fs::canonicalize(&absolute) {
        Ok(p) => Ok(p),
        Err(e) if e.kind() == io::ErrorKind::NotFound && !is_dangling_symlink(&absolute) => {
            Ok(absolute)
        }
        Err(e) => Err(e),
    }
}

fn is_dangling_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

fn sanitize_prefix(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashSet;

    #[test]
    fn same_path_same_token() {
        let a = path_sum("go1.20.3_", Path::new("/usr/local/go")).unwrap();
        let b = path_sum("go1.20.3_", Path::new("/usr/local/go")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn token_shape() {
        let token = path_sum("go1.20.3_", Path::new("/opt/go")).unwrap();
        assert!(token.starts_with("go1.20.3_"));
        assert_eq!(token.len(), "go1.20.3_".len() + 32);
        assert!(!token.contains('/'));
        assert!(!token.contains('\\'));
    }

    #[test]
    fn prefix_separators_are_replaced() {
        let token = path_sum("a/b\\c ", Path::new("/opt/go")).unwrap();
        assert!(token.starts_with("a_b_c_"));
    }

    #[test]
    fn different_prefixes_differ() {
        let a = path_sum("go1.20.1_", Path::new("/opt/go")).unwrap();
        let b = path_sum("go1.20.2_", Path::new("/opt/go")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn symlinked_install_maps_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("go");
        std::fs::create_dir(&real).unwrap();
        #[cfg(unix)]
        {
            let link = dir.path().join("go-link");
            std::os::unix::fs::symlink(&real, &link).unwrap();
            assert_eq!(
                path_sum("p_", &real).unwrap(),
                path_sum("p_", &link).unwrap()
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_errors() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("broken");
        std::os::unix::fs::symlink(dir.path().join("missing"), &link).unwrap();
        assert!(path_sum("p_", &link).is_err());
    }

    #[test]
    fn no_collisions_across_random_paths() {
        let mut rng = rand::thread_rng();
        let mut paths = HashSet::new();
        while paths.len() < 20_000 {
            let depth = rng.gen_range(1..6);
            let mut p = PathBuf::from("/nonexistent-xgo-root");
            for _ in 0..depth {
                let len = rng.gen_range(1..12);
                let seg: String = (0..len)
                    .map(|_| rng.gen_range(b'a'..=b'z') as char)
                    .collect();
                p.push(seg);
            }
            paths.insert(p);
        }

        let mut tokens = HashSet::new();
        for p in &paths {
            assert!(tokens.insert(path_sum("go1.20.0_", p).unwrap()));
        }
        assert_eq!(tokens.len(), paths.len());
    }
}
