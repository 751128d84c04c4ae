//! Filesystem helpers: directory moves, recursive copies and ownership.

use crate::error::{Error, Result};
use crate::types::Ownership;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Names of version-control metadata entries stripped from extracted trees.
const VCS_METADATA: &[&str] = &[".git", ".gitmodules"];

/// Recursively copy `src` into `dest` (created if missing).
///
/// Symlinks are recreated, not followed.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::io(entry.path(), std::io::Error::other(e)))?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| Error::io(&target, e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    let link = fs::read_link(src).map_err(|e| Error::io(src, e))?;
    std::os::unix::fs::symlink(&link, target).map_err(|e| Error::io(target, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    fs::copy(src, target).map_err(|e| Error::io(target, e))?;
    Ok(())
}

/// Move a directory, replacing anything already at `dest`.
///
/// Tries a rename first and falls back to copy + remove when source and
/// destination live on different filesystems.
pub fn move_dir(src: &Path, dest: &Path) -> Result<()> {
    if dest.symlink_metadata().is_ok() {
        log::debug!("Replacing existing {}", dest.display());
        remove_path(dest)?;
    }

    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            log::debug!(
                "{} and {} are on different devices, copying",
                src.display(),
                dest.display()
            );
            copy_dir(src, dest)?;
            fs::remove_dir_all(src).map_err(|e| Error::io(src, e))
        }
        Err(e) => Err(Error::io(dest, e)),
    }
}

fn remove_path(path: &Path) -> Result<()> {
    let meta = path.symlink_metadata().map_err(|e| Error::io(path, e))?;
    if meta.is_dir() {
        fs::remove_dir_all(path).map_err(|e| Error::io(path, e))
    } else {
        fs::remove_file(path).map_err(|e| Error::io(path, e))
    }
}

/// Remove every version-control metadata entry below `root`.
///
/// Returns the number of entries removed.
pub fn strip_vcs_metadata(root: &Path) -> Result<usize> {
    let doomed: Vec<_> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !VCS_METADATA.iter().any(|m| e.file_name() == *m) || e.depth() == 0)
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_dir())
        .flat_map(|e| {
            VCS_METADATA
                .iter()
                .map(move |m| e.path().join(m))
                .collect::<Vec<_>>()
        })
        .filter(|p| p.symlink_metadata().is_ok())
        .collect();

    for path in &doomed {
        remove_path(path)?;
    }
    Ok(doomed.len())
}

/// Create `dir` recursively and hand it to the configured owner.
pub fn ensure_dir(dir: &Path, ownership: &Ownership) -> Result<()> {
    if !dir.exists() {
        log::info!("Creating {}", dir.display());
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    apply_ownership(dir, ownership, false)
}

/// Apply ownership to `path`, recursing into it when `recursive` is set.
pub fn apply_ownership(path: &Path, ownership: &Ownership, recursive: bool) -> Result<()> {
    if ownership.is_unchanged() {
        return Ok(());
    }

    let (uid, gid) = resolve_ids(ownership)?;
    let walker = WalkDir::new(path)
        .follow_links(false)
        .max_depth(if recursive { usize::MAX } else { 0 });

    for entry in walker {
        let entry = entry?;
        chown(entry.path(), uid, gid)?;
    }
    Ok(())
}

#[cfg(unix)]
fn chown(path: &Path, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
    std::os::unix::fs::lchown(path, uid, gid).map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn chown(_path: &Path, _uid: Option<u32>, _gid: Option<u32>) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn resolve_ids(ownership: &Ownership) -> Result<(Option<u32>, Option<u32>)> {
    let uid = ownership.user.as_deref().map(lookup_user).transpose()?;
    let gid = ownership.group.as_deref().map(lookup_group).transpose()?;
    Ok((uid, gid))
}

#[cfg(not(unix))]
fn resolve_ids(_ownership: &Ownership) -> Result<(Option<u32>, Option<u32>)> {
    Ok((None, None))
}

#[cfg(unix)]
fn lookup_user(name: &str) -> Result<u32> {
    if let Ok(uid) = name.parse::<u32>() {
        return Ok(uid);
    }
    let unknown = || Error::UnknownPrincipal {
        kind: "user",
        name: name.to_string(),
    };
    let c_name = std::ffi::CString::new(name).map_err(|_| unknown())?;

    // SAFETY: getpwnam returns NULL or a pointer to static storage that stays
    // valid until the next getpw* call; we copy pw_uid out immediately.
    let uid = unsafe {
        let pw = libc::getpwnam(c_name.as_ptr());
        if pw.is_null() {
            None
        } else {
            Some((*pw).pw_uid)
        }
    };
    uid.ok_or_else(unknown)
}

#[cfg(unix)]
fn lookup_group(name: &str) -> Result<u32> {
    if let Ok(gid) = name.parse::<u32>() {
        return Ok(gid);
    }
    let unknown = || Error::UnknownPrincipal {
        kind: "group",
        name: name.to_string(),
    };
    let c_name = std::ffi::CString::new(name).map_err(|_| unknown())?;

    // SAFETY: same contract as getpwnam above.
    let gid = unsafe {
        let gr = libc::getgrnam(c_name.as_ptr());
        if gr.is_null() {
            None
        } else {
            Some((*gr).gr_gid)
        }
    };
    gid.ok_or_else(unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_dir_nested() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/file.txt"), "hello").unwrap();

        let dest = tempfile::tempdir().unwrap();
        let target = dest.path().join("copy");
        copy_dir(src.path(), &target).unwrap();

        assert_eq!(
            fs::read_to_string(target.join("a/b/file.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_move_dir_replaces_existing() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        let dest = root.path().join("dest");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("new.txt"), "new").unwrap();
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.txt"), "stale").unwrap();

        move_dir(&src, &dest).unwrap();

        assert!(!src.exists());
        assert!(dest.join("new.txt").is_file());
        assert!(!dest.join("stale.txt").exists());
    }

    #[test]
    fn test_strip_vcs_metadata() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join(".git/objects")).unwrap();
        fs::create_dir_all(root.path().join("vendored/.git")).unwrap();
        fs::write(root.path().join(".gitmodules"), "").unwrap();
        fs::write(root.path().join("vendored/keep.py"), "").unwrap();

        let removed = strip_vcs_metadata(root.path()).unwrap();

        assert_eq!(removed, 3);
        assert!(!root.path().join(".git").exists());
        assert!(!root.path().join("vendored/.git").exists());
        assert!(root.path().join("vendored/keep.py").is_file());
    }

    #[test]
    fn test_ensure_dir_creates_recursively() {
        let root = tempfile::tempdir().unwrap();
        let deep = root.path().join("opt/host/addons");
        ensure_dir(&deep, &Ownership::unchanged()).unwrap();
        assert!(deep.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_unknown_user_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let ownership = Ownership {
            user: Some("no-such-user-forklift".to_string()),
            group: None,
        };
        let err = apply_ownership(root.path(), &ownership, false).unwrap_err();
        assert!(matches!(err, Error::UnknownPrincipal { kind: "user", .. }));
    }
}
