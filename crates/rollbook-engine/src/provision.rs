//! OS account provisioning
//!
//! The pipeline sees accounts through this seam. An account "exists"
//! when its home directory does: name lookups (passwd/NSS) are backed by
//! the same directory the pipeline just finished editing, so they always
//! reflect the post-edit state. The home tree on disk is the thing still
//! carrying pre-edit state, and the thing reconciliation actually moves.
//!
//! [`PosixProvisioner`] is the real implementation: plain filesystem
//! calls, no shelling out. Group comparisons use numeric GIDs (the
//! database's `gidNumber` is authoritative for the category), so nothing
//! here needs name-service lookups.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rollbook_core::category::{Category, ALL_CATEGORIES};

/// A filesystem step of provisioning failed.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("could not {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The target of a home move already exists as a directory.
    #[error("home directory {0} already exists")]
    HomeOccupied(PathBuf),
}

impl ProvisionError {
    fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        ProvisionError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ProvisionError::Io { .. } => "PROVISION_IO",
            ProvisionError::HomeOccupied(_) => "PROVISION_HOME_OCCUPIED",
        }
    }
}

/// The pipeline's view of the OS account layer.
pub trait AccountProvisioner {
    /// Whether a home directory exists on disk.
    fn home_exists(&self, home: &Path) -> bool;

    /// GID owning the home directory, `None` when it does not exist.
    fn home_gid(&self, home: &Path) -> Result<Option<u32>, ProvisionError>;

    /// Create a home directory from the skeleton, owned by `uid:gid`.
    fn create_home(&self, home: &Path, uid: u32, gid: u32) -> Result<(), ProvisionError>;

    /// Move a home directory to a new path (handle rename or category
    /// change).
    fn rename_home(&self, old: &Path, new: &Path) -> Result<(), ProvisionError>;

    /// Recursively hand a home tree to a new primary group. Symlinks are
    /// re-owned themselves, never followed.
    fn chgrp_home(&self, home: &Path, gid: u32) -> Result<(), ProvisionError>;

    /// Remove a home tree. Missing is fine, the outcome is the same.
    fn remove_home(&self, home: &Path) -> Result<(), ProvisionError>;

    /// Every (handle, home directory) present on disk.
    fn list_homes(&self) -> Result<Vec<(String, PathBuf)>, ProvisionError>;
}

/// Real filesystem provisioner.
#[derive(Debug, Clone)]
pub struct PosixProvisioner {
    home_base: PathBuf,
    skel_dir: PathBuf,
}

/// Home directories are `drwx--x--x`: members own their tree, everyone
/// else may only traverse.
const HOME_MODE: u32 = 0o711;

impl PosixProvisioner {
    #[must_use]
    pub fn new(home_base: impl Into<PathBuf>, skel_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_base: home_base.into(),
            skel_dir: skel_dir.into(),
        }
    }

    /// Canonical home path for a handle, anchored at this provisioner's
    /// base directory.
    #[must_use]
    pub fn home_path(&self, category: Category, handle: &str) -> PathBuf {
        rollbook_core::paths::home_directory(&self.home_base, handle, category)
    }
}

impl AccountProvisioner for PosixProvisioner {
    fn home_exists(&self, home: &Path) -> bool {
        home.symlink_metadata().is_ok()
    }

    fn home_gid(&self, home: &Path) -> Result<Option<u32>, ProvisionError> {
        use std::os::unix::fs::MetadataExt;

        match home.symlink_metadata() {
            Ok(meta) => Ok(Some(meta.gid())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ProvisionError::io("stat", home, source)),
        }
    }

    fn create_home(&self, home: &Path, uid: u32, gid: u32) -> Result<(), ProvisionError> {
        use std::os::unix::fs::PermissionsExt;

        if let Some(parent) = home.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ProvisionError::io("create parent of", parent, source))?;
        }
        copy_skel(&self.skel_dir, home, uid, gid)?;
        fs::set_permissions(home, fs::Permissions::from_mode(HOME_MODE))
            .map_err(|source| ProvisionError::io("chmod", home, source))?;
        Ok(())
    }

    fn rename_home(&self, old: &Path, new: &Path) -> Result<(), ProvisionError> {
        match new.symlink_metadata() {
            Ok(meta) if meta.is_dir() => return Err(ProvisionError::HomeOccupied(new.into())),
            // A stray file squatting on the path just gets removed.
            Ok(_) => fs::remove_file(new)
                .map_err(|source| ProvisionError::io("unlink stray", new, source))?,
            Err(_) => {}
        }
        if let Some(parent) = new.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ProvisionError::io("create parent of", parent, source))?;
        }
        fs::rename(old, new).map_err(|source| ProvisionError::io("rename", old, source))
    }

    fn chgrp_home(&self, home: &Path, gid: u32) -> Result<(), ProvisionError> {
        chgrp_tree(home, gid).map_err(|source| ProvisionError::io("chgrp", home, source))
    }

    fn remove_home(&self, home: &Path) -> Result<(), ProvisionError> {
        match fs::remove_dir_all(home) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ProvisionError::io("remove", home, source)),
        }
    }

    fn list_homes(&self) -> Result<Vec<(String, PathBuf)>, ProvisionError> {
        let mut homes = Vec::new();
        for category in ALL_CATEGORIES {
            let dir = self.home_base.join(category.as_str());
            if !dir.is_dir() {
                continue;
            }
            if category.hashed_home() {
                for shard in list_dirs(&dir)? {
                    for home in list_dirs(&shard)? {
                        homes.push((leaf_name(&home), home));
                    }
                }
            } else {
                for home in list_dirs(&dir)? {
                    homes.push((leaf_name(&home), home));
                }
            }
        }
        Ok(homes)
    }
}

/// Copy the skeleton tree to `dst`, chowning every copied entry.
fn copy_skel(src: &Path, dst: &Path, uid: u32, gid: u32) -> Result<(), ProvisionError> {
    copy_tree(src, dst, uid, gid).map_err(|source| ProvisionError::io("populate", dst, source))
}

fn copy_tree(src: &Path, dst: &Path, uid: u32, gid: u32) -> io::Result<()> {
    use std::os::unix::fs::{lchown, symlink};

    let meta = src.symlink_metadata()?;
    let file_type = meta.file_type();
    if file_type.is_dir() {
        fs::create_dir(dst)?;
        fs::set_permissions(dst, meta.permissions())?;
        lchown(dst, Some(uid), Some(gid))?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_tree(&entry.path(), &dst.join(entry.file_name()), uid, gid)?;
        }
    } else if file_type.is_symlink() {
        symlink(fs::read_link(src)?, dst)?;
        lchown(dst, Some(uid), Some(gid))?;
    } else {
        fs::copy(src, dst)?;
        lchown(dst, Some(uid), Some(gid))?;
    }
    Ok(())
}

fn chgrp_tree(path: &Path, gid: u32) -> io::Result<()> {
    use std::os::unix::fs::lchown;

    let meta = path.symlink_metadata()?;
    lchown(path, None, Some(gid))?;
    if meta.file_type().is_dir() {
        for entry in fs::read_dir(path)? {
            chgrp_tree(&entry?.path(), gid)?;
        }
    }
    Ok(())
}

fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>, ProvisionError> {
    let entries =
        fs::read_dir(dir).map_err(|source| ProvisionError::io("list", dir, source))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ProvisionError::io("list", dir, source))?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn leaf_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
