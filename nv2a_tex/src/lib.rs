//! Texture dumps from RenderDoc captures contain many copies of the same image.
//! nv2a_tex finds the duplicates using an external diff tool
//! and replaces them with symlinks to the first copy.
use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::OnceLock,
};

use log::debug;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FindDuplicatesError {
    #[error("error reading directory {path:?}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error comparing {a:?} and {b:?}")]
    Compare {
        a: PathBuf,
        b: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
#[error("error replacing duplicate {path:?}")]
pub struct ReplaceDuplicateError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Checks if two files of the same size have identical contents.
pub trait FileComparer {
    fn is_identical(&self, a: &Path, b: &Path) -> std::io::Result<bool>;
}

/// A diff executable that exits with status 0 for identical files.
#[derive(Debug, Clone)]
pub struct DiffTool {
    program: PathBuf,
}

impl DiffTool {
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_owned(),
        }
    }
}

impl FileComparer for DiffTool {
    fn is_identical(&self, a: &Path, b: &Path) -> std::io::Result<bool> {
        let status = Command::new(&self.program)
            .args([a, b])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        Ok(status.success())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum TextureFile {
    /// The first file with these contents.
    Unique { path: PathBuf },
    /// A file with the same contents as `original`.
    Duplicate { path: PathBuf, original: PathBuf },
}

struct Texture {
    path: PathBuf,
    size: u64,
}

fn texture_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^EID_\d+_tex\d+-.+").unwrap())
}

/// Check if `name` looks like a dumped texture like `EID_123_tex0-1234.png`.
pub fn is_texture_name(name: &str) -> bool {
    texture_regex().is_match(name)
}

/// Classify the dumped textures in `folder` in file name order.
///
/// Only files with the same size are compared.
/// Symlinks are skipped, so running this again after replacing duplicates finds only unique files.
pub fn find_duplicates<P: AsRef<Path>>(
    folder: P,
    comparer: &dyn FileComparer,
) -> Result<Vec<TextureFile>, FindDuplicatesError> {
    let folder = folder.as_ref();
    let read_dir_error = |source: std::io::Error| FindDuplicatesError::ReadDir {
        path: folder.to_owned(),
        source,
    };

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(read_dir_error)? {
        let entry = entry.map_err(read_dir_error)?;
        // DirEntry::file_type doesn't follow symlinks.
        let file_type = entry.file_type().map_err(read_dir_error)?;
        if file_type.is_symlink() || file_type.is_dir() {
            continue;
        }

        let name = entry.file_name();
        if !is_texture_name(&name.to_string_lossy()) {
            debug!("Skipping {name:?}");
            continue;
        }

        let size = entry.metadata().map_err(read_dir_error)?.len();
        entries.push(Texture {
            path: entry.path(),
            size,
        });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    let mut unique: Vec<Texture> = Vec::new();
    let mut files = Vec::new();
    for texture in entries {
        let mut original = None;
        for candidate in unique.iter().filter(|t| t.size == texture.size) {
            let identical = comparer
                .is_identical(&candidate.path, &texture.path)
                .map_err(|source| FindDuplicatesError::Compare {
                    a: candidate.path.clone(),
                    b: texture.path.clone(),
                    source,
                })?;
            if identical {
                original = Some(candidate.path.clone());
                break;
            }
        }

        match original {
            Some(original) => files.push(TextureFile::Duplicate {
                path: texture.path,
                original,
            }),
            None => {
                files.push(TextureFile::Unique {
                    path: texture.path.clone(),
                });
                unique.push(texture);
            }
        }
    }

    Ok(files)
}

/// Remove `path` and link it to `original` unless `delete` is set.
pub fn replace_duplicate(
    path: &Path,
    original: &Path,
    delete: bool,
) -> Result<(), ReplaceDuplicateError> {
    let replace = || -> std::io::Result<()> {
        std::fs::remove_file(path)?;
        if !delete {
            symlink_file(original, path)?;
        }
        Ok(())
    };
    replace().map_err(|source| ReplaceDuplicateError {
        path: path.to_owned(),
        source,
    })
}

#[cfg(unix)]
fn symlink_file(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink_file(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(original, link)
}
