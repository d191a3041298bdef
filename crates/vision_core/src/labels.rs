//! Ground-truth label sets and folder collection.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ground-truth class of a labeled image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelClass {
    Normal,
    Abnormal,
}

impl fmt::Display for LabelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LabelClass::Normal => "normal",
            LabelClass::Abnormal => "abnormal",
        })
    }
}

/// Ordered list of image paths sharing one ground-truth class.
///
/// Membership is not checked against the other set; a base name present
/// in both sets is scored under each of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledImageSet {
    pub class: LabelClass,
    pub paths: Vec<PathBuf>,
}

impl LabeledImageSet {
    pub fn new(class: LabelClass, paths: Vec<PathBuf>) -> Self {
        Self { class, paths }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Options controlling how folder collection behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// When true, collect from subdirectories recursively.
    pub recursive: bool,
}

/// Collect the supported images in a folder, sorted by path.
pub fn collect_images(path: impl AsRef<Path>, opts: ScanOptions) -> Result<Vec<PathBuf>> {
    let root = path.as_ref();
    if !root.exists() {
        anyhow::bail!("Path does not exist: {}", root.display());
    }
    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }

    let walker = if opts.recursive {
        WalkDir::new(root).into_iter()
    } else {
        WalkDir::new(root).max_depth(1).into_iter()
    };

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("walkdir error: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if path.is_file() && is_supported_image(path) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    tracing::debug!("collected {} images from {}", files.len(), root.display());
    Ok(files)
}

/// Expand a mix of image files and folders into a flat image list.
///
/// Folders are collected non-recursively unless `opts` says otherwise;
/// plain files are kept as given, in argument order.
pub fn expand_inputs<P: AsRef<Path>>(inputs: &[P], opts: ScanOptions) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            files.extend(collect_images(input, opts)?);
        } else if input.is_file() {
            files.push(input.to_path_buf());
        } else {
            anyhow::bail!("Path does not exist: {}", input.display());
        }
    }
    Ok(files)
}

pub(crate) fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "bmp")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn collect_images_empty_returns_empty() -> Result<()> {
        let dir = tempdir()?;
        let rows = collect_images(dir.path(), ScanOptions::default())?;
        assert!(rows.is_empty());
        Ok(())
    }

    #[test]
    fn collect_images_lists_only_images_non_recursive() -> Result<()> {
        let dir = tempdir()?;
        File::create(dir.path().join("c.png"))?;
        File::create(dir.path().join("a.JPG"))?;
        File::create(dir.path().join("b.jpeg"))?;
        File::create(dir.path().join("d.bmp"))?;
        File::create(dir.path().join("scores.csv"))?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        File::create(nested.join("e.jpg"))?;

        let files: Vec<String> = collect_images(dir.path(), ScanOptions { recursive: false })?
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(files, vec!["a.JPG", "b.jpeg", "c.png", "d.bmp"]);
        Ok(())
    }

    #[test]
    fn collect_images_descends_when_recursive() -> Result<()> {
        let dir = tempdir()?;
        File::create(dir.path().join("a.jpg"))?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        File::create(nested.join("b.PNG"))?;

        let rows = collect_images(dir.path(), ScanOptions { recursive: true })?;
        assert_eq!(rows.len(), 2);
        Ok(())
    }

    #[test]
    fn collect_images_rejects_missing_folder() {
        let err = collect_images("/definitely/not/here", ScanOptions::default()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn expand_inputs_keeps_files_and_expands_folders() -> Result<()> {
        let dir = tempdir()?;
        let folder = dir.path().join("normal");
        fs::create_dir(&folder)?;
        File::create(folder.join("b.jpg"))?;
        File::create(folder.join("a.jpg"))?;
        let single = dir.path().join("z.png");
        File::create(&single)?;

        let files = expand_inputs(&[single.clone(), folder.clone()], ScanOptions::default())?;
        assert_eq!(files, vec![single, folder.join("a.jpg"), folder.join("b.jpg")]);
        Ok(())
    }
}
