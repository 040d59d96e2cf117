//! Destination resolution and working-area moves
//!
//! Maps a fetched item's content category to a destination root, sanitizes
//! the title into a filesystem-safe name, and moves the working-area file
//! into a collision-free final path. The working-area file is matched by
//! source-identifier substring plus exact extension; zero or multiple
//! candidates are a [`MoveError`], never a guess.
//!
//! The uniqueness check is per-job. Two concurrent jobs that sanitize to the
//! same destination filename race check-then-move, and the later move wins.
//! This is accepted, documented behavior.

use crate::config::DirectoryConfig;
use crate::error::MoveError;
use crate::types::{ContentCategory, FetchedItem};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving destination collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Where a fetched item came from, which decides its destination layout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Chat attachment: destination partitioned by content category
    Attachment,
    /// Video link: single flat destination root
    Link,
}

/// Maps content categories to destination roots and performs moves
#[derive(Clone, Debug)]
pub struct DestinationResolver {
    video_dir: PathBuf,
    audio_dir: PathBuf,
    photo_dir: PathBuf,
    document_dir: PathBuf,
    other_dir: PathBuf,
    link_dir: PathBuf,
}

impl DestinationResolver {
    /// Build the resolver from the configured directory layout
    pub fn new(dirs: &DirectoryConfig) -> Self {
        Self {
            video_dir: dirs.video_dir(),
            audio_dir: dirs.audio_dir(),
            photo_dir: dirs.photo_dir(),
            document_dir: dirs.document_dir(),
            other_dir: dirs.other_dir(),
            link_dir: dirs.link_dest_dir(),
        }
    }

    /// The destination root for an item of the given origin and category
    pub fn root_for(&self, origin: Origin, category: ContentCategory) -> &Path {
        match origin {
            Origin::Link => &self.link_dir,
            Origin::Attachment => match category {
                ContentCategory::Video => &self.video_dir,
                ContentCategory::Audio => &self.audio_dir,
                ContentCategory::Photo => &self.photo_dir,
                ContentCategory::Document => &self.document_dir,
                ContentCategory::Other => &self.other_dir,
            },
        }
    }

    /// Build the candidate final path for an item
    ///
    /// Deterministic: identical inputs always produce the same candidate.
    /// Collisions with existing files are resolved later, at move time.
    pub fn resolve(
        &self,
        origin: Origin,
        category: ContentCategory,
        title: &str,
        extension: &str,
    ) -> PathBuf {
        let name = sanitize_title(title);
        self.root_for(origin, category)
            .join(format!("{name}.{extension}"))
    }

    /// Move a fetched item's working-area file into its final destination
    ///
    /// The working area is scanned for files whose name contains the item's
    /// source identifier with the exact declared extension; exactly one
    /// candidate must match. The destination name gets a ` (n)` suffix if the
    /// candidate path already exists at move time.
    ///
    /// On failure after fetch, the working-area file is left in place.
    pub async fn move_item(
        &self,
        origin: Origin,
        item: &FetchedItem,
    ) -> Result<PathBuf, MoveError> {
        let source = find_working_file(&item.working_dir, &item.source_id, &item.extension)?;
        let candidate = self.resolve(origin, item.category, &item.title, &item.extension);
        let dest = unique_path(&candidate)?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MoveError::MoveFailed {
                    source_path: source.clone(),
                    dest_path: dest.clone(),
                    reason: e.to_string(),
                })?;
        }

        match tokio::fs::rename(&source, &dest).await {
            Ok(()) => Ok(dest),
            // Cross-device rename fails with EXDEV; fall back to copy + delete
            Err(_) => {
                tokio::fs::copy(&source, &dest)
                    .await
                    .map_err(|e| MoveError::MoveFailed {
                        source_path: source.clone(),
                        dest_path: dest.clone(),
                        reason: e.to_string(),
                    })?;
                if let Err(e) = tokio::fs::remove_file(&source).await {
                    tracing::warn!(
                        source = %source.display(),
                        error = %e,
                        "moved by copy but could not remove working-area file"
                    );
                }
                Ok(dest)
            }
        }
    }
}

/// Replace filesystem-unsafe characters with `_` and collapse whitespace
///
/// Deterministic: `"A/B: C"` becomes `"A_B_ C"` on every call.
pub fn sanitize_title(title: &str) -> String {
    const UNSAFE: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    let replaced: String = title
        .chars()
        .map(|c| {
            if UNSAFE.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Collapse whitespace runs to a single space and trim the ends
    let mut out = String::with_capacity(replaced.len());
    let mut last_was_space = true;
    for c in replaced.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }

    if out.is_empty() {
        "untitled".to_string()
    } else {
        out
    }
}

/// Find the single working-area file matching the source id and extension
///
/// Matching is by source-identifier substring in the filename plus exact
/// extension. Zero matches or more than one are reported as errors.
pub fn find_working_file(
    working_dir: &Path,
    source_id: &str,
    extension: &str,
) -> Result<PathBuf, MoveError> {
    if source_id.is_empty() {
        return Err(MoveError::SourceMissing {
            source_id: source_id.to_string(),
            extension: extension.to_string(),
        });
    }

    let entries = std::fs::read_dir(working_dir).map_err(|_| MoveError::SourceMissing {
        source_id: source_id.to_string(),
        extension: extension.to_string(),
    })?;

    let mut matches: Vec<PathBuf> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == extension);
        let id_matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains(source_id));
        if ext_matches && id_matches {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(MoveError::SourceMissing {
            source_id: source_id.to_string(),
            extension: extension.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        n => Err(MoveError::AmbiguousSource {
            source_id: source_id.to_string(),
            count: n,
        }),
    }
}

/// Produce a destination path that does not exist at the time of the check
///
/// Appends ` (1)`, ` (2)`, ... to the file stem until an unused name is
/// found. The check is not atomic with the move; concurrent jobs can still
/// race to the same name (accepted last-write-wins).
fn unique_path(path: &Path) -> Result<PathBuf, MoveError> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");
    let extension = path.extension().and_then(|e| e.to_str());
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let name = match extension {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(MoveError::Collision {
        path: path.to_path_buf(),
        reason: format!("no unique filename after {MAX_RENAME_ATTEMPTS} attempts"),
    })
}
