//! Audio file discovery

use crate::config::SUPPORTED_FORMATS;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// True if `path` has one of the supported audio extensions (case-insensitive)
pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            SUPPORTED_FORMATS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// List supported audio files under `dir`, sorted by path.
///
/// Only the top level is scanned unless `recursive` is set.
pub fn discover_audio_files(dir: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Not a directory: {}", dir.display()),
        ));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_supported_audio(e.path()))
        .map(|e| e.into_path())
        .collect();

    files.sort();
    log::info!("Found {} audio file(s) in {:?}", files.len(), dir);
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_audio(Path::new("a.wav")));
        assert!(is_supported_audio(Path::new("a.MP3")));
        assert!(is_supported_audio(Path::new("a.aif")));
        assert!(!is_supported_audio(Path::new("a.flac")));
        assert!(!is_supported_audio(Path::new("noext")));
    }

    #[test]
    fn test_recursive_flag() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.wav"), b"").unwrap();
        fs::write(dir.path().join("a.mp3"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.aiff"), b"").unwrap();

        let flat = discover_audio_files(dir.path(), false).unwrap();
        assert_eq!(
            flat,
            vec![dir.path().join("a.mp3"), dir.path().join("b.wav")]
        );

        let deep = discover_audio_files(dir.path(), true).unwrap();
        assert_eq!(deep.len(), 3);
        assert_eq!(deep[2], dir.path().join("sub").join("c.aiff"));
    }

    #[test]
    fn test_missing_dir_is_error() {
        assert!(discover_audio_files(Path::new("/nonexistent/dir"), false).is_err());
    }
}
