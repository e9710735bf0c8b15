use futures::stream::Stream;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// Lowercase extension of `path`, if it has one.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Scans the given root directory recursively for files with one of
/// `extensions` (lowercase, no dot; matched case-insensitively).
///
/// Returns a Stream of PathBufs in walk order.
pub fn scan(root: PathBuf, extensions: HashSet<String>) -> impl Stream<Item = PathBuf> {
    let (tx, rx) = mpsc::channel(100);

    // Spawn a blocking task to perform the synchronous file system traversal
    tokio::task::spawn_blocking(move || {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if extension_of(path).is_some_and(|ext| extensions.contains(&ext)) {
                // Receiver dropped: stop scanning
                if tx.blocking_send(path.to_path_buf()).is_err() {
                    break;
                }
            }
        }
    });

    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|path| (path, rx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::fs::File;
    use tempfile::tempdir;

    fn set(exts: &[&str]) -> HashSet<String> {
        exts.iter().map(|e| e.to_string()).collect()
    }

    #[tokio::test]
    async fn test_scan_matching_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        File::create(root.join("song.mp3")).unwrap();
        File::create(root.join("song.lrc")).unwrap();
        File::create(root.join("notes.txt")).unwrap(); // Should be ignored
        File::create(root.join("UPPERCASE.OGG")).unwrap(); // case-insensitive

        let subdir = root.join("subdir");
        std::fs::create_dir(&subdir).unwrap();
        File::create(subdir.join("track.wav")).unwrap();
        File::create(subdir.join("ignore.doc")).unwrap();

        let paths: Vec<PathBuf> = scan(root.to_path_buf(), set(&["mp3", "ogg", "wav", "lrc"]))
            .collect()
            .await;

        let mut file_names: Vec<String> = paths
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(|s| s.to_string()))
            .collect();
        file_names.sort();

        assert_eq!(
            file_names,
            vec!["UPPERCASE.OGG", "song.lrc", "song.mp3", "track.wav"]
        );
    }

    #[tokio::test]
    async fn test_scan_missing_root_is_empty() {
        let paths: Vec<PathBuf> = scan(PathBuf::from("/nonexistent/tunelight"), set(&["mp3"]))
            .collect()
            .await;
        assert!(paths.is_empty());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("a/B.FLAC")).as_deref(), Some("flac"));
        assert_eq!(extension_of(Path::new("README")), None);
    }
}
