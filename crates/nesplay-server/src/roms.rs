//! ROM directory scanning.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, warn};

use crate::error::ServerError;

/// One `*.nes` file found in the ROM directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RomEntry {
    /// File name, as requested under `/roms/`.
    pub name: String,
    /// Full path on disk.
    pub path: PathBuf,
}

/// The ROM directory and the games found in it at startup.
#[derive(Clone, Debug)]
pub struct RomLibrary {
    dir: PathBuf,
    roms: Vec<RomEntry>,
}

impl RomLibrary {
    /// Scan `dir` for `*.nes` files (non-recursive, case-sensitive).
    pub fn scan(dir: &Path) -> Result<Self, ServerError> {
        if !dir.exists() {
            return Err(ServerError::RomDirMissing(dir.to_path_buf()));
        }
        if !dir.is_dir() {
            return Err(ServerError::RomDirNotDirectory(dir.to_path_buf()));
        }

        let pattern = format!("{}/*.nes", Pattern::escape(&dir.to_string_lossy()));
        let mut roms = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(error) => {
                    warn!(%error, "skipping unreadable rom entry");
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            roms.push(RomEntry { name, path });
        }
        roms.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(dir = %dir.display(), count = roms.len(), "rom directory scanned");

        Ok(Self {
            dir: dir.to_path_buf(),
            roms,
        })
    }

    /// The scanned directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Games in name order.
    pub fn roms(&self) -> &[RomEntry] {
        &self.roms
    }

    /// Game file names in name order.
    pub fn names(&self) -> Vec<String> {
        self.roms.iter().map(|rom| rom.name.clone()).collect()
    }

    /// Number of games.
    pub fn len(&self) -> usize {
        self.roms.len()
    }

    /// Whether no games were found.
    pub fn is_empty(&self) -> bool {
        self.roms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"NES\x1a").unwrap();
    }

    #[test]
    fn finds_only_nes_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "zelda.nes");
        touch(dir.path(), "contra.nes");
        touch(dir.path(), "readme.txt");
        touch(dir.path(), "upper.NES");
        std::fs::create_dir(dir.path().join("nested.nes")).unwrap();

        let library = RomLibrary::scan(dir.path()).unwrap();
        assert_eq!(library.names(), vec!["contra.nes", "zelda.nes"]);
        assert_eq!(library.roms()[0].path, dir.path().join("contra.nes"));
        assert_eq!(library.dir(), dir.path());
    }

    #[test]
    fn empty_directory_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let library = RomLibrary::scan(dir.path()).unwrap();
        assert!(library.is_empty());
        assert_eq!(library.len(), 0);
    }

    #[test]
    fn directory_with_glob_metacharacters() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("games [usa]");
        std::fs::create_dir(&dir).unwrap();
        touch(&dir, "mario.nes");

        let library = RomLibrary::scan(&dir).unwrap();
        assert_eq!(library.names(), vec!["mario.nes"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            RomLibrary::scan(&missing),
            Err(ServerError::RomDirMissing(_))
        ));
    }

    #[test]
    fn file_instead_of_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "single.nes");
        assert!(matches!(
            RomLibrary::scan(&dir.path().join("single.nes")),
            Err(ServerError::RomDirNotDirectory(_))
        ));
    }
}
