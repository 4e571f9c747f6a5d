use std::path::{Path, PathBuf};

const MARKER_FILE_NAME: &str = "LocalVersion.txt";
const ARCHIVE_FILE_NAME: &str = "Build Zip.zip";
const INSTALL_DIR_NAME: &str = "Build Zip_unzipped";
const EXECUTABLE_NAME: &str = "OverrideClient.exe";
const LOCK_FILE_NAME: &str = "update.lock";

/// Where an installation lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn marker_file(&self) -> PathBuf {
        self.root.join(MARKER_FILE_NAME)
    }

    #[must_use]
    pub fn archive_file(&self) -> PathBuf {
        self.root.join(ARCHIVE_FILE_NAME)
    }

    #[must_use]
    pub fn install_dir(&self) -> PathBuf {
        self.root.join(INSTALL_DIR_NAME)
    }

    #[must_use]
    pub fn executable(&self) -> PathBuf {
        self.install_dir().join(EXECUTABLE_NAME)
    }

    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE_NAME)
    }

    /// Whether the installed executable is present.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.executable().is_file()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::InstallLayout;

    #[test]
    fn file_paths_use_expected_names() {
        let layout = InstallLayout::new("/games/override");

        assert_eq!(
            layout.marker_file(),
            Path::new("/games/override/LocalVersion.txt")
        );
        assert_eq!(
            layout.archive_file(),
            Path::new("/games/override/Build Zip.zip")
        );
        assert_eq!(
            layout.install_dir(),
            Path::new("/games/override/Build Zip_unzipped")
        );
        assert!(
            layout
                .executable()
                .ends_with(Path::new("Build Zip_unzipped").join("OverrideClient.exe"))
        );
    }

    #[test]
    fn is_installed_checks_executable() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let layout = InstallLayout::new(temp.path());
        assert!(!layout.is_installed());

        std::fs::create_dir_all(layout.install_dir()).expect("install dir should be created");
        std::fs::write(layout.executable(), b"MZ").expect("executable should be written");
        assert!(layout.is_installed());
    }
}
