use std::{
    collections::BTreeSet,
    fs::File,
    io,
    path::{Component, Path, PathBuf},
};

use sha2::{Digest, Sha256};
use shipyard_model::Fingerprint;

/// SHA-256 of one file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub path: PathBuf,
    /// `/`-separated path relative to the artifact root; listed in manifests.
    pub name: String,
    pub hex: String,
    pub size: u64,
}

/// Hash `path`, naming it by its base name.
pub fn sha256_file(path: &Path) -> io::Result<FileDigest> {
    sha256_named(path, relative_name(path, path))
}

fn sha256_named(path: &Path, name: String) -> io::Result<FileDigest> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)?;
    Ok(FileDigest {
        path: path.to_path_buf(),
        name,
        hex: hex::encode(hasher.finalize()),
        size,
    })
}

/// Hash `paths` off the async runtime, naming each relative to `root`.
pub async fn digest_files(root: &Path, paths: Vec<PathBuf>) -> io::Result<Vec<FileDigest>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        paths
            .iter()
            .map(|p| sha256_named(p, relative_name(&root, p)))
            .collect()
    })
    .await
    .map_err(io::Error::other)?
}

/// `path` relative to `root` with `/` separators; the base name when `path` is not below `root`.
pub fn relative_name(root: &Path, path: &Path) -> String {
    if let Ok(rel) = path.strip_prefix(root)
        && rel.components().next().is_some()
        && rel.components().all(|c| matches!(c, Component::Normal(_)))
    {
        return rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
    }
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// First name listed twice, if any.
pub fn duplicate_name(digests: &[FileDigest]) -> Option<&str> {
    let mut seen = BTreeSet::new();
    digests
        .iter()
        .map(|d| d.name.as_str())
        .find(|name| !seen.insert(*name))
}

/// Regular files under `path`, sorted; `path` itself when it is a file.
pub fn collect_files(path: &Path) -> io::Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(path)?;
    if meta.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut out = Vec::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let kind = entry.file_type()?;
            if kind.is_dir() {
                pending.push(entry.path());
            } else if kind.is_file() {
                out.push(entry.path());
            }
        }
    }
    out.sort();
    Ok(out)
}

/// `sha256sum`-compatible manifest.
pub fn checksums(digests: &[FileDigest]) -> String {
    digests
        .iter()
        .map(|d| format!("{}  {}\n", d.hex, d.name))
        .collect()
}

/// Fingerprint of a file set: the file's own digest for one file, the manifest digest otherwise.
pub fn fingerprint(digests: &[FileDigest]) -> Fingerprint {
    match digests {
        [single] => Fingerprint::sha256(&single.hex),
        many => Fingerprint::sha256(hex::encode(Sha256::digest(checksums(many).as_bytes()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha256("hello\n")
    const HELLO: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[test]
    fn hashes_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello\n").unwrap();

        let d = sha256_file(&path).unwrap();
        assert_eq!(d.hex, HELLO);
        assert_eq!(d.size, 6);
        assert_eq!(fingerprint(&[d.clone()]).as_str(), format!("sha256:{HELLO}"));
        assert_eq!(checksums(&[d]), format!("{HELLO}  a.txt\n"));
    }

    #[test]
    fn collects_nested_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b"), "b").unwrap();
        std::fs::write(dir.path().join("sub/a"), "a").unwrap();
        std::fs::write(dir.path().join("a"), "a").unwrap();

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a", "b", "sub/a"]);
    }

    #[tokio::test]
    async fn nested_files_keep_relative_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("linux")).unwrap();
        std::fs::create_dir_all(dir.path().join("darwin")).unwrap();
        std::fs::write(dir.path().join("linux/app"), "elf").unwrap();
        std::fs::write(dir.path().join("darwin/app"), "macho").unwrap();

        let files = collect_files(dir.path()).unwrap();
        let digests = digest_files(dir.path(), files).await.unwrap();
        let names: Vec<_> = digests.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["darwin/app", "linux/app"]);
        assert_eq!(duplicate_name(&digests), None);
        assert!(checksums(&digests).ends_with("  linux/app\n"));
    }

    #[test]
    fn names_outside_root_fall_back_to_base_name() {
        let root = Path::new("/srv/out");
        assert_eq!(relative_name(root, Path::new("/srv/out/a/b")), "a/b");
        assert_eq!(relative_name(root, Path::new("/tmp/c")), "c");
        assert_eq!(relative_name(Path::new("/srv/app"), Path::new("/srv/app")), "app");
    }

    #[test]
    fn duplicate_names_are_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("x")).unwrap();
        std::fs::write(dir.path().join("app"), "1").unwrap();
        std::fs::write(dir.path().join("x/app"), "2").unwrap();
        let digests = vec![
            sha256_file(&dir.path().join("app")).unwrap(),
            sha256_file(&dir.path().join("x/app")).unwrap(),
        ];
        assert_eq!(duplicate_name(&digests), Some("app"));
    }

    #[test]
    fn manifest_fingerprint_depends_on_every_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x"), "1").unwrap();
        std::fs::write(dir.path().join("y"), "2").unwrap();
        let files = collect_files(dir.path()).unwrap();
        let before = fingerprint(&files.iter().map(|p| sha256_file(p).unwrap()).collect::<Vec<_>>());

        std::fs::write(dir.path().join("y"), "3").unwrap();
        let after = fingerprint(&files.iter().map(|p| sha256_file(p).unwrap()).collect::<Vec<_>>());
        assert_ne!(before, after);
    }
}
