use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{}: no such file", path.display())]
    NotFound { path: PathBuf },
    #[error("{}: {error}", path.display())]
    IO {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: PathBuf,
    pub text: String,
}

/// Reads scripts and ROMs relative to a base directory.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    pub base_dir: PathBuf,
}

impl Loader {
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Source, LoadError> {
        let path = self.base_dir.join(path);
        let text = std::fs::read_to_string(&path).map_err(|e| wrap(&path, e))?;
        log::debug!("loaded {} ({} bytes)", path.display(), text.len());
        Ok(Source { path, text })
    }

    pub fn load_rom(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, LoadError> {
        let path = self.base_dir.join(path);
        std::fs::read(&path).map_err(|e| wrap(&path, e))
    }
}

fn wrap(path: &Path, error: std::io::Error) -> LoadError {
    let path = path.to_owned();
    match error.kind() {
        std::io::ErrorKind::NotFound => LoadError::NotFound { path },
        _ => LoadError::IO { path, error },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file() {
        let loader = Loader {
            base_dir: std::env::temp_dir(),
        };
        let err = loader.load("c8s-no-such-script.c8s").unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
        assert!(err.to_string().ends_with("c8s-no-such-script.c8s: no such file"));
    }

    #[test]
    fn reads_relative_to_base_dir() {
        let dir = std::env::temp_dir().join(format!("c8s-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("main.c8s"), "var a = 1\n").unwrap();

        let loader = Loader {
            base_dir: dir.clone(),
        };
        let source = loader.load("main.c8s").unwrap();
        assert_eq!(source.text, "var a = 1\n");
        assert_eq!(source.path, dir.join("main.c8s"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
