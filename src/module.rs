use crate::environment::Environment;
use crate::error::{module_error, Result};
use crate::pipeline::{run_with_imports, RunOptions};
use log::{debug, info, warn};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub const GOR_EXTENSION: &str = "gor";

/// Directory tried once when a module is not found where it was asked for.
pub const FALLBACK_DIR: &str = "scripts";

/// Give `path` the `.gor` extension if it has none. Returns `None` for a
/// path with any other extension.
pub fn gor_path(mut path: PathBuf) -> Option<PathBuf> {
    match path.extension() {
        None => {
            path.set_extension(GOR_EXTENSION);
            Some(path)
        }
        Some(extension) if extension == GOR_EXTENSION => Some(path),
        Some(_) => None,
    }
}

/// Resolve a `use` path against the directory of the importing file.
pub fn resolve_module_path(importer: &Path, raw: &str) -> Result<PathBuf> {
    let base = importer.parent().unwrap_or_else(|| Path::new(""));
    let joined = base.join(raw);

    match gor_path(joined.clone()) {
        Some(path) => Ok(path),
        None => module_error(format!("path '{}' is not a Gor file", joined.display())),
    }
}

pub fn fallback_path(root: &Path, path: &Path) -> PathBuf {
    root.join(path)
}

pub fn canonical_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Run the module at `path` in a fresh environment and return its bindings.
pub fn import_module(path: &Path, allow_fallback: bool, options: &RunOptions) -> Result<Environment> {
    let fallback = allow_fallback.then(|| Path::new(FALLBACK_DIR));
    load_module(path, fallback, options, &[])
}

// `fallback` is the directory retried once when `path` does not exist.
// `chain` holds the canonical paths of the files currently executing.
pub(crate) fn load_module(
    path: &Path,
    fallback: Option<&Path>,
    options: &RunOptions,
    chain: &[PathBuf],
) -> Result<Environment> {
    let (path, source) = match (read_module(path)?, fallback) {
        (Some(source), _) => (path.to_path_buf(), source),
        (None, Some(root)) => {
            let fallback = fallback_path(root, path);
            warn!(
                "module '{}' not found, retrying as '{}'",
                path.display(),
                fallback.display()
            );

            match read_module(&fallback)? {
                Some(source) => (fallback, source),
                None => return module_error(format!("module '{}' does not exist", path.display())),
            }
        }
        (None, None) => {
            return module_error(format!("module '{}' does not exist", path.display()))
        }
    };

    let canonical = canonical_path(&path);
    if chain.contains(&canonical) {
        let cycle = chain
            .iter()
            .skip_while(|file| **file != canonical)
            .chain(std::iter::once(&canonical))
            .map(|file| file.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        return module_error(format!("import cycle detected: {}", cycle));
    }

    info!("importing module '{}'", path.display());
    let env = run_with_imports(&source, &path, &options.for_import(), chain)?;
    debug!(
        "module '{}' exported {} variables",
        path.display(),
        env.variables().len()
    );

    Ok(env)
}

fn read_module(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(source) => Ok(Some(source)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pipeline::run;
    use crate::runtime::Value;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_gor_path() {
        assert_eq!(
            gor_path(PathBuf::from("lib")),
            Some(PathBuf::from("lib.gor"))
        );
        assert_eq!(
            gor_path(PathBuf::from("dir/lib.gor")),
            Some(PathBuf::from("dir/lib.gor"))
        );
        assert_eq!(gor_path(PathBuf::from("lib.txt")), None);
    }

    #[test]
    fn test_resolve_module_path() -> Result<()> {
        assert_eq!(
            resolve_module_path(Path::new("project/main.gor"), "util/strings")?,
            PathBuf::from("project/util/strings.gor")
        );
        assert_eq!(
            resolve_module_path(Path::new("main.gor"), "lib")?,
            PathBuf::from("lib.gor")
        );
        assert!(matches!(
            resolve_module_path(Path::new("main.gor"), "lib.rs"),
            Err(Error::Module { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_fallback_path() {
        assert_eq!(
            fallback_path(Path::new(FALLBACK_DIR), Path::new("project/lib.gor")),
            PathBuf::from("scripts/project/lib.gor")
        );
    }

    #[test]
    fn test_missing_module_retries_under_fallback() -> Result<()> {
        let root = tempdir()?;
        fs::write(root.path().join("only_in_fallback.gor"), "found <- true ;")?;
        let path = Path::new("only_in_fallback.gor");

        let env = load_module(path, Some(root.path()), &RunOptions::default(), &[])?;
        assert_eq!(env.variable("found"), Some(&Value::Boolean(true)));

        match load_module(path, None, &RunOptions::default(), &[]) {
            Err(Error::Module { message }) => assert!(message.contains("does not exist")),
            other => panic!("expected module error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_read_errors_do_not_retry() -> Result<()> {
        // `src` is a directory in the package root, so reading it fails with
        // something other than not-found. A retry would find this file.
        let root = tempdir()?;
        fs::write(root.path().join("src"), "x <- 1 ;")?;

        let result = load_module(
            Path::new("src"),
            Some(root.path()),
            &RunOptions::default(),
            &[],
        );
        assert!(matches!(result, Err(Error::IO(_))));
        Ok(())
    }

    #[test]
    fn test_use_merges_bindings() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("util"))?;
        fs::write(
            dir.path().join("util").join("greet.gor"),
            "greeting <- \"hello\" ;\nshared <- 1 ;\n",
        )?;

        let main = dir.path().join("main.gor");
        let env = run(
            "shared <- 0 ;\nuse \"util/greet\" ;\nmessage <- greeting + \", world\" ;",
            &main,
            &RunOptions::default(),
        )?;

        assert_eq!(
            env.variable("message"),
            Some(&Value::String("hello, world".to_string()))
        );
        assert_eq!(env.variable("shared"), Some(&Value::Int(1)));
        Ok(())
    }

    #[test]
    fn test_import_module_directly() -> Result<()> {
        let dir = tempdir()?;
        let lib = dir.path().join("lib.gor");
        fs::write(&lib, "answer <- 6 * 7 ;")?;

        let env = import_module(&lib, false, &RunOptions::default())?;
        assert_eq!(env.variable("answer"), Some(&Value::Int(42)));
        assert!(env.function("puts").is_some());
        Ok(())
    }

    #[test]
    fn test_missing_module() -> Result<()> {
        let dir = tempdir()?;
        let main = dir.path().join("main.gor");

        match run("use \"absent\" ;", &main, &RunOptions::default()) {
            Err(Error::Module { message }) => assert!(message.contains("does not exist")),
            other => panic!("expected module error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_module_errors_propagate() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("broken.gor"), "x <- y ;")?;
        let main = dir.path().join("main.gor");

        let result = run("use \"broken\" ;", &main, &RunOptions::default());
        assert!(matches!(result, Err(Error::Runtime { .. })));
        Ok(())
    }

    #[test]
    fn test_repeated_import() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("base.gor"), "count <- 1 ;")?;
        fs::write(
            dir.path().join("middle.gor"),
            "use \"base\" ;\nmiddle <- count + 1 ;",
        )?;
        let main = dir.path().join("main.gor");

        let env = run(
            "use \"base\" ;\nuse \"middle\" ;\ntotal <- count + middle ;",
            &main,
            &RunOptions::default(),
        )?;
        assert_eq!(env.variable("total"), Some(&Value::Int(3)));
        Ok(())
    }

    #[test]
    fn test_import_cycle() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.gor"), "use \"b\" ;\na <- 1 ;")?;
        fs::write(dir.path().join("b.gor"), "use \"a\" ;\nb <- 1 ;")?;

        match import_module(&dir.path().join("a.gor"), false, &RunOptions::default()) {
            Err(Error::Module { message }) => {
                assert!(message.contains("import cycle"));
                assert!(message.contains("a.gor"));
            }
            other => panic!("expected module error, got {:?}", other),
        }

        fs::write(dir.path().join("itself.gor"), "use \"itself\" ;")?;
        let result = import_module(&dir.path().join("itself.gor"), false, &RunOptions::default());
        assert!(matches!(result, Err(Error::Module { .. })));
        Ok(())
    }
}
