//! Copies the `pg_worker` binary somewhere the unprivileged user can run it.

use super::BoxError;
use super::fs_utils::open_parent_dir;
use camino::{Utf8Path, Utf8PathBuf};
#[cfg(unix)]
use cap_std::fs::{Permissions, PermissionsExt};
use cap_std::fs_utf8::Dir;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::sync::{Mutex, OnceLock};
use taskboard::worker::shell_escape;

static WORKER_CACHE: OnceLock<Mutex<HashMap<Utf8PathBuf, Utf8PathBuf>>> = OnceLock::new();

pub(super) fn locate_pg_worker_path() -> Option<Utf8PathBuf> {
    crate::test_helpers::locate_pg_worker_path()
}

/// Copies `worker` into the temp directory next to a wrapper script that
/// drops to `nobody` under root. Returns the wrapper path, cached per source.
pub(super) fn prepare_pg_worker(worker: &Utf8Path) -> Result<Utf8PathBuf, BoxError> {
    let cache = WORKER_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    if let Some(prepared) = lock(cache)?.get(worker).cloned() {
        return Ok(prepared);
    }

    let temp_dir = Utf8PathBuf::try_from(std::env::temp_dir()).map_err(|err| {
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("temp directory path is not valid UTF-8: {err}"),
        )) as BoxError
    })?;
    let mut hasher = DefaultHasher::new();
    worker.as_str().hash(&mut hasher);
    let wrapper_path = temp_dir.join(format!(
        "pg_worker_{pid}_{hash:x}",
        pid = std::process::id(),
        hash = hasher.finish()
    ));
    let binary_path = wrapper_path.with_extension("bin");

    let (source_dir, source_name) = open_parent_dir(worker)?;
    let (wrapper_dir, wrapper_name) = open_parent_dir(&wrapper_path)?;
    let (binary_dir, binary_name) = open_parent_dir(&binary_path)?;
    remove_if_present(&wrapper_dir, wrapper_name)?;
    remove_if_present(&binary_dir, binary_name)?;

    source_dir
        .copy(source_name, &binary_dir, binary_name)
        .map_err(|err| Box::new(err) as BoxError)?;
    write_wrapper(&wrapper_dir, wrapper_name, &binary_path)?;

    #[cfg(unix)]
    {
        for (dir, name) in [(&wrapper_dir, wrapper_name), (&binary_dir, binary_name)] {
            dir.set_permissions(name, Permissions::from_mode(0o755))
                .map_err(|err| Box::new(err) as BoxError)?;
        }
    }

    Ok(lock(cache)?
        .entry(worker.to_path_buf())
        .or_insert(wrapper_path)
        .clone())
}

fn lock<T>(cache: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, BoxError> {
    cache.lock().map_err(|err| {
        Box::new(std::io::Error::other(format!(
            "worker cache lock poisoned: {err}"
        ))) as BoxError
    })
}

fn remove_if_present(dir: &Dir, name: &str) -> Result<(), BoxError> {
    match dir.remove_file(name) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(Box::new(err) as BoxError),
    }
}

fn write_wrapper(dir: &Dir, name: &str, binary: &Utf8Path) -> Result<(), BoxError> {
    let quoted = shell_escape(binary.as_str());
    let script = format!(
        concat!(
            "#!/bin/sh\n",
            "if [ \"$(id -u)\" -eq 0 ]; then\n",
            "  exec /usr/sbin/runuser -u nobody -- {worker} \"$@\"\n",
            "fi\n",
            "exec {worker} \"$@\"\n",
        ),
        worker = quoted
    );
    let mut file = dir.create(name).map_err(|err| Box::new(err) as BoxError)?;
    file.write_all(script.as_bytes())
        .map_err(|err| Box::new(err) as BoxError)
}

#[cfg(test)]
mod tests {
    use super::{locate_pg_worker_path, prepare_pg_worker};
    use crate::test_helpers::EnvVarGuard;
    use camino::{Utf8Path, Utf8PathBuf};
    use cap_std::ambient_authority;
    use cap_std::fs_utf8::Dir;
    use rstest::rstest;
    use std::ffi::OsString;
    use std::io::Write;

    fn scratch_dir(prefix: &str) -> Result<Utf8PathBuf, std::io::Error> {
        let base = Utf8PathBuf::try_from(std::env::temp_dir())
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        let name = format!("{prefix}_{}", uuid::Uuid::new_v4());
        Dir::open_ambient_dir(&base, ambient_authority())?.create_dir(&name)?;
        Ok(base.join(name))
    }

    fn fake_worker(dir: &Utf8Path) -> Result<Utf8PathBuf, std::io::Error> {
        let mut file = Dir::open_ambient_dir(dir, ambient_authority())?.create("pg_worker")?;
        file.write_all(b"#!/bin/sh\nexit 0\n")?;
        Ok(dir.join("pg_worker"))
    }

    #[rstest]
    fn cargo_exported_worker_wins_over_path() {
        let exported = fake_worker(&scratch_dir("exported").expect("dir")).expect("worker");
        let on_path = scratch_dir("on_path").expect("dir");
        fake_worker(&on_path).expect("worker");

        let guard = EnvVarGuard::set_many(&[
            (
                OsString::from("CARGO_BIN_EXE_pg_worker"),
                Some(OsString::from(exported.as_str())),
            ),
            (OsString::from("PATH"), Some(OsString::from(on_path.as_str()))),
            (OsString::from("PG_EMBEDDED_WORKER"), None),
        ]);
        let located = locate_pg_worker_path();
        drop(guard);

        assert_eq!(located, Some(exported));
    }

    #[rstest]
    fn prepared_worker_is_cached_and_executable() {
        let source = fake_worker(&scratch_dir("source").expect("dir")).expect("worker");

        let first = prepare_pg_worker(&source).expect("prepare");
        let second = prepare_pg_worker(&source).expect("prepare again");

        assert_eq!(first, second);
        let wrapper = std::fs::read_to_string(first.as_std_path()).expect("wrapper");
        assert!(wrapper.starts_with("#!/bin/sh\n"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(first.as_std_path())
                .expect("metadata")
                .permissions()
                .mode();
            assert_ne!(mode & 0o111, 0, "wrapper mode {mode:o} is not executable");
        }
    }
}
