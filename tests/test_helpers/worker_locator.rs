//! Finds the `pg_worker` binary used when the test runner is root.

use camino::Utf8PathBuf;
use std::env;
use std::ffi::OsStr;

const WORKER_NAME: &str = if cfg!(windows) {
    "pg_worker.exe"
} else {
    "pg_worker"
};

/// Returns the worker binary, checking in order: the path Cargo exports for
/// integration tests, `PG_EMBEDDED_WORKER`, `~/.cargo/bin`, the target
/// directory next to the running test, then `PATH`.
pub fn locate_pg_worker_path() -> Option<Utf8PathBuf> {
    env::var_os("CARGO_BIN_EXE_pg_worker")
        .and_then(|path| utf8(&path))
        .or_else(from_worker_env)
        .or_else(in_cargo_bin)
        .or_else(near_target)
        .or_else(in_path)
}

fn from_worker_env() -> Option<Utf8PathBuf> {
    let configured = utf8(&env::var_os("PG_EMBEDDED_WORKER")?)?;
    (configured.file_stem() == Some("pg_worker") && configured.is_file()).then_some(configured)
}

fn in_cargo_bin() -> Option<Utf8PathBuf> {
    let home = env::var_os("HOME").or_else(|| env::var_os("USERPROFILE"))?;
    let candidate = utf8(&home)?.join(".cargo").join("bin").join(WORKER_NAME);
    candidate.is_file().then_some(candidate)
}

fn near_target() -> Option<Utf8PathBuf> {
    let test_exe = utf8(env::current_exe().ok()?.as_os_str())?;
    let candidate = test_exe.parent()?.parent()?.join(WORKER_NAME);
    candidate.is_file().then_some(candidate)
}

fn in_path() -> Option<Utf8PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .filter_map(|entry| utf8(entry.as_os_str()))
        .map(|dir| dir.join(WORKER_NAME))
        .find(|candidate| candidate.is_file())
}

fn utf8(value: &OsStr) -> Option<Utf8PathBuf> {
    value.to_str().map(Utf8PathBuf::from)
}
