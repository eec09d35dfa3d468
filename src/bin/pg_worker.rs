//! Runs embedded `PostgreSQL` lifecycle steps on behalf of a root test runner.
//!
//! ```text
//! pg_worker <setup|start|stop> <config-path>
//! ```
//!
//! `config-path` names a JSON [`WorkerPayload`] holding the cluster settings
//! and the environment to apply before `postgresql_embedded` runs. When
//! started as root the worker re-executes itself as `nobody`, because
//! `PostgreSQL` refuses to run with superuser privileges.

#[cfg(unix)]
use camino::{Utf8Path, Utf8PathBuf};
#[cfg(unix)]
use nix::unistd::{Uid, User, initgroups, setgid, setuid};
#[cfg(unix)]
use pg_embedded_setup_unpriv::ambient_dir_and_path;
#[cfg(unix)]
use pg_embedded_setup_unpriv::worker::{PlainSecret, WorkerPayload};
#[cfg(unix)]
use postgresql_embedded::{PostgreSQL, Status};
#[cfg(unix)]
use std::{env, ffi::CString, io::Read, process::Command};
#[cfg(unix)]
use taskboard::worker::shell_escape;
#[cfg(unix)]
use thiserror::Error;

#[cfg(unix)]
const REEXEC_MARKER_ENV: &str = "PG_WORKER_REEXEC";
#[cfg(unix)]
const TRUSTED_PATH: &str = "/usr/sbin:/usr/bin:/sbin:/bin";
#[cfg(unix)]
const UNPRIVILEGED_USER: &str = "nobody";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(unix)]
#[derive(Debug, Error)]
enum WorkerError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("failed to read worker config: {0}")]
    ConfigRead(#[source] BoxError),
    #[error("failed to parse worker config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("settings conversion failed: {0}")]
    Settings(String),
    #[error("runtime init failed: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed to drop privileges: {0}")]
    PrivilegeDrop(String),
    #[error("postgres {operation:?} failed: {message}")]
    Postgres {
        operation: Operation,
        message: String,
    },
}

#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
enum Operation {
    Setup,
    Start,
    Stop,
}

#[cfg(unix)]
impl Operation {
    fn parse(raw: &str) -> Result<Self, WorkerError> {
        match raw {
            "setup" => Ok(Self::Setup),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            other => Err(WorkerError::InvalidArgs(format!(
                "unknown operation '{other}'; expected setup, start, or stop"
            ))),
        }
    }

    fn failed(self, err: &impl std::fmt::Display) -> WorkerError {
        WorkerError::Postgres {
            operation: self,
            message: err.to_string(),
        }
    }
}

#[cfg(unix)]
#[derive(Debug)]
struct Invocation {
    operation: Operation,
    config_path: Utf8PathBuf,
}

#[cfg(unix)]
impl Invocation {
    fn parse(args: &[Utf8PathBuf]) -> Result<Self, WorkerError> {
        match args {
            [_] | [] => Err(WorkerError::InvalidArgs(
                "missing operation argument".to_owned(),
            )),
            [_program, operation] => {
                Operation::parse(operation.as_str())?;
                Err(WorkerError::InvalidArgs(
                    "missing config path argument".to_owned(),
                ))
            }
            [_program, operation, config_path] => Ok(Self {
                operation: Operation::parse(operation.as_str())?,
                config_path: config_path.clone(),
            }),
            [_program, _operation, _config_path, extra, ..] => Err(WorkerError::InvalidArgs(
                format!("unexpected extra argument: {extra}"),
            )),
        }
    }
}

#[cfg(unix)]
fn main() -> Result<(), BoxError> {
    let args = collect_args()?;
    let invocation = Invocation::parse(&args)?;
    reexec_unprivileged(&args)?;
    run(&invocation).map_err(Into::into)
}

#[cfg(not(unix))]
fn main() -> Result<(), BoxError> {
    Err("pg_worker is only supported on Unix platforms".into())
}

#[cfg(unix)]
fn collect_args() -> Result<Vec<Utf8PathBuf>, WorkerError> {
    env::args_os()
        .map(|arg| {
            arg.into_string()
                .map(Utf8PathBuf::from)
                .map_err(|_| WorkerError::InvalidArgs("argument is not valid UTF-8".to_owned()))
        })
        .collect()
}

#[cfg(unix)]
fn run(invocation: &Invocation) -> Result<(), WorkerError> {
    let payload = load_payload(&invocation.config_path)?;
    drop_privileges(UNPRIVILEGED_USER)?;
    let settings = payload
        .settings
        .into_settings()
        .map_err(|err| WorkerError::Settings(err.to_string()))?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(WorkerError::Runtime)?;
    apply_environment(&payload.environment);

    let mut postgres = PostgreSQL::new(settings);
    let operation = invocation.operation;
    runtime.block_on(async move {
        match operation {
            Operation::Setup => {
                postgres.setup().await.map_err(|err| operation.failed(&err))?;
                start_if_stopped(&mut postgres, operation).await
            }
            Operation::Start => {
                start_if_stopped(&mut postgres, operation).await?;
                // The server must outlive this process.
                std::mem::forget(postgres);
                Ok(())
            }
            Operation::Stop => postgres.stop().await.map_err(|err| operation.failed(&err)),
        }
    })
}

#[cfg(unix)]
async fn start_if_stopped(
    postgres: &mut PostgreSQL,
    operation: Operation,
) -> Result<(), WorkerError> {
    if matches!(postgres.status(), Status::Started) {
        return Ok(());
    }
    postgres.start().await.map_err(|err| operation.failed(&err))
}

#[cfg(unix)]
fn reexec_unprivileged(args: &[Utf8PathBuf]) -> Result<(), WorkerError> {
    if !Uid::effective().is_root() || env::var_os(REEXEC_MARKER_ENV).is_some() {
        return Ok(());
    }
    let exe = env::current_exe()
        .map_err(WorkerError::Runtime)?
        .into_os_string()
        .into_string()
        .map(Utf8PathBuf::from)
        .map_err(|_| {
            WorkerError::Runtime(std::io::Error::other("executable path is not valid UTF-8"))
        })?;
    let forwarded = args.iter().skip(1);

    let status = match Command::new("runuser")
        .args(["-u", UNPRIVILEGED_USER, "--"])
        .arg(exe.as_std_path())
        .args(forwarded.clone().map(|arg| arg.as_std_path()))
        .env(REEXEC_MARKER_ENV, "1")
        .env("PATH", TRUSTED_PATH)
        .status()
    {
        Ok(status) => status,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let mut script = format!("{REEXEC_MARKER_ENV}=1 exec {}", shell_escape(exe.as_str()));
            for arg in forwarded {
                script.push(' ');
                script.push_str(&shell_escape(arg.as_str()));
            }
            Command::new("/bin/su")
                .args(["-s", "/bin/sh", UNPRIVILEGED_USER, "-c"])
                .arg(script)
                .env("PATH", TRUSTED_PATH)
                .status()
                .map_err(|su_err| WorkerError::PrivilegeDrop(su_err.to_string()))?
        }
        Err(err) => return Err(WorkerError::PrivilegeDrop(err.to_string())),
    };
    std::process::exit(status.code().unwrap_or(1));
}

#[cfg(unix)]
fn load_payload(path: &Utf8Path) -> Result<WorkerPayload, WorkerError> {
    let bytes = read_file(path).map_err(WorkerError::ConfigRead)?;
    serde_json::from_slice(&bytes).map_err(WorkerError::ConfigParse)
}

#[cfg(unix)]
fn read_file(path: &Utf8Path) -> Result<Vec<u8>, BoxError> {
    let (dir, relative) = ambient_dir_and_path(path)?;
    let mut file = dir.open(relative.as_std_path())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(unix)]
fn drop_privileges(username: &str) -> Result<(), WorkerError> {
    if !Uid::effective().is_root() {
        return Ok(());
    }
    let user = User::from_name(username)
        .map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))?
        .ok_or_else(|| WorkerError::PrivilegeDrop(format!("user '{username}' not found")))?;
    let name = CString::new(user.name.clone())
        .map_err(|err| WorkerError::PrivilegeDrop(format!("invalid user name: {err}")))?;
    initgroups(&name, user.gid).map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))?;
    setgid(user.gid).map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))?;
    setuid(user.uid).map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))?;

    // SAFETY: the worker is single-threaded until the runtime is built.
    unsafe {
        env::set_var("HOME", user.dir);
        env::set_var("USER", &user.name);
        env::set_var("LOGNAME", &user.name);
    }
    Ok(())
}

#[cfg(unix)]
fn apply_environment(environment: &[(String, Option<PlainSecret>)]) {
    for (key, value) in environment {
        // SAFETY: the current-thread runtime has not started any task yet.
        unsafe {
            match value {
                Some(secret) => env::set_var(key, secret.expose()),
                None => env::remove_var(key),
            }
        }
    }
}
