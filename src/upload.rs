use std::io::Write;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use ssh2::{CheckResult, KnownHostFileKind, Session};

use crate::config::SftpSettings;

/// Remote path for `local` inside `remote_dir`.
pub fn remote_path(remote_dir: &str, local: &Path) -> anyhow::Result<PathBuf> {
    let name = local
        .file_name()
        .with_context(|| format!("{} has no file name", local.display()))?;
    Ok(Path::new(remote_dir).join(name))
}

/// Pushes `local` to the configured SFTP directory. Blocking; run it off the async runtime.
pub fn upload(settings: &SftpSettings, local: &Path) -> anyhow::Result<PathBuf> {
    let contents =
        std::fs::read(local).with_context(|| format!("failed to read {}", local.display()))?;
    let target = remote_path(&settings.remote_dir, local)?;

    let tcp = TcpStream::connect((settings.host.as_str(), settings.port))
        .with_context(|| format!("failed to reach {}:{}", settings.host, settings.port))?;
    let mut session = Session::new().context("failed to start ssh session")?;
    session.set_tcp_stream(tcp);
    session.handshake().context("ssh handshake failed")?;

    verify_host_key(&session, settings)?;

    session
        .userauth_password(&settings.user, &settings.password)
        .with_context(|| format!("sftp login failed for {}", settings.user))?;
    if !session.authenticated() {
        bail!("sftp server rejected credentials for {}", settings.user);
    }
    tracing::info!(host = %settings.host, "SFTP connection established");

    let sftp = session.sftp().context("failed to open sftp channel")?;
    let mut remote = sftp
        .create(&target)
        .with_context(|| format!("failed to create {}", target.display()))?;
    remote
        .write_all(&contents)
        .with_context(|| format!("failed to write {}", target.display()))?;

    Ok(target)
}

fn verify_host_key(session: &Session, settings: &SftpSettings) -> anyhow::Result<()> {
    let mut known_hosts = session.known_hosts().context("failed to init known hosts")?;
    known_hosts
        .read_file(&settings.known_hosts, KnownHostFileKind::OpenSSH)
        .with_context(|| format!("failed to read {}", settings.known_hosts.display()))?;

    let (key, _) = session
        .host_key()
        .context("sftp server did not present a host key")?;

    match known_hosts.check_port(&settings.host, settings.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => bail!(
            "host key for {} is not in {}",
            settings.host,
            settings.known_hosts.display()
        ),
        CheckResult::Mismatch => bail!(
            "host key for {} does not match {}",
            settings.host,
            settings.known_hosts.display()
        ),
        CheckResult::Failure => bail!("failed to check host key for {}", settings.host),
    }
}
