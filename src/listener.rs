use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};

use crate::{find_marker, Paths};

/// Give the child a moment to bind its socket before payloads go out.
const SETTLE_DELAY: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Devices post small batches of log lines, anything bigger is bogus.
const MAX_BODY: usize = 1 << 20;

/// The `log-server` binary running as a child process, its stdout captured
/// into the log file.
pub struct LogServer {
    child: Child,
    log_path: PathBuf,
}

impl LogServer {
    pub async fn spawn(paths: &Paths) -> anyhow::Result<LogServer> {
        tokio::fs::create_dir_all(&paths.config_dir)
            .await
            .context("create config directory")?;

        let log_path = paths.log_file();
        let log_file = std::fs::File::create(&log_path)
            .with_context(|| format!("create log file {}", log_path.display()))?;
        let log_file_err = log_file.try_clone().context("clone log file handle")?;

        let sink = std::env::current_exe()
            .context("locate own executable")?
            .with_file_name("log-server");

        let child = Command::new(&sink)
            .env("PS5_LOG_PORT", paths.log_port.to_string())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_err))
            .spawn()
            .with_context(|| format!("spawn log server {}", sink.display()))?;

        if let Some(pid) = child.id() {
            log::info!("log server running (pid {pid})");
        }
        tokio::time::sleep(SETTLE_DELAY).await;

        Ok(LogServer { child, log_path })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub async fn terminate(mut self) {
        if let Err(err) = self.child.kill().await {
            log::warn!("couldn't terminate log server: {err:?}");
        }
    }
}

/// Polls the captured log until the firmware marker shows up. `None` means
/// the window expired without the device reporting back.
pub async fn wait_for_marker(
    log_path: &Path,
    timeout: Duration,
) -> anyhow::Result<Option<String>> {
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout {
        match tokio::fs::read_to_string(log_path).await {
            Ok(content) => {
                if let Some(version) = find_marker(&content) {
                    return Ok(Some(version.to_string()));
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err).context("read captured log"),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Ok(None)
}

/// Accept loop for the log sink. Each connection is one HTTP POST to `/log`;
/// body lines go to stdout, which the parent redirects into the log file.
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .with_context(|| format!("bind log sink on port {port}"))?;
    sink_line(&format!("log sink listening on 0.0.0.0:{port}"));

    loop {
        let (stream, peer) = listener.accept().await.context("accept connection")?;
        if let Err(err) = handle_client(stream).await {
            sink_line(&format!("client {peer} failed: {err:?}"));
        }
    }
}

async fn handle_client(stream: TcpStream) -> anyhow::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .await
        .context("read request line")?;

    if !is_log_post(&request_line) {
        write
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await
            .context("write response")?;
        return Ok(());
    }

    let mut content_length = None;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).await.context("read header")? == 0 {
            break;
        }
        let header = header.trim();
        if header.is_empty() {
            break;
        }
        if let Some(value) = header.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = Some(
                value
                    .trim()
                    .parse::<usize>()
                    .context("parse content-length")?,
            );
        }
    }

    let body = match content_length {
        Some(len) if len > MAX_BODY => anyhow::bail!("body of {len} bytes exceeds limit"),
        Some(len) => {
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body).await.context("read body")?;
            body
        }
        // No content-length, the device just streams and closes.
        None => {
            let mut body = Vec::new();
            reader
                .take(MAX_BODY as u64)
                .read_to_end(&mut body)
                .await
                .context("read body")?;
            body
        }
    };

    for line in String::from_utf8_lossy(&body).lines() {
        if !line.trim().is_empty() {
            sink_line(line);
        }
    }

    write
        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
        .await
        .context("write response")?;
    Ok(())
}

/// Only `POST /log` carries device output, anything else gets a 404.
fn is_log_post(request_line: &str) -> bool {
    let mut parts = request_line.split_whitespace();
    parts.next() == Some("POST")
        && parts
            .next()
            .map_or(false, |path| path == "/log" || path.starts_with("/log?"))
}

fn sink_line(line: &str) {
    println!("[{}] {}", Local::now().format("%H:%M:%S"), line);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{is_log_post, wait_for_marker};

    #[test]
    fn only_log_posts_are_accepted() {
        assert!(is_log_post("POST /log HTTP/1.1\r\n"));
        assert!(is_log_post("POST /log?src=ps5 HTTP/1.1\r\n"));
        assert!(!is_log_post("GET /log HTTP/1.1\r\n"));
        assert!(!is_log_post("POST /other HTTP/1.1\r\n"));
        assert!(!is_log_post("\r\n"));
    }

    #[tokio::test]
    async fn marker_already_in_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log_server.log");
        tokio::fs::write(&path, "[12:00:00] booted\n[12:00:03] FW_VERSION:9.60\n")
            .await
            .unwrap();

        let version = wait_for_marker(&path, Duration::from_secs(5)).await.unwrap();
        assert_eq!(version.as_deref(), Some("9.60"));
    }

    #[tokio::test]
    async fn expired_window_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log_server.log");

        let version = wait_for_marker(&path, Duration::ZERO).await.unwrap();
        assert_eq!(version, None);
    }
}
