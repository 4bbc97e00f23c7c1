use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Sends a payload file verbatim to the device. No framing, the device reads
/// until the connection closes.
pub async fn send_file(path: &Path, addr: SocketAddr) -> anyhow::Result<usize> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("read payload {}", path.display()))?;

    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connect to device at {addr}"))?;
    stream.write_all(&data).await.context("send payload bytes")?;
    stream.shutdown().await.context("close payload stream")?;

    log::info!("sent {} bytes to {}", data.len(), addr);
    Ok(data.len())
}

/// Points the `LOG_SERVER` assignment inside the payload at this machine so
/// the device posts its log lines back to our sink.
pub fn rewrite_log_server(js: &str, host: IpAddr, port: u16) -> String {
    let assignment = format!(r#"LOG_SERVER = "http://{host}:{port}/log""#);
    let re = lazy_regex::regex!(r#"LOG_SERVER\s*=\s*["'][^"']*["']"#);
    re.replace_all(js, assignment.as_str()).into_owned()
}

/// Rewrites the payload on disk, leaving the original untouched. The rewritten
/// copy lands next to it with a `.tmp` suffix.
pub async fn rewrite_log_server_file(
    path: &Path,
    host: IpAddr,
    port: u16,
) -> anyhow::Result<PathBuf> {
    let js = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read payload {}", path.display()))?;

    let mut rewritten_path = path.as_os_str().to_owned();
    rewritten_path.push(".tmp");
    let rewritten_path = PathBuf::from(rewritten_path);

    tokio::fs::write(&rewritten_path, rewrite_log_server(&js, host, port))
        .await
        .with_context(|| format!("write rewritten payload {}", rewritten_path.display()))?;

    Ok(rewritten_path)
}

/// Let the kernel pick the outbound interface for a public destination.
/// No packets are sent, the socket is only connected.
pub fn local_ip() -> std::io::Result<IpAddr> {
    let sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    sock.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
    sock.local_addr().map(|addr| addr.ip())
}
