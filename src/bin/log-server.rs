use anyhow::Context;
use ps5_toolset::{listener, DEFAULT_LOG_PORT};

/// Log sink run as a child of the toolset. Prints received log lines to
/// stdout, which the parent redirects into the captured log file.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let port = match std::env::var("PS5_LOG_PORT") {
        Ok(port) => port.parse::<u16>().context("couldn't parse PS5_LOG_PORT")?,
        Err(_) => DEFAULT_LOG_PORT,
    };

    listener::serve(port).await
}
