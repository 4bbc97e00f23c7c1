use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use anyhow::Context;

use super::RunOptions;
use crate::listener::{self, LogServer};
use crate::{payload, DeviceConfig, FwVersion};

/// Stage 1: points the device's logging at our sink.
const SETLOGSERVER_JS: &str = "Y2JB/setlogserver.js";
/// Stage 2: runs on the device and reports the firmware marker back.
const HEURISTIC_JS: &str = "Main/PS5_Heuristic.js";
/// Stage 3: the kernel stage, gated on the reported firmware.
const LAPSE_JS: &str = "Y2JB/lapse.js";

const MARKER_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn run(opts: &RunOptions) -> anyhow::Result<()> {
    let local_ip = payload::local_ip().unwrap_or_else(|err| {
        log::warn!("couldn't determine local address: {err:?}");
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    });
    log::info!("local address: {local_ip}");

    let config = device_config(opts).await?;

    let server = LogServer::spawn(&opts.paths)
        .await
        .context("start log server")?;

    // The log server must come down on every exit path.
    let result = deploy(opts, &config, local_ip, &server).await;
    server.terminate().await;
    result
}

async fn device_config(opts: &RunOptions) -> anyhow::Result<DeviceConfig> {
    let saved = if opts.config_override {
        None
    } else {
        DeviceConfig::load(&opts.paths.config_file()).await?
    };

    match saved {
        Some(config) => {
            log::info!("using saved device config {}", config.addr());
            Ok(config)
        }
        None => {
            let config = DeviceConfig::prompt().await?;
            config
                .save(&opts.paths.config_file())
                .await
                .context("save device config")?;
            Ok(config)
        }
    }
}

async fn deploy(
    opts: &RunOptions,
    config: &DeviceConfig,
    local_ip: IpAddr,
    server: &LogServer,
) -> anyhow::Result<()> {
    let addr = config.addr();
    let paths = &opts.paths;

    let rewritten = payload::rewrite_log_server_file(
        &paths.payload(SETLOGSERVER_JS),
        local_ip,
        paths.log_port,
    )
    .await
    .context("rewrite setlogserver payload")?;

    payload::send_file(&rewritten, addr)
        .await
        .context("send setlogserver stage")?;
    payload::send_file(&paths.payload(HEURISTIC_JS), addr)
        .await
        .context("send heuristic stage")?;

    log::info!(
        "waiting for firmware marker ({}s timeout)",
        MARKER_TIMEOUT.as_secs()
    );
    let raw = listener::wait_for_marker(server.log_path(), MARKER_TIMEOUT)
        .await?
        .context("timed out waiting for the firmware marker")?;

    let fw = FwVersion::parse_lossy(&raw);
    log::info!("detected firmware {fw}");

    if !fw.allows_kernel_stage() {
        log::warn!("kernel stage can't run on firmware above 10.01, stopping here");
        return Ok(());
    }

    payload::send_file(&paths.payload(LAPSE_JS), addr)
        .await
        .context("send kernel stage")?;

    log::info!("all payloads sent");
    Ok(())
}
