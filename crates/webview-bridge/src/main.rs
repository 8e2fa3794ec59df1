//! Headless bridge: serves the operation table over JSON-RPC on stdio.

use std::sync::Arc;

use anyhow::Result;
use webview_bridge::{stdio, watch, Bridge, BridgeConfig, HeadlessHost};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the protocol.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting WebView Bridge (stdio)...");

    let config = BridgeConfig::from_env()?;
    log::info!("Sandbox root: {:?}", config.root);
    log::info!("Data file: {:?}", config.data_file);

    let (host, mut channels) = HeadlessHost::new(config.title.clone());
    let host = Arc::new(host);
    let mut bridge = Bridge::from_config(&config, host.clone())?;

    let _watcher = if config.watch {
        let root = bridge.sandbox().root();
        match watch::watch_directory(root, config.data_file.as_slice(), host.clone()) {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!("Directory watcher unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    let summary = stdio::serve(&mut bridge, stdin, stdout, &mut channels).await?;

    log::info!(
        "Served {} request(s){}",
        summary.requests,
        if summary.quit_requested { ", quit requested" } else { "" }
    );
    Ok(())
}
