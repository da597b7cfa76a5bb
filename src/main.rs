pub mod color;
pub mod config;
pub mod connection;
pub mod device;
pub mod display;
pub mod indicator;
pub mod message;

#[cfg(test)]
mod testing;

use crate::config::{
    Config, DisplayBackend, DisplayConfig, IndicatorBackend, IndicatorConfig, LinkBackend,
    WifiConfig,
};
use crate::connection::{MqttBroker, NetworkLink, NmcliLink, StaticLink};
use crate::device::Device;
use crate::display::{Display, HeadlessDisplay, TerminalDisplay};
use crate::indicator::{GpioIndicator, Indicator, LogIndicator, StatusIndicator};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let arg = std::env::args().nth(1);
    if arg.as_deref() == Some("--print-config") {
        let defaults = toml::to_string_pretty(&Config::default())
            .map_err(|e| eyre!("Failed to render default configuration: {}", e))?;
        print!("{defaults}");
        return Ok(());
    }

    setup()?;

    let config =
        Config::load(arg.map(PathBuf::from)).map_err(|e| eyre!("Invalid configuration: {}", e))?;

    let link = build_link(&config.wifi);
    let broker =
        MqttBroker::new(&config.mqtt).map_err(|e| eyre!("Failed to set up broker client: {}", e))?;
    let display = build_display(&config.display);
    let indicator = build_indicator(&config.indicator)?;

    let device = Device::create(
        &config,
        link,
        Box::new(broker),
        display,
        StatusIndicator::new(indicator),
    )?
    .bring_up()
    .await
    .map_err(|e| eyre!("Failed to start device: {}", e))?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received"),
            Err(e) => error!("Unable to listen for Ctrl-C: {}", e),
        }
        trigger.cancel();
    });

    device.run_until_shutdown(shutdown).await;
    Ok(())
}

fn build_link(wifi: &WifiConfig) -> Box<dyn NetworkLink> {
    match wifi.backend {
        LinkBackend::Nmcli => Box::new(NmcliLink::new(
            wifi.interface.clone(),
            Duration::from_secs(wifi.connect_timeout_secs),
        )),
        LinkBackend::Unmanaged => Box::new(StaticLink::new(wifi.interface.clone())),
    }
}

fn build_display(display: &DisplayConfig) -> Box<dyn Display> {
    let cell = display.font_cell();
    match display.backend {
        DisplayBackend::Terminal => {
            Box::new(TerminalDisplay::new(display.width, display.height, cell))
        }
        DisplayBackend::Headless => {
            Box::new(HeadlessDisplay::new(display.width, display.height, cell))
        }
    }
}

fn build_indicator(indicator: &IndicatorConfig) -> Result<Box<dyn Indicator>> {
    match (
        indicator.backend,
        indicator.red_pin,
        indicator.green_pin,
        indicator.blue_pin,
    ) {
        (IndicatorBackend::Gpio, Some(red), Some(green), Some(blue)) => {
            let gpio = GpioIndicator::new(red, green, blue, indicator.brightness)
                .map_err(|e| eyre!("Failed to set up status light: {}", e))?;
            Ok(Box::new(gpio))
        }
        (IndicatorBackend::Gpio, ..) => Err(eyre!("GPIO status light needs all three pins")),
        (IndicatorBackend::Log, ..) => Ok(Box::new(LogIndicator)),
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        // stdout belongs to the terminal panel
        .with_writer(std::io::stderr)
        .pretty()
        .init();
}
