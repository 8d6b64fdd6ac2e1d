//! Kestrel triangle demo
//!
//! Draws a single colored triangle through the frame driver. Resize,
//! minimize and restore the window to exercise swapchain rebuilds.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p kestrel-triangle -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--width <N>`, `--height <N>`: Initial window size (default: 1280x720)
//! - `--frames-in-flight <N>`: Frames the CPU may record ahead (default: 2)
//! - `--present-mode <MODE>`: `immediate`, `mailbox` or `fifo` (default: immediate)
//! - `--vsync`: Force FIFO presentation
//! - `--target-fps <N>`: Cap the frame rate
//! - `--no-validation`: Disable Vulkan validation layers
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use anyhow::{bail, Context};
use ash::vk;
use kestrel_app::{run_app, AppConfig};

use crate::app::Triangle;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    // Check for help flag before starting the app
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    let config = parse_args(std::env::args().skip(1))?;
    run_app::<Triangle>(config)
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::new("Kestrel - Triangle").with_size(WIDTH, HEIGHT);
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = || {
            args.next()
                .with_context(|| format!("Missing value for {arg}"))
        };

        match arg.as_str() {
            "--width" => config.width = value()?.parse().context("Invalid --width")?,
            "--height" => config.height = value()?.parse().context("Invalid --height")?,
            "--frames-in-flight" => {
                let frames: usize = value()?.parse().context("Invalid --frames-in-flight")?;
                if frames == 0 {
                    bail!("--frames-in-flight must be at least 1");
                }
                config = config.with_frames_in_flight(frames);
            }
            "--present-mode" => {
                config = config.with_present_mode(parse_present_mode(&value()?)?);
            }
            "--target-fps" => {
                config = config.with_target_fps(value()?.parse().context("Invalid --target-fps")?);
            }
            "--vsync" => config = config.with_vsync(true),
            "--no-validation" => config = config.with_validation(false),
            other => bail!("Unknown argument: {other} (see --help)"),
        }
    }

    Ok(config)
}

fn parse_present_mode(name: &str) -> anyhow::Result<vk::PresentModeKHR> {
    match name.to_ascii_lowercase().as_str() {
        "immediate" => Ok(vk::PresentModeKHR::IMMEDIATE),
        "mailbox" => Ok(vk::PresentModeKHR::MAILBOX),
        "fifo" => Ok(vk::PresentModeKHR::FIFO),
        other => bail!("Unknown present mode: {other}"),
    }
}

fn print_help() {
    eprintln!(
        "Kestrel triangle demo

USAGE:
    cargo run -p kestrel-triangle -- [OPTIONS]

OPTIONS:
    --width <N>              Initial window width (default: {WIDTH})
    --height <N>             Initial window height (default: {HEIGHT})
    --frames-in-flight <N>   Frames the CPU may record ahead (default: 2)
    --present-mode <MODE>    immediate, mailbox or fifo (default: immediate)
                             Falls back to the first mode the surface supports
    --vsync                  Force FIFO presentation
    --target-fps <N>         Cap the frame rate
    --no-validation          Disable Vulkan validation layers
    -h, --help               Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                 Set log level (e.g., info, debug, trace)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn defaults_without_arguments() {
        let config = parse_args(Vec::new()).unwrap();
        assert_eq!((config.width, config.height), (WIDTH, HEIGHT));
        assert!(!config.vsync);
    }

    #[test]
    fn parses_options() {
        let config = parse_args(args(&[
            "--width",
            "640",
            "--frames-in-flight",
            "3",
            "--present-mode",
            "mailbox",
            "--vsync",
        ]))
        .unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.present_mode, vk::PresentModeKHR::MAILBOX);
        assert!(config.vsync);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(args(&["--frames-in-flight", "0"])).is_err());
        assert!(parse_args(args(&["--present-mode", "relaxed"])).is_err());
        assert!(parse_args(args(&["--width"])).is_err());
        assert!(parse_args(args(&["--bogus"])).is_err());
    }
}
