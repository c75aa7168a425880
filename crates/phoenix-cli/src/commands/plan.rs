//! Plan command implementation.
//!
//! Runs the same validation and command construction as `POST /start_vm`
//! and prints the resulting invocation, one argument per line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use phoenix_api::VmConfig;

use crate::config::Config;

/// VM fields; anything left out falls back to the configured defaults.
#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    /// Memory in megabytes.
    #[arg(long)]
    pub ram_mb: Option<u32>,

    /// Virtual CPU count.
    #[arg(long)]
    pub cores: Option<u32>,

    /// QEMU CPU model.
    #[arg(long)]
    pub cpu_model: Option<String>,

    /// Boot order (e.g. `c`, `dc`).
    #[arg(long)]
    pub boot_order: Option<String>,

    /// Display adapter model.
    #[arg(long)]
    pub vga_model: Option<String>,

    /// Network device model.
    #[arg(long)]
    pub net_device: Option<String>,

    /// Primary qcow2 disk image.
    #[arg(long)]
    pub primary_disk: Option<PathBuf>,

    /// Installer ISO attached as CD-ROM.
    #[arg(long)]
    pub cdrom: Option<PathBuf>,

    /// Secondary qcow2 data disk.
    #[arg(long)]
    pub data_disk: Option<PathBuf>,

    /// Print the invocation as a JSON object instead.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    fn to_vm_config(&self) -> VmConfig {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        VmConfig {
            ram_mb: self.ram_mb,
            cores: self.cores,
            cpu_model: self.cpu_model.clone(),
            boot_order: self.boot_order.clone(),
            vga_model: self.vga_model.clone(),
            net_device: self.net_device.clone(),
            primary_disk_path: path(&self.primary_disk),
            cdrom_path: path(&self.cdrom),
            data_disk_path: path(&self.data_disk),
        }
    }
}

/// Validate the configuration and print the command.
pub fn execute(config: &Config, args: PlanArgs) -> Result<()> {
    let vm = args
        .to_vm_config()
        .validate(&config.vm)
        .context("Invalid VM configuration")?;
    let command = vm.to_command(&config.qemu_binary);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&command)?);
    } else {
        println!("{}", command.program.display());
        for arg in &command.args {
            println!("  {}", arg);
        }
    }

    Ok(())
}
