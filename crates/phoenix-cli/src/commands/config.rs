//! Config command implementation.
//!
//! Manages CLI configuration.

use anyhow::Result;

use crate::config::Config;

/// Show current configuration.
pub fn show(config: &Config) -> Result<()> {
    println!("Project Phoenix Configuration");
    println!("{:-<40}", "");

    println!("Listen Address:      {}:{}", config.host, config.port);
    println!("QEMU Binary:         {}", config.qemu_binary.display());
    println!(
        "Grace Period:        {}s",
        config.supervisor.grace_period_secs
    );
    println!(
        "Terminal Shell:      {} {}",
        config.supervisor.shell, config.supervisor.shell_flag
    );
    println!(
        "VM Defaults:         {} MB, {} cores, cpu {}, boot {}, vga {}, net {}",
        config.vm.ram_mb,
        config.vm.cores,
        config.vm.cpu_model,
        config.vm.boot_order,
        config.vm.vga_model,
        config.vm.net_device
    );
    println!(
        "Primary Disk:        {}",
        or_unset(&config.vm.primary_disk_path)
    );
    println!("CD-ROM Image:        {}", or_unset(&config.vm.cdrom_path));
    println!("Data Disk:           {}", or_unset(&config.vm.data_disk_path));

    if let Some(config_path) = Config::config_file_path() {
        println!("\nConfig file: {}", config_path.display());
    }

    Ok(())
}

/// Set a configuration value.
pub fn set(config: &mut Config, key: &str, value: &str) -> Result<()> {
    config.set(key, value)?;
    config.save()?;
    println!("Set {} to: {}", key, value);
    Ok(())
}

/// Get a configuration value.
pub fn get(config: &Config, key: &str) -> Result<()> {
    match config.get(key) {
        Some(value) => println!("{}", value),
        None => anyhow::bail!(
            "Unknown config key: {}. Valid keys: {}",
            key,
            Config::KEYS.join(", ")
        ),
    }
    Ok(())
}

/// Reset configuration to defaults.
pub fn reset() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults");
    Ok(())
}

fn or_unset(value: &str) -> &str {
    if value.trim().is_empty() {
        "(not set)"
    } else {
        value
    }
}
