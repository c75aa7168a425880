//! VM configuration: request validation and QEMU command construction.
//!
//! This is the only place that knows QEMU flags. The supervisor receives a
//! ready [`VmCommand`] and treats its arguments as opaque.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Accepted memory range in MB.
pub const RAM_MB_RANGE: std::ops::RangeInclusive<u32> = 512..=32768;
/// Accepted virtual CPU count.
pub const CORES_RANGE: std::ops::RangeInclusive<u32> = 1..=12;

pub const BOOT_ORDERS: &[&str] = &["c", "d", "n", "cd", "dc", "ncd", "dnc"];
pub const VGA_MODELS: &[&str] = &["std", "qxl", "virtio", "vmware", "cirrus"];
pub const NET_DEVICES: &[&str] = &["virtio-net-pci", "e1000", "rtl8139"];

/// Why a VM configuration was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmConfigError {
    #[error("RAM must be between 512 MB and 32768 MB")]
    RamOutOfRange { ram_mb: u32 },

    #[error("CPU cores must be between 1 and 12")]
    CoresOutOfRange { cores: u32 },

    #[error("Invalid CPU model format")]
    InvalidCpuModel { cpu_model: String },

    #[error("Invalid boot order")]
    InvalidBootOrder { boot_order: String },

    #[error("Invalid VGA model")]
    InvalidVgaModel { vga_model: String },

    #[error("Invalid network device")]
    InvalidNetDevice { net_device: String },

    #[error("Primary disk path is required")]
    MissingPrimaryDisk,

    #[error("Primary disk not found: {}", .path.display())]
    PrimaryDiskNotFound { path: PathBuf },

    #[error("CD-ROM ISO not found: {}", .path.display())]
    CdromNotFound { path: PathBuf },

    #[error("Data disk not found: {}", .path.display())]
    DataDiskNotFound { path: PathBuf },
}

/// Defaults applied to fields a start request leaves out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmDefaults {
    pub ram_mb: u32,
    pub cores: u32,
    pub cpu_model: String,
    pub boot_order: String,
    pub vga_model: String,
    pub net_device: String,
    pub primary_disk_path: String,
    pub cdrom_path: String,
    pub data_disk_path: String,
}

impl Default for VmDefaults {
    fn default() -> Self {
        Self {
            ram_mb: 8192,
            cores: 6,
            cpu_model: "max".to_string(),
            boot_order: "c".to_string(),
            vga_model: "virtio".to_string(),
            net_device: "virtio-net-pci".to_string(),
            primary_disk_path: String::new(),
            cdrom_path: String::new(),
            data_disk_path: String::new(),
        }
    }
}

/// Body of a start request. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    #[serde(default)]
    pub ram_mb: Option<u32>,
    #[serde(default)]
    pub cores: Option<u32>,
    #[serde(default)]
    pub cpu_model: Option<String>,
    #[serde(default)]
    pub boot_order: Option<String>,
    #[serde(default)]
    pub vga_model: Option<String>,
    #[serde(default)]
    pub net_device: Option<String>,
    #[serde(default)]
    pub primary_disk_path: Option<String>,
    #[serde(default)]
    pub cdrom_path: Option<String>,
    #[serde(default)]
    pub data_disk_path: Option<String>,
}

/// A fully validated VM configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedVm {
    pub ram_mb: u32,
    pub cores: u32,
    pub cpu_model: String,
    pub boot_order: String,
    pub vga_model: String,
    pub net_device: String,
    pub primary_disk: PathBuf,
    pub cdrom: Option<PathBuf>,
    pub data_disk: Option<PathBuf>,
}

/// Program plus ordered arguments, handed to the supervisor as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl VmConfig {
    /// Fill gaps from `defaults` and check every rule, first failure wins.
    pub fn validate(&self, defaults: &VmDefaults) -> Result<ValidatedVm, VmConfigError> {
        let ram_mb = self.ram_mb.unwrap_or(defaults.ram_mb);
        if !RAM_MB_RANGE.contains(&ram_mb) {
            return Err(VmConfigError::RamOutOfRange { ram_mb });
        }

        let cores = self.cores.unwrap_or(defaults.cores);
        if !CORES_RANGE.contains(&cores) {
            return Err(VmConfigError::CoresOutOfRange { cores });
        }

        let cpu_model = pick(&self.cpu_model, &defaults.cpu_model);
        if !is_identifier(&cpu_model) {
            return Err(VmConfigError::InvalidCpuModel { cpu_model });
        }

        let boot_order = pick(&self.boot_order, &defaults.boot_order);
        if !BOOT_ORDERS.contains(&boot_order.as_str()) {
            return Err(VmConfigError::InvalidBootOrder { boot_order });
        }

        let vga_model = pick(&self.vga_model, &defaults.vga_model);
        if !VGA_MODELS.contains(&vga_model.as_str()) {
            return Err(VmConfigError::InvalidVgaModel { vga_model });
        }

        let net_device = pick(&self.net_device, &defaults.net_device);
        if !NET_DEVICES.contains(&net_device.as_str()) {
            return Err(VmConfigError::InvalidNetDevice { net_device });
        }

        let primary = pick(&self.primary_disk_path, &defaults.primary_disk_path);
        let primary = primary.trim();
        if primary.is_empty() {
            return Err(VmConfigError::MissingPrimaryDisk);
        }
        let primary_disk = PathBuf::from(primary);
        if !primary_disk.exists() {
            return Err(VmConfigError::PrimaryDiskNotFound { path: primary_disk });
        }

        let cdrom = optional_path(&pick(&self.cdrom_path, &defaults.cdrom_path));
        if let Some(path) = cdrom.as_ref().filter(|p| !p.exists()) {
            return Err(VmConfigError::CdromNotFound { path: path.clone() });
        }

        let data_disk = optional_path(&pick(&self.data_disk_path, &defaults.data_disk_path));
        if let Some(path) = data_disk.as_ref().filter(|p| !p.exists()) {
            return Err(VmConfigError::DataDiskNotFound { path: path.clone() });
        }

        Ok(ValidatedVm {
            ram_mb,
            cores,
            cpu_model,
            boot_order,
            vga_model,
            net_device,
            primary_disk,
            cdrom,
            data_disk,
        })
    }
}

impl ValidatedVm {
    /// Build the QEMU invocation. Each flag and its value are separate
    /// arguments, so nothing passes through a shell.
    pub fn to_command(&self, qemu_binary: &Path) -> VmCommand {
        let mut args: Vec<String> = vec![
            "-accel".into(),
            "tcg,thread=multi".into(),
            "-smp".into(),
            self.cores.to_string(),
            "-m".into(),
            self.ram_mb.to_string(),
            "-cpu".into(),
            self.cpu_model.clone(),
            "-boot".into(),
            format!("order={}", self.boot_order),
            "-vga".into(),
            self.vga_model.clone(),
            "-netdev".into(),
            "user,id=net0".into(),
            "-device".into(),
            format!("{},netdev=net0", self.net_device),
            "-drive".into(),
            drive_arg(&self.primary_disk),
            "-vnc".into(),
            ":0".into(),
        ];

        if let Some(cdrom) = &self.cdrom {
            args.push("-cdrom".into());
            args.push(cdrom.display().to_string());
        }
        if let Some(data_disk) = &self.data_disk {
            args.push("-drive".into());
            args.push(drive_arg(data_disk));
        }

        VmCommand {
            program: qemu_binary.to_path_buf(),
            args,
        }
    }
}

fn drive_arg(path: &Path) -> String {
    format!(
        "file={},if=virtio,cache=writeback,format=qcow2",
        path.display()
    )
}

fn pick(value: &Option<String>, default: &str) -> String {
    value.clone().unwrap_or_else(|| default.to_string())
}

fn optional_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn config_with_disk(disk: &Path) -> VmConfig {
        VmConfig {
            primary_disk_path: Some(disk.display().to_string()),
            ..VmConfig::default()
        }
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let disk = NamedTempFile::new().unwrap();
        let vm = config_with_disk(disk.path())
            .validate(&VmDefaults::default())
            .unwrap();
        assert_eq!(vm.ram_mb, 8192);
        assert_eq!(vm.cores, 6);
        assert_eq!(vm.cpu_model, "max");
        assert_eq!(vm.cdrom, None);
        assert_eq!(vm.data_disk, None);
    }

    #[test]
    fn rejects_out_of_range_resources() {
        let disk = NamedTempFile::new().unwrap();
        let defaults = VmDefaults::default();

        let mut config = config_with_disk(disk.path());
        config.ram_mb = Some(256);
        assert_eq!(
            config.validate(&defaults),
            Err(VmConfigError::RamOutOfRange { ram_mb: 256 })
        );

        config.ram_mb = Some(32768);
        config.cores = Some(13);
        assert_eq!(
            config.validate(&defaults),
            Err(VmConfigError::CoresOutOfRange { cores: 13 })
        );
    }

    #[test]
    fn rejects_values_outside_whitelists() {
        let disk = NamedTempFile::new().unwrap();
        let defaults = VmDefaults::default();

        let mut config = config_with_disk(disk.path());
        config.cpu_model = Some("max; rm -rf /".into());
        assert!(matches!(
            config.validate(&defaults),
            Err(VmConfigError::InvalidCpuModel { .. })
        ));

        let mut config = config_with_disk(disk.path());
        config.boot_order = Some("x".into());
        assert!(matches!(
            config.validate(&defaults),
            Err(VmConfigError::InvalidBootOrder { .. })
        ));

        let mut config = config_with_disk(disk.path());
        config.vga_model = Some("voodoo".into());
        assert!(matches!(
            config.validate(&defaults),
            Err(VmConfigError::InvalidVgaModel { .. })
        ));

        let mut config = config_with_disk(disk.path());
        config.net_device = Some("ne2k".into());
        assert!(matches!(
            config.validate(&defaults),
            Err(VmConfigError::InvalidNetDevice { .. })
        ));
    }

    #[test]
    fn requires_existing_disks() {
        let defaults = VmDefaults::default();
        assert_eq!(
            VmConfig::default().validate(&defaults),
            Err(VmConfigError::MissingPrimaryDisk)
        );

        let config = VmConfig {
            primary_disk_path: Some("   ".into()),
            ..VmConfig::default()
        };
        assert_eq!(
            config.validate(&defaults),
            Err(VmConfigError::MissingPrimaryDisk)
        );

        let config = VmConfig {
            primary_disk_path: Some("/nonexistent/disk.qcow2".into()),
            ..VmConfig::default()
        };
        assert!(matches!(
            config.validate(&defaults),
            Err(VmConfigError::PrimaryDiskNotFound { .. })
        ));

        let disk = NamedTempFile::new().unwrap();
        let mut config = config_with_disk(disk.path());
        config.cdrom_path = Some("/nonexistent/install.iso".into());
        assert!(matches!(
            config.validate(&defaults),
            Err(VmConfigError::CdromNotFound { .. })
        ));

        let mut config = config_with_disk(disk.path());
        config.data_disk_path = Some("/nonexistent/data.qcow2".into());
        let err = config.validate(&defaults).unwrap_err();
        assert_eq!(err.to_string(), "Data disk not found: /nonexistent/data.qcow2");
    }

    #[test]
    fn command_keeps_flags_and_values_separate() {
        let vm = ValidatedVm {
            ram_mb: 2048,
            cores: 2,
            cpu_model: "host".into(),
            boot_order: "dc".into(),
            vga_model: "std".into(),
            net_device: "e1000".into(),
            primary_disk: PathBuf::from("/vm/os.qcow2"),
            cdrom: Some(PathBuf::from("/vm/install.iso")),
            data_disk: Some(PathBuf::from("/vm/data.qcow2")),
        };
        let command = vm.to_command(Path::new("qemu-system-x86_64"));

        assert_eq!(command.program, PathBuf::from("qemu-system-x86_64"));
        assert_eq!(
            command.args,
            vec![
                "-accel",
                "tcg,thread=multi",
                "-smp",
                "2",
                "-m",
                "2048",
                "-cpu",
                "host",
                "-boot",
                "order=dc",
                "-vga",
                "std",
                "-netdev",
                "user,id=net0",
                "-device",
                "e1000,netdev=net0",
                "-drive",
                "file=/vm/os.qcow2,if=virtio,cache=writeback,format=qcow2",
                "-vnc",
                ":0",
                "-cdrom",
                "/vm/install.iso",
                "-drive",
                "file=/vm/data.qcow2,if=virtio,cache=writeback,format=qcow2",
            ]
        );
    }
}
