//! Virtual machine detection.

use lazy_static::lazy_static;

lazy_static! {
    /// Vendor/product substrings that identify a hypervisor.
    static ref VM_MARKERS: Vec<&'static str> = vec![
        "vmware",
        "virtualbox",
        "vbox",
        "qemu",
        "kvm",
        "xen",
        "hyper-v",
        "microsoft corporation virtual",
        "parallels",
        "bochs",
        "bhyve",
    ];
}

/// Detector reporting whether the build runs inside a virtual machine.
pub trait VirtualMachineDetector: Send + Sync {
    /// Whether a virtual machine environment was detected.
    fn is_virtual_machine(&self) -> bool;
}

/// Heuristic detector over DMI identification strings.
///
/// # Detection Logic
///
/// - **Linux**: reads `/sys/class/dmi/id/sys_vendor`, `product_name` and
///   `board_vendor` and matches them against the hypervisor marker table
/// - **other platforms**: no DMI surface is probed; reports `false`
#[derive(Debug, Default)]
pub struct HeuristicVmDetector;

impl HeuristicVmDetector {
    /// Create a new detector.
    pub fn new() -> Self {
        Self
    }

    /// Whether an identification string names a known hypervisor.
    pub fn contains_vm_marker(text: &str) -> bool {
        let lowered = text.to_lowercase();
        VM_MARKERS.iter().any(|marker| lowered.contains(marker))
    }

    #[cfg(target_os = "linux")]
    fn probe_dmi() -> bool {
        use tracing::debug;

        const DMI_FILES: [&str; 3] = [
            "/sys/class/dmi/id/sys_vendor",
            "/sys/class/dmi/id/product_name",
            "/sys/class/dmi/id/board_vendor",
        ];

        for file in DMI_FILES {
            if let Ok(content) = std::fs::read_to_string(file) {
                if Self::contains_vm_marker(&content) {
                    debug!("VM marker found in {}: '{}'", file, content.trim());
                    return true;
                }
            }
        }
        false
    }
}

impl VirtualMachineDetector for HeuristicVmDetector {
    fn is_virtual_machine(&self) -> bool {
        #[cfg(target_os = "linux")]
        {
            Self::probe_dmi()
        }

        #[cfg(not(target_os = "linux"))]
        {
            false
        }
    }
}
