//! Static table of supported FX2 device models.

/// Identifies one supported device model by the USB IDs it presents before
/// and after firmware upload.  The table entry for a device lives for the
/// process lifetime, so instances hold `&'static` references into it.
#[derive(Debug, PartialEq)]
pub struct Profile {
    /// Vendor ID the device enumerates with out of the box
    pub orig_vid: u16,
    /// Product ID the device enumerates with out of the box
    pub orig_pid: u16,
    /// Vendor ID after the firmware has been uploaded
    pub fw_vid: u16,
    /// Product ID after the firmware has been uploaded
    pub fw_pid: u16,
    pub vendor: &'static str,
    pub model: &'static str,
    pub version: Option<&'static str>,
    /// Probes the hardware exposes.  The Saleae firmware only samples eight,
    /// regardless of how many pins the FX2 package has.
    pub num_probes: u16,
}

/// Devices this driver knows how to handle.
pub static SUPPORTED_FX2: &[Profile] = &[
    // Saleae Logic
    Profile {
        orig_vid: 0x0925,
        orig_pid: 0x3881,
        fw_vid: 0x0925,
        fw_pid: 0x3881,
        vendor: "Saleae",
        model: "Logic",
        version: None,
        num_probes: 8,
    },
    // Default Cypress FX2 without EEPROM
    Profile {
        orig_vid: 0x04b4,
        orig_pid: 0x8613,
        fw_vid: 0x0925,
        fw_pid: 0x3881,
        vendor: "Cypress",
        model: "FX2",
        version: None,
        num_probes: 16,
    },
];

/// Looks up the profile matching an unprogrammed device's IDs.
pub fn by_orig_ids(vid: u16, pid: u16) -> Option<&'static Profile> {
    SUPPORTED_FX2
        .iter()
        .find(|profile| profile.orig_vid == vid && profile.orig_pid == pid)
}

/// Looks up the profile a device presents once it runs the firmware.
pub fn by_fw_ids(vid: u16, pid: u16) -> Option<&'static Profile> {
    SUPPORTED_FX2
        .iter()
        .find(|profile| profile.fw_vid == vid && profile.fw_pid == pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_orig_ids() {
        let profile = by_orig_ids(0x04b4, 0x8613).unwrap();
        assert_eq!(profile.vendor, "Cypress");
        assert_eq!(profile.num_probes, 16);

        let profile = by_orig_ids(0x0925, 0x3881).unwrap();
        assert_eq!(profile.model, "Logic");
        assert_eq!(profile.num_probes, 8);
    }

    #[test]
    fn test_lookup_by_fw_ids() {
        // Both table entries renumerate to the Saleae IDs; the first match
        // wins.
        let profile = by_fw_ids(0x0925, 0x3881).unwrap();
        assert_eq!(profile.vendor, "Saleae");
    }

    #[test]
    fn test_unknown_ids() {
        assert!(by_orig_ids(0x1234, 0x5678).is_none());
        assert!(by_fw_ids(0x04b4, 0x8613).is_none());
    }
}
