use crate::common::config::UdevConfig;

/// Static rule granting non-root access to the vendor's USB3 Vision cameras.
pub fn render_rules(config: &UdevConfig) -> String {
    let mut rules = String::from(
        "# MVS industrial cameras (USB3 Vision), installed by mvs-setup\n",
    );
    for vendor in &config.usb_vendor_ids {
        rules.push_str(&format!(
            "SUBSYSTEM==\"usb\", ATTRS{{idVendor}}==\"{}\", MODE=\"{}\"\n",
            vendor.to_lowercase(),
            config.mode
        ));
    }
    rules
}
