//! Shape checks for values published by the bridge.

use colored::Colorize;
use uuid::Uuid;

use crate::ble_client::RADAR_SERVICE_UUID;

/// Tag bytes leading each radar page
const PAGE_TAGS: [u8; 2] = [0x30, 0x31];

/// Bytes per radar page in the merged view
const PAGE_SIZE: usize = 8;

/// Check a merged radar value: empty, or two tagged pages
pub fn check_radar(value: &[u8]) -> Result<(), String> {
    match value.len() {
        0 => Ok(()),
        len if len == PAGE_SIZE * 2 => {
            for (page, tag) in PAGE_TAGS.iter().enumerate() {
                let found = value[page * PAGE_SIZE];
                if found != *tag {
                    return Err(format!(
                        "page {} starts with 0x{:02X}, expected 0x{:02X}",
                        page + 1,
                        found,
                        tag
                    ));
                }
            }
            Ok(())
        }
        len => Err(format!("radar value is {} bytes, expected 0 or 16", len)),
    }
}

/// Check a battery value: empty, or a single byte
///
/// Out-of-range percentages are passed through by the bridge, so they
/// only produce a warning.
pub fn check_battery(value: &[u8]) -> Result<Option<String>, String> {
    match value {
        [] => Ok(None),
        [percent] if *percent > 100 => Ok(Some(format!("battery reports {}%", percent))),
        [_] => Ok(None),
        _ => Err(format!("battery value is {} bytes, expected 0 or 1", value.len())),
    }
}

/// Check that the bridge advertises its radar service
pub fn check_advertised_services(services: &[Uuid]) -> Result<(), String> {
    if services.contains(&RADAR_SERVICE_UUID) {
        Ok(())
    } else {
        Err(format!("radar service {} not advertised", RADAR_SERVICE_UUID))
    }
}

/// Running tally of checked values
#[derive(Default)]
pub struct Tally {
    pub radar: usize,
    pub battery: usize,
    pub failures: Vec<String>,
    pub warnings: Vec<String>,
}

impl Tally {
    pub fn radar(&mut self, value: &[u8]) {
        self.radar += 1;
        if let Err(e) = check_radar(value) {
            self.failures.push(e);
        }
    }

    pub fn battery(&mut self, value: &[u8]) {
        self.battery += 1;
        match check_battery(value) {
            Ok(Some(warning)) => self.warnings.push(warning),
            Ok(None) => {}
            Err(e) => self.failures.push(e),
        }
    }

    pub fn advertisement(&mut self, services: &[Uuid]) {
        if let Err(e) = check_advertised_services(services) {
            self.failures.push(e);
        }
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Print the summary.
    pub fn print(&self) {
        println!("\n{}", "=".repeat(60));
        println!("{}", "Monitor Results".bold());
        println!("{}", "=".repeat(60));
        println!("  Radar values:   {}", self.radar);
        println!("  Battery values: {}", self.battery);

        for warning in &self.warnings {
            println!("  {} {}", "[WARN]".yellow().bold(), warning);
        }
        for failure in &self.failures {
            println!("  {} {}", "[FAIL]".red().bold(), failure);
        }

        println!("{}", "-".repeat(60));
        if self.passed() {
            println!("  {}", "All values well formed".green().bold());
        } else {
            println!("  {}", format!("{} malformed values", self.failures.len()).red().bold());
        }
    }
}
