//! Check-parset command - validate an observation parameter set file.

use std::path::Path;

use stationctl::observation::{ObservationDescriptor, ObservationId};
use stationctl::parset::ParameterSet;

use crate::error::CliError;

/// Run the check-parset command.
pub fn run(path: &Path) -> Result<(), CliError> {
    let parset = ParameterSet::from_file(path).map_err(|e| CliError::Parset(e.to_string()))?;

    let obs_id = observation_id_from_path(path);
    let descriptor = ObservationDescriptor::from_parset(obs_id, 0, &parset)
        .map_err(|e| CliError::Parset(e.to_string()))?;

    println!("✓ Valid parameter set: {}", path.display());
    println!("  Observation:      {}", descriptor.obs_id);
    println!("  Sample clock:     {} MHz", descriptor.sample_clock_mhz);
    println!("  Bit mode:         {} bit", descriptor.bit_mode);
    println!(
        "  Window:           {} .. {}",
        descriptor.start_time.format("%Y-%m-%d %H:%M:%S"),
        descriptor.stop_time.format("%Y-%m-%d %H:%M:%S")
    );
    println!("  Receivers:        {}", descriptor.effective_receivers());
    println!("  Transient buffer: {}", descriptor.transient_buffer);
    println!("  Splitters:        {}", descriptor.splitter);
    Ok(())
}

/// Derive the observation id from an `Observation<id>.parset` filename,
/// falling back to the bare file stem.
fn observation_id_from_path(path: &Path) -> ObservationId {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let id = stem.strip_prefix("Observation").unwrap_or(&stem);
    ObservationId::new(if id.is_empty() { "0" } else { id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_id_from_canonical_filename() {
        let id = observation_id_from_path(Path::new("/data/parsets/Observation12345.parset"));
        assert_eq!(id.as_str(), "12345");
    }

    #[test]
    fn test_observation_id_from_plain_filename() {
        let id = observation_id_from_path(Path::new("test.parset"));
        assert_eq!(id.as_str(), "test");
    }
}
