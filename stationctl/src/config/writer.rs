//! Serialization of `ConfigFile` back to INI text.

use super::settings::ConfigFile;
use std::fmt::Write;

/// Render a `ConfigFile` as the INI text `parse_ini` accepts.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "[station]");
    let _ = writeln!(out, "name = {}", config.station.name);
    let _ = writeln!(out);

    let _ = writeln!(out, "[controller]");
    let _ = writeln!(
        out,
        "guard_timeout_secs = {}",
        config.controller.guard_timeout_secs
    );
    let _ = writeln!(
        out,
        "calibration_host = {}",
        config.controller.calibration_host
    );
    let _ = writeln!(out, "beam_host = {}", config.controller.beam_host);
    let _ = writeln!(
        out,
        "transient_buffer_host = {}",
        config.controller.transient_buffer_host
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "[parset]");
    let _ = writeln!(
        out,
        "directory = {}",
        config.parset.directory.display()
    );

    if let Some(file) = &config.logging.file {
        let _ = writeln!(out);
        let _ = writeln!(out, "[logging]");
        let _ = writeln!(out, "file = {}", file.display());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_config_parses_back() {
        let mut config = ConfigFile::default();
        config.station.name = "RS407".to_string();
        config.controller.guard_timeout_secs = 25;
        config.logging.file = Some("/var/log/stationctl.log".into());

        let text = to_config_string(&config);
        let ini = ini::Ini::load_from_str(&text).unwrap();
        let parsed = super::super::parser::parse_ini(&ini).unwrap();
        assert_eq!(parsed, config);
    }
}
