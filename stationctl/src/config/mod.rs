//! Configuration file handling for ~/.stationctl/config.ini.
//!
//! Settings structs live in [`settings`], constants and paths in
//! [`defaults`], parsing in [`parser`] and serialization in [`writer`].
//! [`file`] ties them together as [`ConfigFile::load`] and
//! [`ConfigFile::save_to`].

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    config_directory, config_file_path, default_parset_directory, DEFAULT_STATION_NAME,
};
pub use file::ConfigFileError;
pub use settings::{
    ConfigFile, ControllerSettings, LoggingSettings, ParsetSettings, StationSettings,
};
