//! Compiler configuration.
//!
//! The only knob is the optional graph dump directory. It is normally taken
//! from the `DUMP_GRAPHS` environment variable so that a driver can enable the
//! dump without threading flags through.

use std::path::PathBuf;

/// Environment variable that enables graph dumps.
pub const DUMP_GRAPHS_VAR: &str = "DUMP_GRAPHS";

/// Options for one compiler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Directory receiving one `<function>.dot` file per function, if set.
    pub dump_graphs: Option<PathBuf>,
}

impl CompilerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_dump_value(std::env::var(DUMP_GRAPHS_VAR).ok().as_deref())
    }

    /// Interpret a `DUMP_GRAPHS` value.
    ///
    /// An empty value disables the dump. The historical toggle value `vcg`
    /// dumps into the working directory; anything else names the directory.
    pub fn from_dump_value(value: Option<&str>) -> Self {
        let dump_graphs = match value.map(str::trim) {
            None | Some("") => None,
            Some("vcg") => Some(PathBuf::from(".")),
            Some(dir) => Some(PathBuf::from(dir)),
        };
        Self { dump_graphs }
    }

    /// Dump graphs into `dir`.
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_graphs = Some(dir.into());
        self
    }
}
