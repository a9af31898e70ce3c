//! Column family definitions for RocksDB.
//!
//! - task_configurations: one JSON record per configuration id
//! - scripts: uploaded script bodies and their file names, keyed by configuration id

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for task configurations
pub const CF_TASKS: &str = "task_configurations";

/// Column family name for uploaded scripts
pub const CF_SCRIPTS: &str = "scripts";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_TASKS, CF_SCRIPTS];

/// Script bodies can be large and are rarely read
fn scripts_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_TASKS, Options::default()),
        ColumnFamilyDescriptor::new(CF_SCRIPTS, scripts_options()),
    ]
}
