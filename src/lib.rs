extern crate chrono;
extern crate clap;
extern crate data_encoding;
#[macro_use]
extern crate diesel;
extern crate filetime;
extern crate log;
extern crate reqwest;
extern crate ring;
extern crate serde;
extern crate serde_json;
extern crate sysinfo;
extern crate tempfile;
extern crate uuid;

pub mod config;
pub mod errors;
pub mod fs_client;
pub mod move_detector;
pub mod pair_store;
pub mod remote_client;
pub mod resolver;
pub mod scan;
pub mod scheduler;

pub use errors::SyncError;
