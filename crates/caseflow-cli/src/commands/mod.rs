pub mod case;
pub mod common;
pub mod config;
pub mod note;
pub mod scan;
pub mod status;
pub mod sync;
