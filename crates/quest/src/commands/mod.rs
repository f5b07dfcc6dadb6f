pub mod actions;
pub mod config;
pub mod doctor;
pub mod log;
pub mod project;
pub mod status;
pub mod sync;
