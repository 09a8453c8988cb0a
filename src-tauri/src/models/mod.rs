pub mod capture;
pub mod config;
pub mod view_state;
