pub mod acquisition;
#[cfg(desktop)]
pub mod clipboard;
pub mod config;
pub mod controller;
pub mod ocr;
pub mod platform;
pub mod storage;
