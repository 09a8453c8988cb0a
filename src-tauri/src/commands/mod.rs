pub mod bridge;
pub mod capture;
pub mod config;
pub mod ocr;
