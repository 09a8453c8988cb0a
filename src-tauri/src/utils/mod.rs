pub mod image_data;
pub mod logging;
