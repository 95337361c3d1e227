mod config;
mod error;
pub mod vulkan;

use anyhow::Result;
use simple_logger::{set_up_color_terminal, SimpleLogger};

pub use config::{clamp_device_index, DeviceConfig, DEFAULT_UPLOAD_THREADS, MAX_UPLOAD_THREADS};
pub use error::{InitError, InitStage};
pub use vulkan::{AppIdentity, VulkanDevice};

pub fn init_logging() -> Result<()> {
    set_up_color_terminal();
    let logger = SimpleLogger::new();
    logger.init()?;
    Ok(())
}
