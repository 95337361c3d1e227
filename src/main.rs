use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};
use vk_device_init::{
    init_logging, AppIdentity, DeviceConfig, VulkanDevice, DEFAULT_UPLOAD_THREADS,
};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

const WINDOW_WIDTH: u32 = 800;
const WINDOW_HEIGHT: u32 = 600;
const WINDOW_TITLE: &str = "vk-listdevices";

/// Initializes a Vulkan device for a window and reports what was picked.
#[derive(Parser, Debug)]
#[command(version, about)]
struct CliArgs {
    /// Index into the ranked list of compatible devices
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    device: i64,
    /// Background upload threads, 0 picks the default
    #[arg(short, long, default_value_t = DEFAULT_UPLOAD_THREADS as i64, allow_negative_numbers = true)]
    upload_threads: i64,
    /// Enable the Khronos validation layer
    #[arg(long)]
    debug_layer: bool,
    /// Don't log a backtrace after validation errors
    #[arg(long)]
    no_debug_callstack: bool,
    /// Only print the ranked device list
    #[arg(long)]
    list: bool,
}

impl CliArgs {
    fn device_config(&self) -> DeviceConfig {
        DeviceConfig::new(self.device, self.upload_threads, self.debug_layer)
            .with_debug_callstack(!self.no_debug_callstack)
    }
}

fn main() -> Result<()> {
    init_logging()?;
    let args = CliArgs::parse();
    debug!("{args:?}");

    let event_loop = EventLoop::new()?;
    let mut app = App {
        config: args.device_config(),
        list_only: args.list,
        window: None,
        result: Ok(()),
    };
    event_loop.run_app(&mut app)?;
    app.result
}

struct App {
    config: DeviceConfig,
    list_only: bool,
    /// Kept until the event loop exits; the surface has to go first.
    window: Option<Window>,
    result: Result<()>,
}

impl App {
    fn report(&self, window: &Window) -> Result<()> {
        let device = VulkanDevice::new(self.config, &AppIdentity::default(), window)?;
        for (index, name) in device.device_list() {
            println!("#{index} - {name}");
        }
        if self.list_only {
            return Ok(());
        }

        let selected = device.selected();
        let roles = selected.roles();
        println!("Selected: {}", selected.device().name);
        println!("Graphics family: {}", roles.graphics_family);
        println!("Present family: {:?}", roles.present_family);
        println!(
            "Upload family: {} (graphics capable: {})",
            roles.upload_family, roles.upload_supports_graphics
        );
        for (index, upload) in device.upload_queues().iter().enumerate() {
            println!(
                "Upload queue {index}: family {} slot {}",
                upload.family_index, upload.queue_index
            );
        }
        println!("Extensions: {}", selected.enabled_extensions.join(", "));
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
            .with_visible(false);
        match event_loop.create_window(attributes) {
            Ok(window) => {
                self.result = self.report(&window);
                if let Err(err) = &self.result {
                    error!("{err}");
                }
                self.window = Some(window);
            }
            Err(err) => {
                error!("Error while creating window: {err}");
                self.result = Err(err.into());
            }
        }
        event_loop.exit();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        if let WindowEvent::CloseRequested = event {
            event_loop.exit();
        }
    }
}
