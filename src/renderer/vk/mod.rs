// Vulkan objects behind the backend-neutral frame loop.

pub mod backend;
pub mod buffer;
pub mod command;
pub mod descriptor_table;
pub mod device;
pub mod encoder;
pub mod instance;
pub mod pipeline;
pub mod render_target;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod util;
