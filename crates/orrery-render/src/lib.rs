//! wgpu plumbing for the orrery: device and surface, camera, passes, depth,
//! buffers, textures and the HDR bloom chain.

pub mod bloom;
pub mod buffer;
pub mod camera;
pub mod depth;
pub mod gpu;
pub mod headless;
pub mod pass;
pub mod surface;
pub mod texture;

pub use bloom::{BloomConfig, BloomPipeline, HDR_FORMAT};
pub use buffer::{
    BufferAllocator, IndexData, IndexStorage, MeshBuffer, VertexPositionNormalUv,
};
pub use camera::{Camera, CameraUniform};
pub use depth::DepthBuffer;
pub use gpu::{RenderContext, RenderContextError, SurfaceError, init_render_context_blocking};
pub use headless::request_headless_device;
pub use pass::{FrameEncoder, RenderPassBuilder, SPACE_BLACK};
pub use surface::{PhysicalSize, SurfaceResizeEvent, SurfaceSize};
pub use texture::{
    COLOR_FORMAT, ManagedTexture, RgbaPixels, TextureError, TextureManager, mip_level_count,
    texture_bind_group_layout,
};
