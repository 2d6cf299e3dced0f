//! The orrery application: window, viewport lifecycle, frame pacing and
//! background texture loading.

pub mod frame_loop;
pub mod platform;
pub mod texture_loader;
pub mod viewport;
pub mod window;

pub use frame_loop::{CancellationToken, FrameClock, FrameScheduler, FrameTick, RedrawTarget};
pub use platform::{PlatformDirs, PlatformError};
pub use texture_loader::{
    LoadStatus, TextureLoadBarrier, TextureLoadError, TextureRequest, TextureSet, texture_requests,
};
pub use viewport::{HostWindow, Viewport, ViewportError};
pub use window::{App, AppError, run};
