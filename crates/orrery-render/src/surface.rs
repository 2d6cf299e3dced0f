//! Window surface size tracking.
//!
//! Winit reports physical sizes that can be zero (minimized windows, Wayland
//! before the first configure). [`SurfaceSize`] clamps what the GPU sees to
//! 1×1, remembers whether the window is actually visible, and only reports a
//! change when the clamped size differs.

/// Minimum surface dimension (prevents zero-size panics).
pub const MIN_SURFACE_DIMENSION: u32 = 1;

/// Physical pixel dimensions of a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhysicalSize {
    pub width: u32,
    pub height: u32,
}

impl PhysicalSize {
    /// Width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(MIN_SURFACE_DIMENSION) as f32
    }
}

/// Emitted when the clamped physical size or the scale factor changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceResizeEvent {
    pub physical: PhysicalSize,
    pub scale_factor: f64,
}

/// Tracks the window's drawable size.
#[derive(Clone, Debug)]
pub struct SurfaceSize {
    physical: PhysicalSize,
    scale_factor: f64,
    /// False while the window reports a zero dimension.
    visible: bool,
}

impl SurfaceSize {
    /// Starts from the window's initial physical size.
    pub fn new(physical_width: u32, physical_height: u32, scale_factor: f64) -> Self {
        Self {
            physical: PhysicalSize {
                width: physical_width.max(MIN_SURFACE_DIMENSION),
                height: physical_height.max(MIN_SURFACE_DIMENSION),
            },
            scale_factor,
            visible: physical_width > 0 && physical_height > 0,
        }
    }

    /// Handle a `Resized` event. Returns `Some` only when the clamped size changed.
    pub fn handle_resize(
        &mut self,
        physical_width: u32,
        physical_height: u32,
    ) -> Option<SurfaceResizeEvent> {
        self.visible = physical_width > 0 && physical_height > 0;
        let next = PhysicalSize {
            width: physical_width.max(MIN_SURFACE_DIMENSION),
            height: physical_height.max(MIN_SURFACE_DIMENSION),
        };
        if next == self.physical {
            return None;
        }
        self.physical = next;
        Some(SurfaceResizeEvent {
            physical: next,
            scale_factor: self.scale_factor,
        })
    }

    /// Handle a `ScaleFactorChanged` event together with the new inner size.
    pub fn handle_scale_factor_changed(
        &mut self,
        scale_factor: f64,
        physical_width: u32,
        physical_height: u32,
    ) -> Option<SurfaceResizeEvent> {
        let scale_changed = (scale_factor - self.scale_factor).abs() > f64::EPSILON;
        self.scale_factor = scale_factor;
        match self.handle_resize(physical_width, physical_height) {
            Some(event) => Some(event),
            None if scale_changed => Some(SurfaceResizeEvent {
                physical: self.physical,
                scale_factor,
            }),
            None => None,
        }
    }

    pub fn physical_size(&self) -> PhysicalSize {
        self.physical
    }

    pub fn width(&self) -> u32 {
        self.physical.width
    }

    pub fn height(&self) -> u32 {
        self.physical.height
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Logical size (physical / scale factor).
    pub fn logical_size(&self) -> (f64, f64) {
        (
            self.physical.width as f64 / self.scale_factor,
            self.physical.height as f64 / self.scale_factor,
        )
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.physical.aspect_ratio()
    }

    /// Whether frames should be drawn (the window has a non-zero size).
    pub fn is_visible(&self) -> bool {
        self.visible
    }
}
