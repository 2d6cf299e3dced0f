//! Render pass helpers.
//!
//! [`RenderPassBuilder`] describes a pass declaratively and [`FrameEncoder`]
//! owns the per-frame command encoder plus the acquired swapchain image.

/// Space is black.
pub const SPACE_BLACK: wgpu::Color = wgpu::Color::BLACK;

/// Configuration for a depth attachment.
#[derive(Debug)]
pub struct DepthAttachmentConfig {
    pub view: wgpu::TextureView,
    pub clear_value: f32,
}

/// Builder for render pass descriptors.
#[derive(Debug)]
pub struct RenderPassBuilder {
    clear_color: Option<wgpu::Color>,
    depth_attachment: Option<DepthAttachmentConfig>,
    label: Option<&'static str>,
}

impl Default for RenderPassBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPassBuilder {
    /// A pass that clears to black and has no depth attachment.
    pub fn new() -> Self {
        Self {
            clear_color: Some(SPACE_BLACK),
            depth_attachment: None,
            label: None,
        }
    }

    pub fn clear_color(mut self, color: wgpu::Color) -> Self {
        self.clear_color = Some(color);
        self
    }

    /// Keep the existing color contents instead of clearing.
    pub fn load_color(mut self) -> Self {
        self.clear_color = None;
        self
    }

    /// Attach a depth buffer that is cleared to `clear_value` at pass start.
    pub fn depth(mut self, view: wgpu::TextureView, clear_value: f32) -> Self {
        self.depth_attachment = Some(DepthAttachmentConfig { view, clear_value });
        self
    }

    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    fn color_load_op(&self) -> wgpu::LoadOp<wgpu::Color> {
        match self.clear_color {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        }
    }

    /// Begin the described pass on `encoder`, rendering into `color_view`.
    pub fn begin<'encoder>(
        &'encoder self,
        encoder: &'encoder mut wgpu::CommandEncoder,
        color_view: &'encoder wgpu::TextureView,
    ) -> wgpu::RenderPass<'encoder> {
        let color_attachment = wgpu::RenderPassColorAttachment {
            view: color_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: self.color_load_op(),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        };

        let depth_stencil_attachment =
            self.depth_attachment
                .as_ref()
                .map(|depth| wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(depth.clear_value),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: self.label,
            color_attachments: &[Some(color_attachment)],
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
    }
}

/// Owns one frame's command encoder and swapchain image.
///
/// Call [`FrameEncoder::submit`] to submit and present. Dropping an
/// unsubmitted encoder submits it with a warning so the swapchain image is
/// never leaked.
pub struct FrameEncoder {
    encoder: Option<wgpu::CommandEncoder>,
    queue: wgpu::Queue,
    surface_texture: Option<wgpu::SurfaceTexture>,
    surface_view: wgpu::TextureView,
}

impl FrameEncoder {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_texture: wgpu::SurfaceTexture,
    ) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame-encoder"),
        });
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            encoder: Some(encoder),
            queue: queue.clone(),
            surface_texture: Some(surface_texture),
            surface_view,
        }
    }

    /// The command encoder together with the swapchain view.
    ///
    /// Returns `None` once the frame has been submitted.
    pub fn encoder_and_view(&mut self) -> Option<(&mut wgpu::CommandEncoder, &wgpu::TextureView)> {
        let encoder = self.encoder.as_mut()?;
        Some((encoder, &self.surface_view))
    }

    /// Begin a pass that renders into an offscreen `target` (HDR, shadow map).
    pub fn begin_render_pass_to<'a>(
        &'a mut self,
        builder: &'a RenderPassBuilder,
        target: &'a wgpu::TextureView,
    ) -> Option<wgpu::RenderPass<'a>> {
        let encoder = self.encoder.as_mut()?;
        Some(builder.begin(encoder, target))
    }

    /// Begin a pass that renders straight into the swapchain image.
    pub fn begin_render_pass<'a>(
        &'a mut self,
        builder: &'a RenderPassBuilder,
    ) -> Option<wgpu::RenderPass<'a>> {
        let encoder = self.encoder.as_mut()?;
        Some(builder.begin(encoder, &self.surface_view))
    }

    /// Submit the recorded commands and present the frame.
    pub fn submit(mut self) {
        self.finish();
    }

    fn finish(&mut self) -> bool {
        match (self.encoder.take(), self.surface_texture.take()) {
            (Some(encoder), Some(surface_texture)) => {
                self.queue.submit([encoder.finish()]);
                surface_texture.present();
                true
            }
            _ => false,
        }
    }
}

impl Drop for FrameEncoder {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            log::warn!("FrameEncoder dropped without submit(), submitting now");
            self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_clears_to_black() {
        let builder = RenderPassBuilder::new();
        assert!(matches!(
            builder.color_load_op(),
            wgpu::LoadOp::Clear(c) if c == wgpu::Color::BLACK
        ));
    }

    #[test]
    fn test_clear_color_override() {
        let builder = RenderPassBuilder::new().clear_color(wgpu::Color::RED);
        assert_eq!(builder.clear_color, Some(wgpu::Color::RED));
    }

    #[test]
    fn test_load_color_keeps_contents() {
        let builder = RenderPassBuilder::new().load_color();
        assert!(matches!(builder.color_load_op(), wgpu::LoadOp::Load));
    }

    #[test]
    fn test_depth_attachment_is_optional() {
        assert!(RenderPassBuilder::new().depth_attachment.is_none());
    }

    #[test]
    fn test_label_is_stored() {
        let builder = RenderPassBuilder::new().label("scene-pass");
        assert_eq!(builder.label, Some("scene-pass"));
    }
}
