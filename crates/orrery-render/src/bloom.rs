//! HDR bloom and tone mapping.
//!
//! The scene renders into an `Rgba16Float` target. Bright pixels are
//! extracted, blurred through a downsample/upsample mip chain, then the HDR
//! image is ACES tone-mapped onto the swapchain and the glow added on top.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

/// Scene target format.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Bloom and tone mapping parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct BloomConfig {
    /// When false only tone mapping runs.
    pub enabled: bool,
    /// Luminance above which pixels glow.
    pub threshold: f32,
    /// Knee width as a fraction of the threshold, in \[0, 1\].
    pub soft_knee: f32,
    /// Glow strength multiplier.
    pub strength: f32,
    /// Blur tap offset multiplier.
    pub radius: f32,
    /// Downsample levels; each halves resolution.
    pub iterations: u32,
    /// Linear exposure applied before ACES.
    pub exposure: f32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.1,
            soft_knee: 0.5,
            strength: 1.0,
            radius: 1.0,
            iterations: 5,
            exposure: 1.5,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct BloomParams {
    pub threshold: f32,
    pub soft_knee: f32,
    pub strength: f32,
    pub radius: f32,
    pub exposure: f32,
    pub _padding: [f32; 3],
}

impl From<&BloomConfig> for BloomParams {
    fn from(config: &BloomConfig) -> Self {
        Self {
            threshold: config.threshold,
            soft_knee: config.soft_knee,
            strength: if config.enabled { config.strength } else { 0.0 },
            radius: config.radius,
            exposure: config.exposure,
            _padding: [0.0; 3],
        }
    }
}

pub const BLOOM_SHADER_SOURCE: &str = r#"
struct BloomParams {
    threshold: f32,
    soft_knee: f32,
    strength: f32,
    radius: f32,
    exposure: f32,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(0) var<uniform> params: BloomParams;
@group(1) @binding(0) var input_tex: texture_2d<f32>;
@group(1) @binding(1) var input_sampler: sampler;

@vertex
fn vs_fullscreen(@builtin(vertex_index) idx: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((idx << 1u) & 2u), f32(idx & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

fn soft_threshold(color: vec3<f32>, threshold: f32, soft_knee: f32) -> vec3<f32> {
    let luminance = dot(color, vec3<f32>(0.2126, 0.7152, 0.0722));
    let knee = threshold * soft_knee;
    let soft = clamp(luminance - threshold + knee, 0.0, 2.0 * knee);
    let contribution = soft * soft / (4.0 * knee + 0.0001);
    let factor = max(luminance - threshold, contribution) / max(luminance, 0.0001);
    return color * max(factor, 0.0);
}

fn aces(x: vec3<f32>) -> vec3<f32> {
    return clamp((x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14), vec3<f32>(0.0), vec3<f32>(1.0));
}

@fragment
fn fs_extract(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(input_tex, input_sampler, in.uv).rgb;
    return vec4<f32>(soft_threshold(color, params.threshold, params.soft_knee), 1.0);
}

@fragment
fn fs_downsample(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = params.radius / vec2<f32>(textureDimensions(input_tex));
    let a = textureSample(input_tex, input_sampler, in.uv + vec2(-texel.x, -texel.y)).rgb;
    let b = textureSample(input_tex, input_sampler, in.uv + vec2( texel.x, -texel.y)).rgb;
    let c = textureSample(input_tex, input_sampler, in.uv + vec2(-texel.x,  texel.y)).rgb;
    let d = textureSample(input_tex, input_sampler, in.uv + vec2( texel.x,  texel.y)).rgb;
    return vec4<f32>((a + b + c + d) * 0.25, 1.0);
}

@fragment
fn fs_upsample(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(textureSample(input_tex, input_sampler, in.uv).rgb, 1.0);
}

@fragment
fn fs_tonemap(in: VertexOutput) -> @location(0) vec4<f32> {
    let hdr = textureSample(input_tex, input_sampler, in.uv).rgb;
    return vec4<f32>(aces(hdr * params.exposure), 1.0);
}

@fragment
fn fs_bloom_composite(in: VertexOutput) -> @location(0) vec4<f32> {
    let glow = textureSample(input_tex, input_sampler, in.uv).rgb * params.strength;
    return vec4<f32>(aces(glow * params.exposure), 1.0);
}
"#;

/// ACES filmic curve, CPU mirror of the shader's `aces`.
pub fn aces_filmic(x: f32) -> f32 {
    ((x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14)).clamp(0.0, 1.0)
}

/// Fraction of a pixel's color that passes the soft threshold.
///
/// The knee spans `threshold * soft_knee` on either side of the threshold,
/// so the factor never exceeds 1 below it.
pub fn soft_threshold_factor(luminance: f32, threshold: f32, soft_knee: f32) -> f32 {
    let knee = threshold * soft_knee;
    let soft = (luminance - threshold + knee).clamp(0.0, 2.0 * knee);
    let contribution = soft * soft / (4.0 * knee + 0.0001);
    ((luminance - threshold).max(contribution) / luminance.max(0.0001)).max(0.0)
}

/// Sizes of the blur chain for a `width`×`height` target.
pub fn mip_chain_sizes(width: u32, height: u32, iterations: u32) -> Vec<(u32, u32)> {
    let mut sizes = Vec::with_capacity(iterations as usize);
    let mut w = (width / 2).max(1);
    let mut h = (height / 2).max(1);
    for _ in 0..iterations {
        sizes.push((w, h));
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }
    sizes
}

struct RenderTarget {
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    size: (u32, u32),
}

/// Owns the HDR scene target, the blur chain and every post pipeline.
pub struct BloomPipeline {
    config: BloomConfig,
    texture_bgl: wgpu::BindGroupLayout,
    extract_pipeline: wgpu::RenderPipeline,
    downsample_pipeline: wgpu::RenderPipeline,
    upsample_pipeline: wgpu::RenderPipeline,
    tonemap_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
    hdr: RenderTarget,
    mips: Vec<RenderTarget>,
}

impl BloomPipeline {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: BloomConfig,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bloom-shader"),
            source: wgpu::ShaderSource::Wgsl(BLOOM_SHADER_SOURCE.into()),
        });

        let params_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom-params-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom-texture-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom-layout"),
            bind_group_layouts: &[&params_bgl, &texture_bgl],
            immediate_size: 0,
        });

        let additive = Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::OVER,
        });
        let fullscreen = |entry: &str, format, blend, label: &str| {
            create_fullscreen_pipeline(device, &shader, &layout, entry, format, blend, label)
        };
        let extract_pipeline = fullscreen("fs_extract", HDR_FORMAT, None, "bloom-extract");
        let downsample_pipeline =
            fullscreen("fs_downsample", HDR_FORMAT, None, "bloom-downsample");
        let upsample_pipeline = fullscreen("fs_upsample", HDR_FORMAT, additive, "bloom-upsample");
        let tonemap_pipeline = fullscreen("fs_tonemap", surface_format, None, "bloom-tonemap");
        let composite_pipeline = fullscreen(
            "fs_bloom_composite",
            surface_format,
            additive,
            "bloom-composite",
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("bloom-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("bloom-params"),
            contents: bytemuck::bytes_of(&BloomParams::from(&config)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bloom-params-bg"),
            layout: &params_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let hdr = create_target(device, &texture_bgl, &sampler, width, height, "bloom-hdr");
        let mips = create_mip_chain(device, &texture_bgl, &sampler, width, height, &config);

        Self {
            config,
            texture_bgl,
            extract_pipeline,
            downsample_pipeline,
            upsample_pipeline,
            tonemap_pipeline,
            composite_pipeline,
            sampler,
            params_buffer,
            params_bind_group,
            hdr,
            mips,
        }
    }

    /// The view the scene pass should render into.
    pub fn hdr_view(&self) -> &wgpu::TextureView {
        &self.hdr.view
    }

    /// Size of the HDR target in pixels.
    pub fn size(&self) -> (u32, u32) {
        self.hdr.size
    }

    pub fn config(&self) -> &BloomConfig {
        &self.config
    }

    /// Recreate the HDR target and blur chain at the new surface size.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.hdr = create_target(
            device,
            &self.texture_bgl,
            &self.sampler,
            width,
            height,
            "bloom-hdr",
        );
        self.mips = create_mip_chain(
            device,
            &self.texture_bgl,
            &self.sampler,
            width,
            height,
            &self.config,
        );
    }

    /// Upload new parameters. A changed iteration count takes effect on the next resize.
    pub fn update_config(&mut self, queue: &wgpu::Queue, config: BloomConfig) {
        queue.write_buffer(
            &self.params_buffer,
            0,
            bytemuck::bytes_of(&BloomParams::from(&config)),
        );
        self.config = config;
    }

    /// Extract, blur, tone-map and composite into `surface_view`.
    pub fn execute(&self, encoder: &mut wgpu::CommandEncoder, surface_view: &wgpu::TextureView) {
        let blur = self.config.enabled && !self.mips.is_empty();
        if blur {
            self.run_pass(
                encoder,
                &self.extract_pipeline,
                &self.hdr.bind_group,
                &self.mips[0].view,
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                "bloom-extract",
            );
            for i in 1..self.mips.len() {
                self.run_pass(
                    encoder,
                    &self.downsample_pipeline,
                    &self.mips[i - 1].bind_group,
                    &self.mips[i].view,
                    wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    "bloom-downsample",
                );
            }
            for i in (0..self.mips.len() - 1).rev() {
                self.run_pass(
                    encoder,
                    &self.upsample_pipeline,
                    &self.mips[i + 1].bind_group,
                    &self.mips[i].view,
                    wgpu::LoadOp::Load,
                    "bloom-upsample",
                );
            }
        }

        self.run_pass(
            encoder,
            &self.tonemap_pipeline,
            &self.hdr.bind_group,
            surface_view,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            "bloom-tonemap",
        );

        if blur {
            self.run_pass(
                encoder,
                &self.composite_pipeline,
                &self.mips[0].bind_group,
                surface_view,
                wgpu::LoadOp::Load,
                "bloom-composite",
            );
        }
    }

    fn run_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::RenderPipeline,
        texture_bind_group: &wgpu::BindGroup,
        target_view: &wgpu::TextureView,
        load_op: wgpu::LoadOp<wgpu::Color>,
        label: &str,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: load_op,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.params_bind_group, &[]);
        pass.set_bind_group(1, texture_bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    fragment_entry: &str,
    target_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}

fn create_target(
    device: &wgpu::Device,
    texture_bgl: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
    label: &str,
) -> RenderTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: HDR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: texture_bgl,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    RenderTarget {
        view,
        bind_group,
        size: (width.max(1), height.max(1)),
    }
}

fn create_mip_chain(
    device: &wgpu::Device,
    texture_bgl: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
    config: &BloomConfig,
) -> Vec<RenderTarget> {
    mip_chain_sizes(width, height, config.iterations)
        .into_iter()
        .enumerate()
        .map(|(i, (w, h))| {
            log::trace!("Bloom mip {i}: {w}x{h}");
            create_target(device, texture_bgl, sampler, w, h, "bloom-mip")
        })
        .collect()
}
