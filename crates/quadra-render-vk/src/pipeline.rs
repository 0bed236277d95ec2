// SPDX-License-Identifier: CEPL-1.0
use ash::util::read_spv;
use ash::vk;
use quadra_core::AssetProvider;
use quadra_math::HsvFactors;
use std::io::Cursor;
use tracing::info;

use crate::device::DeviceContext;
use crate::error::{ResourceError, VkFailure, VkResultExt};

pub const VERTEX_SHADER_PATH: &str = "shaders/shader.vert.spv";
pub const FRAGMENT_SHADER_PATH: &str = "shaders/shader.frag.spv";

/// Vertices generated by the vertex shader: four triangles fanned around the
/// quad's centre.
pub const QUAD_VERTEX_COUNT: u32 = 12;

pub const UBO_BINDING: u32 = 0;
pub const SAMPLER_BINDING: u32 = 1;
pub const HSV_PUSH_SIZE: u32 = std::mem::size_of::<HsvFactors>() as u32;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterizationConfig {
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub line_width: f32,
}

impl Default for RasterizationConfig {
    fn default() -> Self {
        Self {
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
        }
    }
}

impl RasterizationConfig {
    fn to_vk(self) -> vk::PipelineRasterizationStateCreateInfo<'static> {
        vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: self.polygon_mode,
            cull_mode: self.cull_mode,
            front_face: self.front_face,
            line_width: self.line_width,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MultisampleConfig {
    pub samples: vk::SampleCountFlags,
}

impl Default for MultisampleConfig {
    fn default() -> Self {
        Self {
            samples: vk::SampleCountFlags::TYPE_1,
        }
    }
}

impl MultisampleConfig {
    fn to_vk(self) -> vk::PipelineMultisampleStateCreateInfo<'static> {
        vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: self.samples,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorBlendConfig {
    pub blend_enable: bool,
    pub write_mask: vk::ColorComponentFlags,
}

impl Default for ColorBlendConfig {
    fn default() -> Self {
        Self {
            blend_enable: false,
            write_mask: vk::ColorComponentFlags::R
                | vk::ColorComponentFlags::G
                | vk::ColorComponentFlags::B
                | vk::ColorComponentFlags::A,
        }
    }
}

impl ColorBlendConfig {
    fn attachment(self) -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState {
            blend_enable: self.blend_enable.into(),
            src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
            dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: self.write_mask,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputAssemblyConfig {
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart: bool,
}

impl Default for InputAssemblyConfig {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart: false,
        }
    }
}

impl InputAssemblyConfig {
    fn to_vk(self) -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
        vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: self.topology,
            primitive_restart_enable: self.primitive_restart.into(),
            ..Default::default()
        }
    }
}

/// Fixed-function state of the quad pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PipelineConfig {
    pub input_assembly: InputAssemblyConfig,
    pub rasterization: RasterizationConfig,
    pub multisample: MultisampleConfig,
    pub color_blend: ColorBlendConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ResourceError> {
        let r = &self.rasterization;
        if !(r.line_width > 0.0) {
            return Err(ResourceError::InvalidPipelineConfig("line width must be positive"));
        }
        // wideLines is never enabled on the device
        if r.line_width != 1.0 {
            return Err(ResourceError::InvalidPipelineConfig("line width must be 1.0"));
        }
        if self.multisample.samples.as_raw().count_ones() != 1 {
            return Err(ResourceError::InvalidPipelineConfig(
                "sample count must be a single power of two",
            ));
        }
        // swapchain images are single-sampled and there is no resolve target
        if self.multisample.samples != vk::SampleCountFlags::TYPE_1 {
            return Err(ResourceError::InvalidPipelineConfig(
                "multisampling needs a resolve attachment",
            ));
        }
        if self.color_blend.write_mask.is_empty() {
            return Err(ResourceError::InvalidPipelineConfig("color write mask is empty"));
        }
        let restartable = matches!(
            self.input_assembly.topology,
            vk::PrimitiveTopology::LINE_STRIP
                | vk::PrimitiveTopology::TRIANGLE_STRIP
                | vk::PrimitiveTopology::TRIANGLE_FAN
        );
        if self.input_assembly.primitive_restart && !restartable {
            return Err(ResourceError::InvalidPipelineConfig(
                "primitive restart needs a strip or fan topology",
            ));
        }
        Ok(())
    }
}

/// Validated SPIR-V for both stages, kept so the pipeline can be rebuilt
/// without going back to the asset provider.
#[derive(Clone, Debug, Default)]
pub struct ShaderCode {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderCode {
    pub fn load(assets: &dyn AssetProvider) -> Result<Self, ResourceError> {
        Ok(Self {
            vertex: load_spirv(assets, VERTEX_SHADER_PATH)?,
            fragment: load_spirv(assets, FRAGMENT_SHADER_PATH)?,
        })
    }
}

/// Render pass, layouts and the graphics pipeline for one color format.
pub struct PipelineState {
    pub render_pass: vk::RenderPass,
    pub descriptor_set_layout: vk::DescriptorSetLayout,
    pub pipeline_layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    pub format: vk::Format,
    pub config: PipelineConfig,
    shaders: ShaderCode,
}

unsafe fn create_render_pass(device: &ash::Device, format: vk::Format) -> Result<vk::RenderPass, VkFailure> {
    let color_att = vk::AttachmentDescription {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    };
    let att_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &att_ref,
        ..Default::default()
    };
    // The acquire semaphore is waited at COLOR_ATTACHMENT_OUTPUT; the layout
    // transition must not start before it.
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        dependency_flags: vk::DependencyFlags::empty(),
    };
    let rp_info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_att,
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    device
        .create_render_pass(&rp_info, None)
        .vk_context("create_render_pass")
}

unsafe fn create_descriptor_set_layout(device: &ash::Device) -> Result<vk::DescriptorSetLayout, VkFailure> {
    let bindings = [
        vk::DescriptorSetLayoutBinding {
            binding: UBO_BINDING,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::VERTEX,
            ..Default::default()
        },
        vk::DescriptorSetLayoutBinding {
            binding: SAMPLER_BINDING,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            ..Default::default()
        },
    ];
    let ci = vk::DescriptorSetLayoutCreateInfo {
        s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
        binding_count: bindings.len() as u32,
        p_bindings: bindings.as_ptr(),
        ..Default::default()
    };
    device
        .create_descriptor_set_layout(&ci, None)
        .vk_context("create_descriptor_set_layout")
}

/// Push-constant range carrying the HSV factors. Always declared, so the
/// layout matches what recording pushes.
pub fn hsv_push_range() -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX,
        offset: 0,
        size: HSV_PUSH_SIZE,
    }
}

unsafe fn create_pipeline_layout(
    device: &ash::Device,
    set_layout: vk::DescriptorSetLayout,
) -> Result<vk::PipelineLayout, VkFailure> {
    let push = hsv_push_range();
    let layout_info = vk::PipelineLayoutCreateInfo {
        s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
        set_layout_count: 1,
        p_set_layouts: &set_layout,
        push_constant_range_count: 1,
        p_push_constant_ranges: &push,
        ..Default::default()
    };
    device
        .create_pipeline_layout(&layout_info, None)
        .vk_context("create_pipeline_layout")
}

/// Reads and validates SPIR-V from the asset provider.
pub fn load_spirv(assets: &dyn AssetProvider, path: &str) -> Result<Vec<u32>, ResourceError> {
    let bytes = assets.read(path)?;
    read_spv(&mut Cursor::new(&bytes[..])).map_err(|source| ResourceError::InvalidShader {
        path: path.to_owned(),
        source,
    })
}

unsafe fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule, VkFailure> {
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: code.as_ptr(),
        code_size: code.len() * 4,
        ..Default::default()
    };
    device
        .create_shader_module(&ci, None)
        .vk_context("create_shader_module")
}

unsafe fn create_graphics_pipeline(
    device: &ash::Device,
    shaders: &ShaderCode,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    config: &PipelineConfig,
) -> Result<vk::Pipeline, ResourceError> {
    let vs = create_shader_module(device, &shaders.vertex)?;
    let fs = match create_shader_module(device, &shaders.fragment) {
        Ok(m) => m,
        Err(e) => {
            device.destroy_shader_module(vs, None);
            return Err(e.into());
        }
    };
    let entry = c"main";

    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: vs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: fs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
    ];

    // Positions come from gl_VertexIndex.
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        ..Default::default()
    };
    let input_assembly = config.input_assembly.to_vk();
    let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        dynamic_state_count: dyn_states.len() as u32,
        p_dynamic_states: dyn_states.as_ptr(),
        ..Default::default()
    };
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: 1,
        p_viewports: std::ptr::null(), // dynamic
        scissor_count: 1,
        p_scissors: std::ptr::null(), // dynamic
        ..Default::default()
    };
    let raster = config.rasterization.to_vk();
    let multisample = config.multisample.to_vk();
    let color_blend_att = config.color_blend.attachment();
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        logic_op: vk::LogicOp::COPY,
        attachment_count: 1,
        p_attachments: &color_blend_att,
        ..Default::default()
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_viewport_state: &viewport_state,
        p_rasterization_state: &raster,
        p_multisample_state: &multisample,
        p_color_blend_state: &color_blend,
        p_dynamic_state: &dynamic_state,
        layout,
        render_pass,
        subpass: 0,
        ..Default::default()
    };

    let created = device.create_graphics_pipelines(
        vk::PipelineCache::null(),
        std::slice::from_ref(&pipeline_info),
        None,
    );
    device.destroy_shader_module(vs, None);
    device.destroy_shader_module(fs, None);

    match created {
        Ok(p) => Ok(p[0]),
        Err((_, err)) => Err(VkFailure {
            call: "create_graphics_pipelines",
            result: err,
        }
        .into()),
    }
}

impl PipelineState {
    /// Nothing created yet; `destroy` on it is a no-op.
    pub fn empty(format: vk::Format) -> Self {
        Self {
            render_pass: vk::RenderPass::null(),
            descriptor_set_layout: vk::DescriptorSetLayout::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            format,
            config: PipelineConfig::default(),
            shaders: ShaderCode::default(),
        }
    }

    pub unsafe fn new(
        ctx: &DeviceContext,
        assets: &dyn AssetProvider,
        format: vk::Format,
        config: PipelineConfig,
    ) -> Result<Self, ResourceError> {
        config.validate()?;
        let shaders = ShaderCode::load(assets)?;
        let device = ctx.device();

        let mut state = Self::empty(format);
        state.config = config;
        state.shaders = shaders;
        let built = (|| -> Result<(), ResourceError> {
            state.descriptor_set_layout = create_descriptor_set_layout(device)?;
            state.pipeline_layout = create_pipeline_layout(device, state.descriptor_set_layout)?;
            state.render_pass = create_render_pass(device, format)?;
            state.pipeline = create_graphics_pipeline(
                device,
                &state.shaders,
                state.render_pass,
                state.pipeline_layout,
                &state.config,
            )?;
            Ok(())
        })();
        if let Err(e) = built {
            state.destroy(device);
            return Err(e);
        }
        info!("pipeline: built for {format:?}");
        Ok(state)
    }

    /// Rebuilds the format-dependent parts (render pass and pipeline).
    /// Layouts are format-agnostic and kept. Caller guarantees the device is
    /// idle and that framebuffers of the old render pass are gone.
    pub unsafe fn rebuild_for_format(
        &mut self,
        ctx: &DeviceContext,
        format: vk::Format,
    ) -> Result<(), ResourceError> {
        if format == self.format && self.pipeline != vk::Pipeline::null() {
            return Ok(());
        }
        let device = ctx.device();
        let render_pass = create_render_pass(device, format)?;
        let pipeline = match create_graphics_pipeline(
            device,
            &self.shaders,
            render_pass,
            self.pipeline_layout,
            &self.config,
        ) {
            Ok(p) => p,
            Err(e) => {
                device.destroy_render_pass(render_pass, None);
                return Err(e);
            }
        };
        device.destroy_pipeline(self.pipeline, None);
        device.destroy_render_pass(self.render_pass, None);
        self.pipeline = pipeline;
        self.render_pass = render_pass;
        info!("pipeline: rebuilt {:?} -> {format:?}", self.format);
        self.format = format;
        Ok(())
    }

    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        if self.pipeline != vk::Pipeline::null() {
            device.destroy_pipeline(self.pipeline, None);
            self.pipeline = vk::Pipeline::null();
        }
        if self.render_pass != vk::RenderPass::null() {
            device.destroy_render_pass(self.render_pass, None);
            self.render_pass = vk::RenderPass::null();
        }
        if self.pipeline_layout != vk::PipelineLayout::null() {
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.pipeline_layout = vk::PipelineLayout::null();
        }
        if self.descriptor_set_layout != vk::DescriptorSetLayout::null() {
            device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            self.descriptor_set_layout = vk::DescriptorSetLayout::null();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadra_core::MemoryAssets;

    #[test]
    fn default_config_matches_the_quad() {
        let c = PipelineConfig::default();
        c.validate().unwrap();
        assert_eq!(c.input_assembly.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(c.rasterization.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(c.rasterization.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(c.multisample.samples, vk::SampleCountFlags::TYPE_1);
        assert!(!c.color_blend.blend_enable);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut c = PipelineConfig::default();
        c.rasterization.line_width = 0.0;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.rasterization.line_width = f32::NAN;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.multisample.samples = vk::SampleCountFlags::TYPE_4;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.color_blend.write_mask = vk::ColorComponentFlags::empty();
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.input_assembly.primitive_restart = true;
        assert!(c.validate().is_err());
        c.input_assembly.topology = vk::PrimitiveTopology::TRIANGLE_STRIP;
        assert!(c.validate().is_ok());
    }

    #[test]
    fn push_range_covers_hsv() {
        let r = hsv_push_range();
        assert_eq!(r.size, 12);
        assert_eq!(r.offset, 0);
        assert_eq!(r.stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn bundled_shaders_are_valid_spirv() {
        let assets = crate::builtin_shaders();
        assert!(!load_spirv(&assets, VERTEX_SHADER_PATH).unwrap().is_empty());
        assert!(!load_spirv(&assets, FRAGMENT_SHADER_PATH).unwrap().is_empty());
    }

    #[test]
    fn malformed_shader_is_reported() {
        let assets = MemoryAssets::new().with(VERTEX_SHADER_PATH, vec![1, 2, 3]);
        assert!(matches!(
            load_spirv(&assets, VERTEX_SHADER_PATH),
            Err(ResourceError::InvalidShader { .. })
        ));
        assert!(matches!(
            load_spirv(&assets, FRAGMENT_SHADER_PATH),
            Err(ResourceError::Asset(_))
        ));
    }
}
