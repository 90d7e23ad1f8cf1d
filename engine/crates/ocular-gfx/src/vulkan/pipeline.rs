use std::io::Cursor;

use ash::vk;
use itertools::Itertools;

use crate::rhi::{GfxError, GfxResult, types::PipelineDesc};
use crate::vulkan::{convert, convert::vk_error, debug_messenger::DebugType, device::VulkanDevice};

/// 由 SPIR-V 字节创建的 shader module，pipeline 创建完成之后就可以销毁
struct ShaderModule {
    handle: vk::ShaderModule,
}
impl ShaderModule {
    fn new(device: &VulkanDevice, bytes: &[u8], name: &str) -> GfxResult<Self> {
        let code = ash::util::read_spv(&mut Cursor::new(bytes))
            .map_err(|e| GfxError::backend("read_spv", format!("{name}: {e}")))?;
        let shader_module_ci = vk::ShaderModuleCreateInfo::default().code(&code);
        let handle = unsafe {
            device.create_shader_module(&shader_module_ci, None).map_err(vk_error("vkCreateShaderModule"))?
        };
        Ok(Self { handle })
    }

    fn destroy(self, device: &VulkanDevice) {
        unsafe { device.destroy_shader_module(self.handle, None) }
    }
}

pub struct VulkanPipeline {
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
}

// 创建与销毁
impl VulkanPipeline {
    pub(crate) fn new(device: &VulkanDevice, desc: &PipelineDesc) -> GfxResult<Self> {
        let push_constant_ranges = desc
            .push_constants
            .iter()
            .map(|range| vk::PushConstantRange {
                stage_flags: convert::shader_stage(range.stage),
                offset: range.offset,
                size: range.size,
            })
            .collect_vec();
        let layout_ci = vk::PipelineLayoutCreateInfo::default().push_constant_ranges(&push_constant_ranges);
        let layout = unsafe {
            device.create_pipeline_layout(&layout_ci, None).map_err(vk_error("vkCreatePipelineLayout"))?
        };

        let result = Self::create_pipeline(device, desc, layout);
        match result {
            Ok(pipeline) => {
                let pipeline = Self { pipeline, layout };
                device.set_debug_name(&pipeline, desc.name);
                Ok(pipeline)
            }
            Err(e) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                Err(e)
            }
        }
    }

    fn create_pipeline(device: &VulkanDevice, desc: &PipelineDesc, layout: vk::PipelineLayout) -> GfxResult<vk::Pipeline> {
        let vertex_module = ShaderModule::new(device, desc.vertex_shader, "vertex")?;
        let pixel_module = match ShaderModule::new(device, desc.pixel_shader, "pixel") {
            Ok(module) => module,
            Err(e) => {
                vertex_module.destroy(device);
                return Err(e);
            }
        };

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_module.handle)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(pixel_module.handle)
                .name(c"main"),
        ];

        // 顶点和 index
        let vertex_binding = vk::VertexInputBindingDescription {
            binding: 0,
            stride: desc.vertex_stride,
            input_rate: vk::VertexInputRate::VERTEX,
        };
        let vertex_attributes = desc
            .vertex_attributes
            .iter()
            .map(|attr| vk::VertexInputAttributeDescription {
                location: attr.location,
                binding: 0,
                format: convert::attribute_format(attr.format),
                offset: attr.offset,
            })
            .collect_vec();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(std::slice::from_ref(&vertex_binding))
            .vertex_attribute_descriptions(&vertex_attributes);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // viewport 和 scissor 具体值由 dynamic 决定，但是数量由该 create info 决定
        let viewport_state = vk::PipelineViewportStateCreateInfo::default().viewport_count(1).scissor_count(1);

        let front_face = if desc.front_counter_clockwise {
            vk::FrontFace::COUNTER_CLOCKWISE
        } else {
            vk::FrontFace::CLOCKWISE
        };
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(convert::cull_mode(desc.cull_mode))
            .front_face(front_face)
            .depth_clamp_enable(false)
            .line_width(1.0);
        let multisample =
            vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(true)
            .depth_write_enable(desc.depth_write)
            .depth_compare_op(convert::compare_op(desc.depth_compare))
            .stencil_test_enable(false);

        // 不混合
        let blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA);
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(std::slice::from_ref(&blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        // dynamic rendering 需要的 framebuffer 信息
        let color_formats = [convert::color_format(desc.color_format)];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(convert::depth_format(desc.depth_format));

        let pipeline_ci = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info);

        let result = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_ci), None)
        };

        vertex_module.destroy(device);
        pixel_module.destroy(device);

        match result {
            Ok(pipelines) => pipelines
                .into_iter()
                .next()
                .ok_or_else(|| GfxError::backend("vkCreateGraphicsPipelines", "no pipeline returned")),
            Err((_, e)) => Err(vk_error("vkCreateGraphicsPipelines")(e)),
        }
    }

    pub(crate) fn destroy(self, device: &VulkanDevice) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

impl DebugType for VulkanPipeline {
    fn debug_type_name() -> &'static str {
        "VulkanGraphicsPipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.pipeline
    }
}
