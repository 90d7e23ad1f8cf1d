use ash::vk;

use crate::rhi::types::{
    ColorFormat, CompareOp, CullMode, DepthFormat, IndexFormat, ResourceState, ScissorRect, ShaderStage,
    VertexAttributeFormat, Viewport,
};

/// 资源状态在 Vulkan 中对应的 layout / stage / access
#[derive(Clone, Copy, Debug)]
pub(crate) struct StateInfo {
    pub layout: vk::ImageLayout,
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

pub(crate) fn state_info(state: ResourceState) -> StateInfo {
    match state {
        ResourceState::Common => StateInfo {
            layout: vk::ImageLayout::UNDEFINED,
            stage: vk::PipelineStageFlags2::TOP_OF_PIPE,
            access: vk::AccessFlags2::NONE,
        },
        ResourceState::GenericRead => StateInfo {
            layout: vk::ImageLayout::GENERAL,
            stage: vk::PipelineStageFlags2::ALL_COMMANDS,
            access: vk::AccessFlags2::MEMORY_READ,
        },
        ResourceState::CopySource => StateInfo {
            layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            stage: vk::PipelineStageFlags2::COPY,
            access: vk::AccessFlags2::TRANSFER_READ,
        },
        ResourceState::CopyDest => StateInfo {
            layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            stage: vk::PipelineStageFlags2::COPY,
            access: vk::AccessFlags2::TRANSFER_WRITE,
        },
        ResourceState::VertexAndIndex => StateInfo {
            layout: vk::ImageLayout::UNDEFINED,
            stage: vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT | vk::PipelineStageFlags2::INDEX_INPUT,
            access: vk::AccessFlags2::VERTEX_ATTRIBUTE_READ | vk::AccessFlags2::INDEX_READ,
        },
        ResourceState::RenderTarget => StateInfo {
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            access: vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        },
        ResourceState::CompositorRead => StateInfo {
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
            access: vk::AccessFlags2::SHADER_SAMPLED_READ,
        },
        ResourceState::DepthWrite => StateInfo {
            layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            stage: vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        },
    }
}

#[inline]
pub(crate) fn color_format(format: ColorFormat) -> vk::Format {
    match format {
        ColorFormat::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        ColorFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
    }
}

#[inline]
pub(crate) fn depth_format(format: DepthFormat) -> vk::Format {
    match format {
        DepthFormat::D32Float => vk::Format::D32_SFLOAT,
    }
}

#[inline]
pub(crate) fn index_type(format: IndexFormat) -> vk::IndexType {
    match format {
        IndexFormat::U16 => vk::IndexType::UINT16,
        IndexFormat::U32 => vk::IndexType::UINT32,
    }
}

#[inline]
pub(crate) fn shader_stage(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Pixel => vk::ShaderStageFlags::FRAGMENT,
    }
}

#[inline]
pub(crate) fn attribute_format(format: VertexAttributeFormat) -> vk::Format {
    match format {
        VertexAttributeFormat::Float32x2 => vk::Format::R32G32_SFLOAT,
        VertexAttributeFormat::Float32x3 => vk::Format::R32G32B32_SFLOAT,
        VertexAttributeFormat::Float32x4 => vk::Format::R32G32B32A32_SFLOAT,
    }
}

#[inline]
pub(crate) fn cull_mode(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

#[inline]
pub(crate) fn compare_op(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

/// 使用负高度的 viewport，让 NDC 的 y 轴朝上
pub(crate) fn viewport(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.x,
        y: viewport.y + viewport.height,
        width: viewport.width,
        height: -viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

pub(crate) fn rect(scissor: &ScissorRect) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D {
            x: scissor.x,
            y: scissor.y,
        },
        extent: vk::Extent2D {
            width: scissor.width,
            height: scissor.height,
        },
    }
}

pub(crate) fn vk_error(call: &'static str) -> impl FnOnce(vk::Result) -> crate::rhi::GfxError {
    move |result| match result {
        vk::Result::ERROR_DEVICE_LOST => crate::rhi::GfxError::DeviceLost,
        other => crate::rhi::GfxError::backend(call, other),
    }
}
