use ash::vk;

use crate::rhi::{
    GfxError, GfxResult,
    command_list::GfxCommandList,
    device::GfxDevice,
    types::{ClearValues, IndexBufferView, ResourceState, ScissorRect, ShaderStage, VertexBufferView, Viewport},
};
use crate::vulkan::{
    VulkanGpu,
    convert::{self, state_info, vk_error},
    debug_messenger::DebugType,
    device::VulkanDevice,
};

/// 一个 command pool 以及从中分配的唯一一个 command buffer
///
/// reset 时回收 pool 的所有内存，command buffer 回到 initial 状态
pub struct VulkanCommandAllocator {
    pub(crate) pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
}

// 创建与销毁
impl VulkanCommandAllocator {
    pub(crate) fn new(device: &VulkanDevice, queue_family_index: u32, name: &str) -> GfxResult<Self> {
        let pool_ci = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { device.create_command_pool(&pool_ci, None).map_err(vk_error("vkCreateCommandPool"))? };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = match unsafe { device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) if !buffers.is_empty() => buffers[0],
            Ok(_) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(GfxError::backend("vkAllocateCommandBuffers", "no command buffer returned"));
            }
            Err(e) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(vk_error("vkAllocateCommandBuffers")(e));
            }
        };

        let allocator = Self { pool, command_buffer };
        device.set_debug_name(&allocator, name);
        Ok(allocator)
    }

    /// 释放所有的 command buffer 占用的资源
    pub(crate) fn reset(&mut self, device: &VulkanDevice) -> GfxResult<()> {
        unsafe {
            device
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::RELEASE_RESOURCES)
                .map_err(vk_error("vkResetCommandPool"))
        }
    }

    pub(crate) fn destroy(self, device: &VulkanDevice) {
        // pool 销毁时会释放其中的 command buffer
        unsafe { device.destroy_command_pool(self.pool, None) }
    }
}

impl DebugType for VulkanCommandAllocator {
    fn debug_type_name() -> &'static str {
        "VulkanCommandAllocator"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.pool
    }
}

/// 录制到当前 allocator 的 command buffer 上
pub struct VulkanCommandList {
    device: VulkanDevice,
    name: String,
    /// 正在录制或者最后一次录制的 command buffer
    pub(crate) command_buffer: Option<vk::CommandBuffer>,
    recording: bool,
    in_render_pass: bool,
}

// 创建与销毁
impl VulkanCommandList {
    pub(crate) fn new(device: &VulkanDevice, name: &str) -> Self {
        Self {
            device: device.clone(),
            name: name.to_string(),
            command_buffer: None,
            recording: false,
            in_render_pass: false,
        }
    }
}

// tools
impl VulkanCommandList {
    #[inline]
    fn cmd(&self) -> Option<vk::CommandBuffer> {
        if self.recording { self.command_buffer } else { None }
    }

    pub(crate) fn is_closed(&self) -> bool {
        !self.recording && self.command_buffer.is_some()
    }
}

impl GfxCommandList<VulkanGpu> for VulkanCommandList {
    fn reset(&mut self, allocator: &<VulkanGpu as GfxDevice>::CommandAllocator) -> GfxResult<()> {
        if self.recording {
            return Err(GfxError::invalid_state(&self.name, "reset while a recording is still open"));
        }
        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .begin_command_buffer(allocator.command_buffer, &begin_info)
                .map_err(vk_error("vkBeginCommandBuffer"))?;
        }
        self.command_buffer = Some(allocator.command_buffer);
        self.recording = true;
        self.in_render_pass = false;
        Ok(())
    }

    fn close(&mut self) -> GfxResult<()> {
        let Some(cmd) = self.cmd() else {
            return Err(GfxError::invalid_state(&self.name, "close on a list that is not recording"));
        };
        if self.in_render_pass {
            return Err(GfxError::invalid_state(&self.name, "close inside a render pass"));
        }
        self.recording = false;
        unsafe { self.device.end_command_buffer(cmd).map_err(vk_error("vkEndCommandBuffer")) }
    }

    #[inline]
    fn is_recording(&self) -> bool {
        self.recording
    }

    fn copy_buffer(&mut self, dst: &<VulkanGpu as GfxDevice>::Buffer, src: &<VulkanGpu as GfxDevice>::Buffer) {
        let Some(cmd) = self.cmd() else { return };
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: src.size.min(dst.size),
        };
        unsafe { self.device.cmd_copy_buffer(cmd, src.handle, dst.handle, std::slice::from_ref(&region)) }
    }

    fn buffer_barrier(
        &mut self,
        buffer: &<VulkanGpu as GfxDevice>::Buffer,
        before: ResourceState,
        after: ResourceState,
    ) {
        let Some(cmd) = self.cmd() else { return };
        let (src, dst) = (state_info(before), state_info(after));
        let barrier = vk::BufferMemoryBarrier2::default()
            .buffer(buffer.handle)
            .offset(0)
            .size(vk::WHOLE_SIZE)
            .src_stage_mask(src.stage)
            .src_access_mask(src.access)
            .dst_stage_mask(dst.stage)
            .dst_access_mask(dst.access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED);
        let dependency = vk::DependencyInfo::default().buffer_memory_barriers(std::slice::from_ref(&barrier));
        unsafe { self.device.cmd_pipeline_barrier2(cmd, &dependency) }
    }

    fn image_barrier(
        &mut self,
        image: &<VulkanGpu as GfxDevice>::Image,
        before: ResourceState,
        after: ResourceState,
    ) {
        let Some(cmd) = self.cmd() else { return };
        let barrier = image_barrier2(image.handle, image.subresource_range(), before, after);
        let dependency = vk::DependencyInfo::default().image_memory_barriers(std::slice::from_ref(&barrier));
        unsafe { self.device.cmd_pipeline_barrier2(cmd, &dependency) }
    }

    fn begin_render_pass(
        &mut self,
        rtv: &<VulkanGpu as GfxDevice>::RenderTargetView,
        dsv: &<VulkanGpu as GfxDevice>::DepthStencilView,
        clear: &ClearValues,
        viewport: &Viewport,
        scissor: &ScissorRect,
    ) {
        let Some(cmd) = self.cmd() else { return };
        let color_attach = vk::RenderingAttachmentInfo::default()
            .image_view(rtv.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32: clear.color },
            });
        let depth_attach = vk::RenderingAttachmentInfo::default()
            .image_view(dsv.view)
            .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: clear.depth,
                    stencil: 0,
                },
            });
        let render_info = vk::RenderingInfo::default()
            .render_area(convert::rect(scissor))
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attach))
            .depth_attachment(&depth_attach);

        unsafe {
            self.device.cmd_begin_rendering(cmd, &render_info);
            self.device.cmd_set_viewport(cmd, 0, &[convert::viewport(viewport)]);
            self.device.cmd_set_scissor(cmd, 0, &[convert::rect(scissor)]);
        }
        self.in_render_pass = true;
    }

    fn end_render_pass(&mut self) {
        let Some(cmd) = self.cmd() else { return };
        unsafe { self.device.cmd_end_rendering(cmd) };
        self.in_render_pass = false;
    }

    fn bind_pipeline(&mut self, pipeline: &<VulkanGpu as GfxDevice>::Pipeline) {
        let Some(cmd) = self.cmd() else { return };
        unsafe { self.device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline) }
    }

    fn push_constants(
        &mut self,
        pipeline: &<VulkanGpu as GfxDevice>::Pipeline,
        stage: ShaderStage,
        offset: u32,
        data: &[u8],
    ) {
        let Some(cmd) = self.cmd() else { return };
        unsafe {
            self.device.cmd_push_constants(cmd, pipeline.layout, convert::shader_stage(stage), offset, data);
        }
    }

    fn bind_vertex_buffer(&mut self, buffer: &<VulkanGpu as GfxDevice>::Buffer, view: &VertexBufferView) {
        let Some(cmd) = self.cmd() else { return };
        unsafe { self.device.cmd_bind_vertex_buffers(cmd, 0, &[buffer.handle], &[view.offset]) }
    }

    fn bind_index_buffer(&mut self, buffer: &<VulkanGpu as GfxDevice>::Buffer, view: &IndexBufferView) {
        let Some(cmd) = self.cmd() else { return };
        unsafe {
            self.device.cmd_bind_index_buffer(cmd, buffer.handle, view.offset, convert::index_type(view.format));
        }
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) {
        let Some(cmd) = self.cmd() else { return };
        unsafe { self.device.cmd_draw_indexed(cmd, index_count, 1, first_index, vertex_offset, 0) }
    }

    fn begin_label(&mut self, label: &str) {
        if let Some(cmd) = self.cmd() {
            self.device.begin_label(cmd, label);
        }
    }

    fn end_label(&mut self) {
        if let Some(cmd) = self.cmd() {
            self.device.end_label(cmd);
        }
    }
}

pub(crate) fn image_barrier2(
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    before: ResourceState,
    after: ResourceState,
) -> vk::ImageMemoryBarrier2<'static> {
    let (src, dst) = (state_info(before), state_info(after));
    vk::ImageMemoryBarrier2::default()
        .image(image)
        .subresource_range(range)
        .old_layout(src.layout)
        .new_layout(dst.layout)
        .src_stage_mask(src.stage)
        .src_access_mask(src.access)
        .dst_stage_mask(dst.stage)
        .dst_access_mask(dst.access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
}
