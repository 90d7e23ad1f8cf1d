use crate::rhi::{
    device::GfxDevice,
    error::GfxResult,
    types::{ClearValues, IndexBufferView, ResourceState, ScissorRect, ShaderStage, VertexBufferView, Viewport},
};

/// 命令列表
///
/// 生命周期：`reset(allocator)` 开始录制 → 录制命令 → `close()` → 提交。
/// 同一时间最多只有一份没有提交的录制
///
/// 录制命令本身不返回错误，录制过程中的错误会在 `close()` 时统一返回
pub trait GfxCommandList<D: GfxDevice> {
    /// 绑定到 allocator 并开始录制
    fn reset(&mut self, allocator: &D::CommandAllocator) -> GfxResult<()>;
    /// 结束录制
    fn close(&mut self) -> GfxResult<()>;
    fn is_recording(&self) -> bool;

    /// 复制整个 src 到 dst
    ///
    /// - command type: action
    /// - supported queue types: transfer, graphics, compute
    fn copy_buffer(&mut self, dst: &D::Buffer, src: &D::Buffer);

    fn buffer_barrier(&mut self, buffer: &D::Buffer, before: ResourceState, after: ResourceState);
    fn image_barrier(&mut self, image: &D::Image, before: ResourceState, after: ResourceState);

    /// 以 clear 的方式开始渲染：color 和 depth 在 pass 开始时被清除一次
    ///
    /// - command type: action, state
    /// - supported queue types: graphics
    fn begin_render_pass(
        &mut self,
        rtv: &D::RenderTargetView,
        dsv: &D::DepthStencilView,
        clear: &ClearValues,
        viewport: &Viewport,
        scissor: &ScissorRect,
    );
    fn end_render_pass(&mut self);

    /// - command type: state
    fn bind_pipeline(&mut self, pipeline: &D::Pipeline);

    /// - command type: state
    fn push_constants(&mut self, pipeline: &D::Pipeline, stage: ShaderStage, offset: u32, data: &[u8]);

    fn bind_vertex_buffer(&mut self, buffer: &D::Buffer, view: &VertexBufferView);
    fn bind_index_buffer(&mut self, buffer: &D::Buffer, view: &IndexBufferView);

    /// - command type: action
    /// - supported queue types: graphics
    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32);

    fn begin_label(&mut self, label: &str);
    fn end_label(&mut self);
}
