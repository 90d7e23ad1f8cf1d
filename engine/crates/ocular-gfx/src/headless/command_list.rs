use std::rc::Rc;

use crate::headless::{
    HeadlessGpu,
    resources::{AllocatorCell, RecordedCommand},
};
use crate::rhi::{
    command_list::GfxCommandList,
    device::GfxDevice,
    error::{GfxError, GfxResult},
    types::{ClearValues, IndexBufferView, ResourceState, ScissorRect, ShaderStage, VertexBufferView, Viewport},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ListState {
    Closed,
    Recording,
}

/// 软件 command list：只记录命令，在提交时由 [`HeadlessGpu`] 执行
pub struct HeadlessCommandList {
    name: String,
    state: ListState,
    allocator: Option<Rc<AllocatorCell>>,
    commands: Vec<RecordedCommand>,
    in_render_pass: bool,
    label_depth: u32,
    /// 录制过程中的第一个错误，在 close 时返回
    deferred_error: Option<GfxError>,
}

// 创建与销毁
impl HeadlessCommandList {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: ListState::Closed,
            allocator: None,
            commands: Vec::new(),
            in_render_pass: false,
            label_depth: 0,
            deferred_error: None,
        }
    }
}

// getters
impl HeadlessCommandList {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub(crate) fn allocator_name(&self) -> &str {
        self.allocator.as_ref().map_or("", |a| a.name.as_str())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state == ListState::Closed
    }
}

// tools
impl HeadlessCommandList {
    fn fail(&mut self, reason: impl Into<String>) {
        if self.deferred_error.is_none() {
            self.deferred_error = Some(GfxError::invalid_state(self.name.clone(), reason));
        }
    }

    fn record(&mut self, cmd: RecordedCommand) {
        if self.state != ListState::Recording {
            self.fail(format!("command {:?} recorded on a closed list", cmd));
            return;
        }
        self.commands.push(cmd);
    }
}

impl GfxCommandList<HeadlessGpu> for HeadlessCommandList {
    fn reset(&mut self, allocator: &<HeadlessGpu as GfxDevice>::CommandAllocator) -> GfxResult<()> {
        if self.state == ListState::Recording {
            return Err(GfxError::invalid_state(&self.name, "reset while a recording is still open"));
        }
        if allocator.cell.recording.get() {
            return Err(GfxError::invalid_state(
                &self.name,
                format!("allocator '{}' is already used by another open recording", allocator.cell.name),
            ));
        }

        allocator.cell.recording.set(true);
        self.allocator = Some(allocator.cell.clone());
        self.state = ListState::Recording;
        self.commands.clear();
        self.in_render_pass = false;
        self.label_depth = 0;
        self.deferred_error = None;
        Ok(())
    }

    fn close(&mut self) -> GfxResult<()> {
        if self.state != ListState::Recording {
            return Err(GfxError::invalid_state(&self.name, "close on a list that is not recording"));
        }
        if self.in_render_pass {
            self.fail("close inside a render pass");
        }
        if self.label_depth != 0 {
            self.fail("close with unbalanced debug labels");
        }

        self.state = ListState::Closed;
        if let Some(allocator) = &self.allocator {
            allocator.recording.set(false);
        }
        match self.deferred_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    #[inline]
    fn is_recording(&self) -> bool {
        self.state == ListState::Recording
    }

    fn copy_buffer(
        &mut self,
        dst: &<HeadlessGpu as GfxDevice>::Buffer,
        src: &<HeadlessGpu as GfxDevice>::Buffer,
    ) {
        if self.in_render_pass {
            self.fail("copy inside a render pass");
        }
        self.record(RecordedCommand::CopyBuffer {
            dst: dst.key,
            src: src.key,
        });
    }

    fn buffer_barrier(
        &mut self,
        buffer: &<HeadlessGpu as GfxDevice>::Buffer,
        before: ResourceState,
        after: ResourceState,
    ) {
        self.record(RecordedCommand::BufferBarrier {
            buffer: buffer.key,
            before,
            after,
        });
    }

    fn image_barrier(
        &mut self,
        image: &<HeadlessGpu as GfxDevice>::Image,
        before: ResourceState,
        after: ResourceState,
    ) {
        if self.in_render_pass {
            self.fail("image barrier inside a render pass");
        }
        self.record(RecordedCommand::ImageBarrier {
            image: image.key,
            before,
            after,
        });
    }

    fn begin_render_pass(
        &mut self,
        rtv: &<HeadlessGpu as GfxDevice>::RenderTargetView,
        dsv: &<HeadlessGpu as GfxDevice>::DepthStencilView,
        clear: &ClearValues,
        viewport: &Viewport,
        scissor: &ScissorRect,
    ) {
        if self.in_render_pass {
            self.fail("nested render pass");
        }
        self.in_render_pass = true;
        self.record(RecordedCommand::BeginRenderPass {
            rtv: rtv.image,
            dsv: dsv.image,
            clear: *clear,
            viewport: *viewport,
            scissor: *scissor,
        });
    }

    fn end_render_pass(&mut self) {
        if !self.in_render_pass {
            self.fail("end_render_pass without begin_render_pass");
        }
        self.in_render_pass = false;
        self.record(RecordedCommand::EndRenderPass);
    }

    fn bind_pipeline(&mut self, pipeline: &<HeadlessGpu as GfxDevice>::Pipeline) {
        self.record(RecordedCommand::BindPipeline { pipeline: pipeline.key });
    }

    fn push_constants(
        &mut self,
        _pipeline: &<HeadlessGpu as GfxDevice>::Pipeline,
        stage: ShaderStage,
        offset: u32,
        data: &[u8],
    ) {
        self.record(RecordedCommand::PushConstants {
            stage,
            offset,
            data: data.to_vec(),
        });
    }

    fn bind_vertex_buffer(&mut self, buffer: &<HeadlessGpu as GfxDevice>::Buffer, view: &VertexBufferView) {
        self.record(RecordedCommand::BindVertexBuffer {
            buffer: buffer.key,
            view: *view,
        });
    }

    fn bind_index_buffer(&mut self, buffer: &<HeadlessGpu as GfxDevice>::Buffer, view: &IndexBufferView) {
        self.record(RecordedCommand::BindIndexBuffer {
            buffer: buffer.key,
            view: *view,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) {
        if !self.in_render_pass {
            self.fail("draw outside a render pass");
        }
        self.record(RecordedCommand::DrawIndexed {
            index_count,
            first_index,
            vertex_offset,
        });
    }

    fn begin_label(&mut self, label: &str) {
        self.label_depth += 1;
        self.record(RecordedCommand::BeginLabel(label.to_string()));
    }

    fn end_label(&mut self) {
        if self.label_depth == 0 {
            self.fail("end_label without begin_label");
        } else {
            self.label_depth -= 1;
        }
        self.record(RecordedCommand::EndLabel);
    }
}
