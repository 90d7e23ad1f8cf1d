//! 静态几何体的上传
//!
//! 所有 blob 连续地放在一个 Default heap 的 buffer 中，通过 upload heap 中转：
//! 写入 upload buffer → copy → barrier → flush → 销毁 upload heap

use itertools::Itertools;
use ocular_gfx::rhi::{
    GfxCommandList, GfxDevice,
    types::{HeapDesc, HeapKind, IndexBufferView, IndexFormat, ResourceState, VertexBufferView},
};

use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult, StepContext};

/// 多个 blob 在 heap 中的布局
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPlan {
    /// 每个 blob 的字节偏移，按照上传顺序
    pub offsets: Vec<u64>,
    pub total_size: u64,
    /// total_size 向上取整到 granularity，再额外加一个 granularity
    pub heap_size: u64,
}
impl UploadPlan {
    pub fn new(sizes: &[u64], granularity: u64) -> Self {
        let mut offset = 0;
        let offsets = sizes
            .iter()
            .map(|size| {
                let current = offset;
                offset += size;
                current
            })
            .collect_vec();
        let total_size = offset;
        let heap_size = total_size.div_ceil(granularity) * granularity + granularity;

        Self {
            offsets,
            total_size,
            heap_size,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobKind {
    Vertex { stride: u32 },
    Index(IndexFormat),
}

/// 一段需要上传的几何数据
pub struct GeometryBlob<'a> {
    pub name: &'a str,
    pub bytes: &'a [u8],
    pub kind: BlobKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferView {
    Vertex(VertexBufferView),
    Index(IndexBufferView),
}
impl BufferView {
    pub fn as_vertex(&self) -> Option<&VertexBufferView> {
        match self {
            BufferView::Vertex(view) => Some(view),
            BufferView::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<&IndexBufferView> {
        match self {
            BufferView::Index(view) => Some(view),
            BufferView::Vertex(_) => None,
        }
    }
}

/// 上传完成之后常驻的几何数据，处于 `VertexAndIndex` 状态
pub struct StaticGeometry<G: GfxDevice> {
    heap: G::Heap,
    buffer: G::Buffer,
    /// 与输入的 blob 一一对应
    pub views: Vec<BufferView>,
}
impl<G: GfxDevice> StaticGeometry<G> {
    #[inline]
    pub fn buffer(&self) -> &G::Buffer {
        &self.buffer
    }

    pub fn destroy(self, gfx: &G) -> RenderResult<()> {
        gfx.destroy_buffer(self.buffer);
        gfx.destroy_heap(self.heap).step("Failed to destroy model heap!")
    }
}

/// 把 blobs 按顺序上传到一个常驻的 GPU buffer 中，阻塞直到上传完成
///
/// 使用专门的 streaming allocator / list，只在 bootstrap 时调用一次
pub fn upload_static_geometry<G: GfxDevice>(
    ctx: &mut RenderContext<G>,
    allocator: &mut G::CommandAllocator,
    list: &mut G::CommandList,
    blobs: &[GeometryBlob],
) -> RenderResult<StaticGeometry<G>> {
    let _span = ocular_crate_tools::profile_span!("upload_static_geometry");

    let sizes = blobs.iter().map(|blob| blob.bytes.len() as u64).collect_vec();
    let plan = UploadPlan::new(&sizes, ctx.gfx.placement_granularity());
    if plan.total_size == 0 {
        return Err(RenderError::EmptyUpload);
    }
    log::info!(
        "upload {} blobs: {} bytes, heap size {} bytes",
        blobs.len(),
        plan.total_size,
        plan.heap_size
    );

    let heap = ctx
        .gfx
        .create_heap(&HeapDesc {
            kind: HeapKind::Default,
            size: plan.heap_size,
            name: "model-default-heap".to_string(),
        })
        .step("Failed to create model heap!")?;
    let buffer = match ctx
        .gfx
        .create_placed_buffer(&heap, 0, plan.total_size, ResourceState::CopyDest, "model-geometry")
        .step("Failed to create model buffer!")
    {
        Ok(buffer) => buffer,
        Err(err) => {
            destroy_heap_logged(&ctx.gfx, heap);
            return Err(err);
        }
    };

    if let Err(err) = stage_and_copy(ctx, allocator, list, blobs, &plan, &buffer) {
        // GPU 可能还在访问 default buffer
        if let Err(idle_err) = ctx.gfx.wait_idle() {
            log::error!("wait idle while abandoning upload: {idle_err}");
        }
        ctx.gfx.destroy_buffer(buffer);
        destroy_heap_logged(&ctx.gfx, heap);
        return Err(err);
    }

    let base_address = ctx.gfx.buffer_gpu_address(&buffer);
    let views = blobs
        .iter()
        .zip(plan.offsets.iter())
        .map(|(blob, &offset)| {
            let size = blob.bytes.len() as u64;
            let gpu_address = base_address + offset;
            match blob.kind {
                BlobKind::Vertex { stride } => BufferView::Vertex(VertexBufferView {
                    offset,
                    gpu_address,
                    size,
                    stride,
                }),
                BlobKind::Index(format) => BufferView::Index(IndexBufferView {
                    offset,
                    gpu_address,
                    size,
                    format,
                }),
            }
        })
        .collect_vec();
    for (blob, view) in blobs.iter().zip(views.iter()) {
        log::debug!("{}: {:?}", blob.name, view);
    }

    Ok(StaticGeometry { heap, buffer, views })
}

/// 通过 upload heap 把数据复制到 dst，flush 之后销毁 upload heap
fn stage_and_copy<G: GfxDevice>(
    ctx: &mut RenderContext<G>,
    allocator: &mut G::CommandAllocator,
    list: &mut G::CommandList,
    blobs: &[GeometryBlob],
    plan: &UploadPlan,
    dst: &G::Buffer,
) -> RenderResult<()> {
    let upload_heap = ctx
        .gfx
        .create_heap(&HeapDesc {
            kind: HeapKind::Upload,
            size: plan.heap_size,
            name: "model-upload-heap".to_string(),
        })
        .step("Failed to create model upload heap!")?;
    let upload_buffer = match ctx
        .gfx
        .create_placed_buffer(&upload_heap, 0, plan.total_size, ResourceState::GenericRead, "model-upload")
        .step("Failed to create model upload buffer!")
    {
        Ok(buffer) => buffer,
        Err(err) => {
            destroy_heap_logged(&ctx.gfx, upload_heap);
            return Err(err);
        }
    };

    let result = record_and_flush(ctx, allocator, list, blobs, dst, &upload_buffer);
    if result.is_err() {
        if let Err(idle_err) = ctx.gfx.wait_idle() {
            log::error!("wait idle while abandoning upload: {idle_err}");
        }
    }

    // 只有在 flush 之后（或者 queue 空闲之后）才能释放 upload heap
    ctx.gfx.destroy_buffer(upload_buffer);
    let destroyed = ctx.gfx.destroy_heap(upload_heap).step("Failed to destroy model upload heap!");
    result.and(destroyed)
}

fn record_and_flush<G: GfxDevice>(
    ctx: &mut RenderContext<G>,
    allocator: &mut G::CommandAllocator,
    list: &mut G::CommandList,
    blobs: &[GeometryBlob],
    dst: &G::Buffer,
    upload_buffer: &G::Buffer,
) -> RenderResult<()> {
    let gfx = &ctx.gfx;

    let contents = blobs.iter().flat_map(|blob| blob.bytes.iter().copied()).collect_vec();
    gfx.write_buffer(upload_buffer, 0, &contents)
        .step("Failed to map model upload buffer!")?;

    gfx.reset_command_allocator(allocator)
        .step("Failed to reset streaming command allocator!")?;
    list.reset(allocator).step("Failed to reset streaming command list!")?;
    list.begin_label("upload static geometry");
    list.copy_buffer(dst, upload_buffer);
    list.buffer_barrier(dst, ResourceState::CopyDest, ResourceState::VertexAndIndex);
    list.end_label();
    list.close().step("Failed to close streaming command list!")?;
    gfx.submit(list).step("Failed to submit streaming command list!")?;

    let value = ctx.fence.flush(gfx).step("Failed to flush upload queue!")?;
    log::info!("static geometry uploaded (fence value {value})");
    Ok(())
}

fn destroy_heap_logged<G: GfxDevice>(gfx: &G, heap: G::Heap) {
    if let Err(err) = gfx.destroy_heap(heap) {
        log::error!("destroy heap: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::FenceCounter;
    use ocular_gfx::headless::{FaultPoint, HeadlessGpu, HeadlessOptions, QueueEvent, RecordedCommand};
    use ocular_gfx::rhi::{GfxBackend, types::AdapterRequest};

    #[test]
    fn test_plan_offsets_and_heap_size() {
        let plan = UploadPlan::new(&[320, 48, 1440, 144], 65536);
        assert_eq!(plan.offsets, vec![0, 320, 368, 1808]);
        assert_eq!(plan.total_size, 1952);
        assert_eq!(plan.heap_size, 2 * 65536);
    }

    #[test]
    fn test_plan_exact_multiple_still_gets_extra_granule() {
        let plan = UploadPlan::new(&[64, 64], 128);
        assert_eq!(plan.heap_size, 256);

        let plan = UploadPlan::new(&[129], 128);
        assert_eq!(plan.heap_size, 384);
    }

    fn context() -> RenderContext<HeadlessGpu> {
        let gpu = HeadlessGpu::open(&AdapterRequest::default(), HeadlessOptions::default()).unwrap();
        let fence = FenceCounter::new(&gpu, "frame-fence").unwrap();
        RenderContext::new(gpu, fence)
    }

    fn blobs<'a>(vertices: &'a [u8], indices: &'a [u8]) -> [GeometryBlob<'a>; 2] {
        [
            GeometryBlob {
                name: "vb",
                bytes: vertices,
                kind: BlobKind::Vertex { stride: 4 },
            },
            GeometryBlob {
                name: "ib",
                bytes: indices,
                kind: BlobKind::Index(IndexFormat::U32),
            },
        ]
    }

    #[test]
    fn test_upload_contents_and_release() {
        let mut ctx = context();
        let mut allocator = ctx.gfx.create_command_allocator("streaming").unwrap();
        let mut list = ctx.gfx.create_command_list(&allocator, "streaming").unwrap();

        let vertices: Vec<u8> = (0..40).collect();
        let indices: Vec<u8> = (100..112).collect();
        let geometry = upload_static_geometry(&mut ctx, &mut allocator, &mut list, &blobs(&vertices, &indices)).unwrap();

        // 内容为两个 blob 的拼接，upload heap 已经销毁
        let expected = [vertices.as_slice(), indices.as_slice()].concat();
        assert_eq!(ctx.gfx.read_buffer(geometry.buffer()).unwrap(), expected);
        assert_eq!(ctx.gfx.live_heap_count_of(HeapKind::Upload), 0);
        assert_eq!(ctx.gfx.live_heap_count_of(HeapKind::Default), 1);
        assert_eq!(ctx.gfx.buffer_state(geometry.buffer()), Some(ResourceState::VertexAndIndex));

        let base = ctx.gfx.buffer_gpu_address(geometry.buffer());
        let ib = geometry.views[1].as_index().unwrap();
        assert_eq!((ib.offset, ib.gpu_address, ib.size), (40, base + 40, 12));
        assert_eq!(geometry.views[0].as_vertex().unwrap().stride, 4);

        // copy → barrier，然后唯一的一次 signal
        let events = ctx.gfx.events();
        assert_eq!(events.len(), 2);
        let QueueEvent::Submit(submission) = &events[0] else { panic!("expected submit") };
        let commands = submission
            .commands
            .iter()
            .filter(|c| !matches!(c, RecordedCommand::BeginLabel(_) | RecordedCommand::EndLabel))
            .collect_vec();
        assert!(matches!(commands[0], RecordedCommand::CopyBuffer { .. }));
        assert!(matches!(
            commands[1],
            RecordedCommand::BufferBarrier {
                before: ResourceState::CopyDest,
                after: ResourceState::VertexAndIndex,
                ..
            }
        ));
        assert!(matches!(events[1], QueueEvent::Signal { value: 1, .. }));

        geometry.destroy(&ctx.gfx).unwrap();
        ctx.gfx.destroy_command_list(list);
        ctx.gfx.destroy_command_allocator(allocator);
        assert_eq!(ctx.gfx.live_heap_count(), 0);
        ctx.into_gfx().destroy();
    }

    #[test]
    fn test_empty_upload_is_rejected() {
        let mut ctx = context();
        let mut allocator = ctx.gfx.create_command_allocator("streaming").unwrap();
        let mut list = ctx.gfx.create_command_list(&allocator, "streaming").unwrap();

        let result = upload_static_geometry(&mut ctx, &mut allocator, &mut list, &blobs(&[], &[]));
        assert!(matches!(result, Err(RenderError::EmptyUpload)));
        assert_eq!(ctx.gfx.stats().heaps_created, 0);
    }

    #[test]
    fn test_failure_releases_partial_heaps() {
        let mut ctx = context();
        let mut allocator = ctx.gfx.create_command_allocator("streaming").unwrap();
        let mut list = ctx.gfx.create_command_list(&allocator, "streaming").unwrap();
        ctx.gfx.inject_fault(FaultPoint::Submit);

        let data = [1u8; 16];
        let result = upload_static_geometry(&mut ctx, &mut allocator, &mut list, &blobs(&data, &data));
        match result {
            Err(RenderError::Gfx { step, .. }) => assert_eq!(step, "Failed to submit streaming command list!"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(ctx.gfx.live_heap_count(), 0);
        assert_eq!(ctx.gfx.stats().heaps_created, 2);
    }
}
