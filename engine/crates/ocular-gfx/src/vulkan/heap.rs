use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::rhi::{
    GfxError, GfxResult,
    types::{HeapDesc, HeapKind},
};
use crate::vulkan::{convert::vk_error, debug_messenger::DebugType, device::VulkanDevice};

/// placed buffer 会用到的所有 usage
pub(crate) fn placed_buffer_usage() -> vk::BufferUsageFlags {
    vk::BufferUsageFlags::TRANSFER_SRC
        | vk::BufferUsageFlags::TRANSFER_DST
        | vk::BufferUsageFlags::VERTEX_BUFFER
        | vk::BufferUsageFlags::INDEX_BUFFER
        | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
}

/// 一整块 vk-mem 分配的内存，buffer 被绑定到其中的固定偏移处
///
/// Upload heap 在创建时就 map，销毁时 unmap
pub struct VulkanHeap {
    pub(crate) allocation: RefCell<vk_mem::Allocation>,
    pub(crate) kind: HeapKind,
    pub(crate) size: u64,
    pub(crate) mapped: Option<*mut u8>,
    /// 放置在其中的 buffer 数量，和 buffer 共享
    pub(crate) placed_buffers: Rc<Cell<usize>>,
    pub(crate) name: String,
}

// 创建与销毁
impl VulkanHeap {
    pub(crate) fn new(device: &VulkanDevice, allocator: &vk_mem::Allocator, desc: &HeapDesc) -> GfxResult<Self> {
        // 用一个临时 buffer 得到 memory type 的要求
        let reqs_ci = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(placed_buffer_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let reqs_buffer = unsafe { device.create_buffer(&reqs_ci, None).map_err(vk_error("vkCreateBuffer"))? };
        let mut mem_reqs = unsafe { device.get_buffer_memory_requirements(reqs_buffer) };
        unsafe { device.destroy_buffer(reqs_buffer, None) };
        mem_reqs.size = mem_reqs.size.max(desc.size);

        let required_flags = match desc.kind {
            HeapKind::Default => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            HeapKind::Upload => vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        };
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Unknown,
            required_flags,
            ..Default::default()
        };
        let mut allocation =
            unsafe { allocator.allocate_memory(&mem_reqs, &alloc_ci).map_err(vk_error("vmaAllocateMemory"))? };

        let mapped = match desc.kind {
            HeapKind::Default => None,
            HeapKind::Upload => match unsafe { allocator.map_memory(&mut allocation) } {
                Ok(ptr) => Some(ptr),
                Err(e) => {
                    unsafe { allocator.free_memory(&mut allocation) };
                    return Err(GfxError::backend("vmaMapMemory", e));
                }
            },
        };

        log::debug!("create heap '{}' ({:?}, {} bytes)", desc.name, desc.kind, desc.size);
        Ok(Self {
            allocation: RefCell::new(allocation),
            kind: desc.kind,
            size: desc.size,
            mapped,
            placed_buffers: Rc::new(Cell::new(0)),
            name: desc.name.clone(),
        })
    }

    pub(crate) fn destroy(self, allocator: &vk_mem::Allocator) -> GfxResult<()> {
        if self.placed_buffers.get() != 0 {
            return Err(GfxError::invalid_state(
                &self.name,
                format!("{} buffers are still placed in the heap", self.placed_buffers.get()),
            ));
        }
        let mut allocation = self.allocation.into_inner();
        unsafe {
            if self.mapped.is_some() {
                allocator.unmap_memory(&mut allocation);
            }
            allocator.free_memory(&mut allocation);
        }
        Ok(())
    }
}

/// [offset, offset + size) 必须完整地落在 heap 中
fn check_placement(heap: &str, heap_size: u64, offset: u64, size: u64) -> GfxResult<()> {
    if offset.checked_add(size).is_none_or(|end| end > heap_size) {
        return Err(GfxError::OutOfHeapRange {
            heap: heap.to_string(),
            offset,
            size,
            heap_size,
        });
    }
    Ok(())
}

/// 放置在 heap 中的 buffer
pub struct VulkanBuffer {
    pub(crate) handle: vk::Buffer,
    pub(crate) size: u64,
    pub(crate) gpu_address: u64,
    /// Upload heap 中的 buffer 的 CPU 地址
    pub(crate) mapped: Option<*mut u8>,
    pub(crate) heap_placed_buffers: Rc<Cell<usize>>,
}

// 创建与销毁
impl VulkanBuffer {
    pub(crate) fn new_placed(
        device: &VulkanDevice,
        allocator: &vk_mem::Allocator,
        heap: &VulkanHeap,
        offset: u64,
        size: u64,
        name: &str,
    ) -> GfxResult<Self> {
        check_placement(&heap.name, heap.size, offset, size)?;

        let buffer_ci = vk::BufferCreateInfo::default()
            .size(size)
            .usage(placed_buffer_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let handle = unsafe { device.create_buffer(&buffer_ci, None).map_err(vk_error("vkCreateBuffer"))? };

        let bind_result = unsafe {
            allocator.bind_buffer_memory2(&heap.allocation.borrow(), offset, handle, std::ptr::null())
        };
        if let Err(e) = bind_result {
            unsafe { device.destroy_buffer(handle, None) };
            return Err(GfxError::backend("vmaBindBufferMemory2", e));
        }

        let gpu_address =
            unsafe { device.get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(handle)) };
        heap.placed_buffers.set(heap.placed_buffers.get() + 1);

        let buffer = Self {
            handle,
            size,
            gpu_address,
            mapped: heap.mapped.map(|ptr| unsafe { ptr.add(offset as usize) }),
            heap_placed_buffers: heap.placed_buffers.clone(),
        };
        device.set_debug_name(&buffer, name);
        Ok(buffer)
    }

    pub(crate) fn destroy(self, device: &VulkanDevice) {
        unsafe { device.destroy_buffer(self.handle, None) };
        self.heap_placed_buffers.set(self.heap_placed_buffers.get().saturating_sub(1));
    }
}

// tools
impl VulkanBuffer {
    pub(crate) fn write(&self, offset: u64, data: &[u8]) -> GfxResult<()> {
        let Some(mapped) = self.mapped else {
            return Err(GfxError::NotMappable {
                object: format!("{:?}", self.handle),
            });
        };
        if offset + data.len() as u64 > self.size {
            return Err(GfxError::invalid_state(
                format!("{:?}", self.handle),
                format!("write of {} bytes at {} exceeds buffer size {}", data.len(), offset, self.size),
            ));
        }
        // upload heap 是 HOST_COHERENT 的，不需要 flush
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.add(offset as usize), data.len());
        }
        Ok(())
    }
}

impl DebugType for VulkanBuffer {
    fn debug_type_name() -> &'static str {
        "VulkanBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placed_buffer_usage_covers_upload_and_draw() {
        let usage = placed_buffer_usage();
        assert!(usage.contains(vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST));
        assert!(usage.contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::INDEX_BUFFER));
        assert!(usage.contains(vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS));
    }

    #[test]
    fn test_check_placement() {
        assert!(check_placement("model", 65536, 0, 65536).is_ok());
        assert!(check_placement("model", 65536, 320, 1440).is_ok());
        assert!(matches!(
            check_placement("model", 65536, 65536, 1),
            Err(GfxError::OutOfHeapRange { offset: 65536, size: 1, heap_size: 65536, .. })
        ));
        assert!(check_placement("model", 65536, u64::MAX, 2).is_err());
    }

    /// heap 的创建依赖 `vk_mem::Alloc` 提供的 allocate_memory
    #[test]
    fn test_allocator_exposes_allocate_memory() {
        fn assert_alloc<A: Alloc>() {}
        assert_alloc::<vk_mem::Allocator>();
    }
}
