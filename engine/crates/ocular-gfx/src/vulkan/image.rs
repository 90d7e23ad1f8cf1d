use ash::vk;
use vk_mem::Alloc;

use crate::rhi::{
    GfxResult,
    types::{Extent2D, ImageDesc, ImageUsage},
};
use crate::vulkan::{
    convert::{color_format, depth_format, vk_error},
    debug_messenger::DebugType,
    device::VulkanDevice,
};

pub struct VulkanImage {
    pub(crate) handle: vk::Image,
    pub(crate) allocation: vk_mem::Allocation,
    pub(crate) extent: Extent2D,
    pub(crate) format: vk::Format,
    pub(crate) aspect: vk::ImageAspectFlags,
}

// 创建与销毁
impl VulkanImage {
    pub(crate) fn new(device: &VulkanDevice, allocator: &vk_mem::Allocator, desc: &ImageDesc) -> GfxResult<Self> {
        let (format, usage, aspect) = match desc.usage {
            // 合成器需要采样 eye texture
            ImageUsage::ColorTarget(format) => (
                color_format(format),
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_SRC,
                vk::ImageAspectFlags::COLOR,
            ),
            ImageUsage::Depth(format) => (
                depth_format(format),
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                vk::ImageAspectFlags::DEPTH,
            ),
        };

        let image_ci = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };

        let (handle, allocation) =
            unsafe { allocator.create_image(&image_ci, &alloc_ci).map_err(vk_error("vmaCreateImage"))? };

        let image = Self {
            handle,
            allocation,
            extent: desc.extent,
            format,
            aspect,
        };
        device.set_debug_name(&image, &desc.name);
        Ok(image)
    }

    pub(crate) fn destroy(mut self, allocator: &vk_mem::Allocator) {
        unsafe { allocator.destroy_image(self.handle, &mut self.allocation) };
    }

    pub(crate) fn create_view(&self, device: &VulkanDevice, name: &str) -> GfxResult<vk::ImageView> {
        let view_ci = vk::ImageViewCreateInfo::default()
            .image(self.handle)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.format)
            .subresource_range(self.subresource_range());
        let view = unsafe { device.create_image_view(&view_ci, None).map_err(vk_error("vkCreateImageView"))? };
        device.set_debug_name(&ImageViewName(view), name);
        Ok(view)
    }
}

// getters
impl VulkanImage {
    #[inline]
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    #[inline]
    pub(crate) fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }
}

impl DebugType for VulkanImage {
    fn debug_type_name() -> &'static str {
        "VulkanImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

struct ImageViewName(vk::ImageView);
impl DebugType for ImageViewName {
    fn debug_type_name() -> &'static str {
        "VulkanImageView"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VulkanRenderTargetView {
    pub(crate) view: vk::ImageView,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VulkanDepthStencilView {
    pub(crate) view: vk::ImageView,
}
