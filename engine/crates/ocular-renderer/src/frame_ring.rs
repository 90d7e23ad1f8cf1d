use itertools::Itertools;
use ocular_gfx::rhi::{GfxCommandList, GfxDevice, GfxResult};
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult, StepContext};
use crate::sync::FenceCounter;

/// 什么时候可以复用 (eye, slot) 的 command allocator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotReusePolicy {
    /// 每只眼睛提交之后 signal 一次 fence，复用 allocator 之前等待这个值
    #[default]
    FenceTracked,
    /// 认为合成器交还 slot 时 GPU 已经执行完，不做任何等待
    TrustCompositor,
}

/// 每个 (eye, slot) 一个 command allocator，每只眼睛一个 command list，
/// 另外还有一对 allocator / list 用于 streaming
///
/// render target view 在创建时就已经按 (eye, slot) 排好，帧内不会创建任何 descriptor
pub struct FrameRing<G: GfxDevice> {
    eye_count: usize,
    slot_count: usize,
    policy: SlotReusePolicy,

    /// eye_count * slot_count 个，最后一个为 streaming 使用
    allocators: Vec<G::CommandAllocator>,
    /// eye_count 个，最后一个为 streaming 使用
    lists: Vec<G::CommandList>,
    /// eye_count * slot_count 个
    rtvs: Vec<G::RenderTargetView>,
    /// 每个 (eye, slot) 最后一次提交之后 signal 的值
    slot_fences: Vec<u64>,
}

// 创建与销毁
impl<G: GfxDevice> FrameRing<G> {
    /// rtvs 按照 `eye * slot_count + slot` 排列，所有权转移给 ring
    pub fn new(
        gfx: &G,
        eye_count: usize,
        slot_count: usize,
        policy: SlotReusePolicy,
        rtvs: Vec<G::RenderTargetView>,
    ) -> RenderResult<Self> {
        let _span = ocular_crate_tools::profile_span!("FrameRing::new");
        debug_assert_eq!(rtvs.len(), eye_count * slot_count);

        let mut ring = Self {
            eye_count,
            slot_count,
            policy,
            allocators: Vec::with_capacity(eye_count * slot_count + 1),
            lists: Vec::with_capacity(eye_count + 1),
            rtvs,
            slot_fences: vec![0; eye_count * slot_count],
        };
        if let Err(err) = ring.create_commands(gfx) {
            ring.destroy(gfx);
            return Err(err);
        }

        log::info!(
            "frame ring: {} eyes x {} slots, {} allocators, {} lists, {:?}",
            eye_count,
            slot_count,
            ring.allocators.len(),
            ring.lists.len(),
            policy
        );
        Ok(ring)
    }

    fn create_commands(&mut self, gfx: &G) -> RenderResult<()> {
        for (eye, slot) in (0..self.eye_count).cartesian_product(0..self.slot_count) {
            let allocator = gfx
                .create_command_allocator(&format!("eye{eye}-slot{slot}"))
                .step("Failed to create command allocator!")?;
            self.allocators.push(allocator);
        }
        let streaming = gfx
            .create_command_allocator("streaming")
            .step("Failed to create command allocator!")?;
        self.allocators.push(streaming);

        for eye in 0..self.eye_count {
            // 创建 list 时只是借用一下 allocator，每帧会重新绑定
            let list = gfx
                .create_command_list(&self.allocators[eye * self.slot_count], &format!("eye{eye}"))
                .step("Failed to create command list!")?;
            self.lists.push(list);
        }
        let streaming = gfx
            .create_command_list(&self.allocators[self.eye_count * self.slot_count], "streaming")
            .step("Failed to create command list!")?;
        self.lists.push(streaming);

        Ok(())
    }

    /// 调用方需要保证 GPU 已经空闲
    pub fn destroy(self, gfx: &G) {
        for list in self.lists {
            gfx.destroy_command_list(list);
        }
        for allocator in self.allocators {
            gfx.destroy_command_allocator(allocator);
        }
        for rtv in self.rtvs {
            gfx.destroy_render_target_view(rtv);
        }
    }
}

// getters
impl<G: GfxDevice> FrameRing<G> {
    #[inline]
    pub fn eye_count(&self) -> usize {
        self.eye_count
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    #[inline]
    pub fn policy(&self) -> SlotReusePolicy {
        self.policy
    }

    #[inline]
    pub fn allocator_count(&self) -> usize {
        self.allocators.len()
    }

    #[inline]
    pub fn list_count(&self) -> usize {
        self.lists.len()
    }

    /// `eye * slot_count + slot`
    pub fn allocator_index(&self, eye: usize, slot: usize) -> RenderResult<usize> {
        if eye >= self.eye_count || slot >= self.slot_count {
            return Err(RenderError::SlotOutOfRange {
                eye,
                slot,
                eye_count: self.eye_count,
                slot_count: self.slot_count,
            });
        }
        Ok(eye * self.slot_count + slot)
    }

    pub fn rtv(&self, eye: usize, slot: usize) -> RenderResult<&G::RenderTargetView> {
        let index = self.allocator_index(eye, slot)?;
        Ok(&self.rtvs[index])
    }

    #[inline]
    pub fn slot_fence(&self, eye: usize, slot: usize) -> RenderResult<u64> {
        let index = self.allocator_index(eye, slot)?;
        Ok(self.slot_fences[index])
    }

    /// streaming 专用的 allocator 和 list
    pub fn streaming(&mut self) -> (&mut G::CommandAllocator, &mut G::CommandList) {
        let allocator_index = self.eye_count * self.slot_count;
        (&mut self.allocators[allocator_index], &mut self.lists[self.eye_count])
    }
}

// 每帧
impl<G: GfxDevice> FrameRing<G> {
    /// 绑定 (eye, slot) 的 allocator，返回已经开始录制的 list
    pub fn begin_eye(
        &mut self,
        gfx: &G,
        fence: &FenceCounter<G>,
        eye: usize,
        slot: usize,
    ) -> RenderResult<&mut G::CommandList> {
        let index = self.allocator_index(eye, slot)?;

        if self.policy == SlotReusePolicy::FenceTracked {
            let value = self.slot_fences[index];
            if value != 0 {
                fence.wait(gfx, value).step("Failed to wait for slot fence!")?;
            }
        }

        gfx.reset_command_allocator(&mut self.allocators[index])
            .step("Failed to reset command allocator!")?;
        let list = &mut self.lists[eye];
        list.reset(&self.allocators[index]).step("Failed to reset command list!")?;
        Ok(list)
    }

    /// close 并提交 eye 的 list；FenceTracked 时记录这次提交的 fence 值
    pub fn finish_eye(&mut self, gfx: &G, fence: &mut FenceCounter<G>, eye: usize, slot: usize) -> RenderResult<()> {
        let index = self.allocator_index(eye, slot)?;

        let list = &mut self.lists[eye];
        list.close().step("Failed to close command list!")?;
        gfx.submit(list).step("Failed to submit command list!")?;

        if self.policy == SlotReusePolicy::FenceTracked {
            self.slot_fences[index] = fence.signal(gfx).step("Failed to signal frame fence!")?;
        }
        Ok(())
    }
}

/// 按照 `eye * slot_count + slot` 的顺序创建 render target view；失败时销毁已经创建的
pub fn create_rtv_table<G: GfxDevice>(
    gfx: &G,
    images: &[Vec<&G::Image>],
) -> GfxResult<Vec<G::RenderTargetView>> {
    let mut rtvs = Vec::with_capacity(images.iter().map(Vec::len).sum());
    for (eye, chain) in images.iter().enumerate() {
        for (slot, image) in chain.iter().enumerate() {
            match gfx.create_render_target_view(image, &format!("eye{eye}-slot{slot}-rtv")) {
                Ok(rtv) => rtvs.push(rtv),
                Err(err) => {
                    for rtv in rtvs {
                        gfx.destroy_render_target_view(rtv);
                    }
                    return Err(err);
                }
            }
        }
    }
    Ok(rtvs)
}
