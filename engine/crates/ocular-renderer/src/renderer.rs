use itertools::Itertools;
use ocular_gfx::rhi::{
    GfxDevice, GfxError,
    types::{
        ColorFormat, CompareOp, CullMode, DepthFormat, Extent2D, ImageDesc, ImageUsage, IndexFormat, PipelineDesc,
        ResourceState, ScissorRect, Viewport,
    },
};
use ocular_xr::{
    Compositor,
    types::{FovPort, Recti, SwapChainDesc, SwapChainHandle},
};
use serde::{Deserialize, Serialize};

use crate::constants::{self, PUSH_CONSTANTS_SIZE, PixelConstants};
use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult, StepContext};
use crate::frame_ring::{self, FrameRing, SlotReusePolicy};
use crate::scene::{self, Drawable, Scene, SpinningCube, Vertex};
use crate::sync::FenceCounter;
use crate::upload::{self, BlobKind, GeometryBlob, StaticGeometry};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub near: f32,
    pub far: f32,
    /// 每个显示像素对应的渲染像素
    pub pixel_density: f32,
    pub slot_reuse_policy: SlotReusePolicy,
    /// 检查各只眼睛的 swap chain 长度和当前序号是否一致
    pub validate_slot_parity: bool,
}
impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            near: 0.2,
            far: 100.0,
            pixel_density: 1.0,
            slot_reuse_policy: SlotReusePolicy::FenceTracked,
            validate_slot_parity: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// 度每秒
    pub spin_rate: f32,
    pub cube_distance: f32,
}
impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            spin_rate: 50.0,
            cube_distance: 5.0,
        }
    }
}

/// 预编译的 shader 字节流
#[derive(Clone, Debug, Default)]
pub struct ShaderBinaries {
    pub vertex: Vec<u8>,
    pub pixel: Vec<u8>,
}

/// 每只眼睛的渲染目标
pub struct EyeTarget<G: GfxDevice> {
    pub swap_chain: SwapChainHandle,
    pub extent: Extent2D,
    pub viewport: Viewport,
    pub scissor: ScissorRect,
    /// 提交给合成器的图像范围
    pub layer_viewport: Recti,
    pub fov: FovPort,
    /// depth buffer 每只眼睛只有一份：queue 是串行的，上一帧的读取一定已经完成
    depth_image: G::Image,
    pub(crate) dsv: G::DepthStencilView,
}

/// bootstrap 失败时，设备和合成器的所有权交还给调用方；renderer 创建的资源已经全部销毁
pub struct BootstrapFailure<G: GfxDevice, C: Compositor<G>> {
    pub error: RenderError,
    pub gfx: G,
    pub compositor: C,
}
impl<G: GfxDevice, C: Compositor<G>> BootstrapFailure<G, C> {
    /// 销毁设备和合成器，只保留错误
    pub fn destroy(self) -> RenderError {
        let Self { error, gfx, compositor } = self;
        compositor.destroy(&gfx);
        gfx.destroy();
        error
    }
}
impl<G: GfxDevice, C: Compositor<G>> std::fmt::Debug for BootstrapFailure<G, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapFailure").field("error", &self.error).finish_non_exhaustive()
    }
}

/// 双目渲染器：拥有设备、合成器会话以及所有 GPU 资源
pub struct StereoRenderer<G: GfxDevice, C: Compositor<G>> {
    pub(crate) ctx: RenderContext<G>,
    pub(crate) compositor: C,
    pub(crate) settings: RenderSettings,

    pub(crate) eyes: Vec<EyeTarget<G>>,
    pub(crate) ring: FrameRing<G>,
    pub(crate) geometry: StaticGeometry<G>,
    pub(crate) pipeline: G::Pipeline,

    pub(crate) scene: Scene,
    pub(crate) pixel_constants: PixelConstants,
}

impl<G: GfxDevice, C: Compositor<G>> std::fmt::Debug for StereoRenderer<G, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StereoRenderer")
            .field("adapter", &self.ctx.gfx.adapter_info().name)
            .field("hmd", &self.compositor.hmd_desc().product_name)
            .field("eyes", &self.eyes.len())
            .field("slots", &self.ring.slot_count())
            .field("frame_index", &self.ctx.frame_counter.frame_index())
            .finish_non_exhaustive()
    }
}

/// bootstrap 过程中已经创建的、每只眼睛的资源
struct EyeResources<G: GfxDevice> {
    swap_chains: Vec<SwapChainHandle>,
    /// 每只眼睛的纹理大小和 FOV
    layouts: Vec<(Extent2D, FovPort)>,
    depth_targets: Vec<(G::Image, G::DepthStencilView)>,
    /// 按照 `eye * slot_count + slot` 排列
    rtvs: Vec<G::RenderTargetView>,
    slot_count: usize,
}
impl<G: GfxDevice> EyeResources<G> {
    fn abandon<C: Compositor<G>>(self, gfx: &G, compositor: &mut C) {
        for rtv in self.rtvs {
            gfx.destroy_render_target_view(rtv);
        }
        for (image, dsv) in self.depth_targets {
            gfx.destroy_depth_stencil_view(dsv);
            gfx.destroy_image(image);
        }
        for chain in self.swap_chains {
            compositor.destroy_swap_chain(gfx, chain);
        }
    }
}

// 创建与销毁
impl<G: GfxDevice, C: Compositor<G>> StereoRenderer<G, C> {
    /// 按顺序创建：fence → swap chain → render target / depth → frame ring → 静态几何体 → pipeline
    ///
    /// 任何一步失败都会销毁已经创建的资源，并交还设备和合成器
    pub fn new(
        gfx: G,
        mut compositor: C,
        settings: RenderSettings,
        scene_settings: &SceneSettings,
        shaders: &ShaderBinaries,
    ) -> Result<Self, BootstrapFailure<G, C>> {
        let _span = ocular_crate_tools::profile_span!("StereoRenderer::new");
        let info = gfx.adapter_info();
        log::info!(
            "bootstrap on '{}' ({}) for '{}'",
            info.name,
            if info.discrete { "discrete" } else { "integrated" },
            compositor.hmd_desc().product_name
        );

        if let Err(error) = check_push_constant_limit(&gfx) {
            return Err(BootstrapFailure { error, gfx, compositor });
        }
        let fence = match FenceCounter::new(&gfx, "frame-fence").step("Failed to create GPU/CPU fence!") {
            Ok(fence) => fence,
            Err(error) => return Err(BootstrapFailure { error, gfx, compositor }),
        };
        let mut ctx = RenderContext::new(gfx, fence);

        let mut eye_resources = EyeResources {
            swap_chains: Vec::new(),
            layouts: Vec::new(),
            depth_targets: Vec::new(),
            rtvs: Vec::new(),
            slot_count: 0,
        };
        if let Err(error) = Self::create_eye_resources(&ctx.gfx, &mut compositor, &settings, &mut eye_resources) {
            eye_resources.abandon(&ctx.gfx, &mut compositor);
            return Err(BootstrapFailure {
                error,
                gfx: ctx.into_gfx(),
                compositor,
            });
        }

        let eye_count = eye_resources.swap_chains.len();
        let rtvs = std::mem::take(&mut eye_resources.rtvs);
        let mut ring = match FrameRing::new(
            &ctx.gfx,
            eye_count,
            eye_resources.slot_count,
            settings.slot_reuse_policy,
            rtvs,
        ) {
            Ok(ring) => ring,
            Err(error) => {
                eye_resources.abandon(&ctx.gfx, &mut compositor);
                return Err(BootstrapFailure {
                    error,
                    gfx: ctx.into_gfx(),
                    compositor,
                });
            }
        };

        let resources = Self::check_slot_parity(&compositor, &settings, &eye_resources.swap_chains)
            .and_then(|()| Self::create_static_resources(&mut ctx, &mut ring, shaders));
        let (geometry, pipeline) = match resources {
            Ok(resources) => resources,
            Err(error) => {
                if let Err(err) = ctx.gfx.wait_idle() {
                    log::error!("wait idle while abandoning bootstrap: {err}");
                }
                ring.destroy(&ctx.gfx);
                eye_resources.abandon(&ctx.gfx, &mut compositor);
                return Err(BootstrapFailure {
                    error,
                    gfx: ctx.into_gfx(),
                    compositor,
                });
            }
        };

        let EyeResources {
            swap_chains,
            layouts,
            depth_targets,
            ..
        } = eye_resources;
        let eyes = swap_chains
            .into_iter()
            .zip(layouts)
            .zip(depth_targets)
            .map(|((swap_chain, (extent, fov)), (depth_image, dsv))| EyeTarget {
                swap_chain,
                extent,
                viewport: Viewport::full(extent),
                scissor: ScissorRect::full(extent),
                layer_viewport: Recti::from_extent(extent),
                fov,
                depth_image,
                dsv,
            })
            .collect_vec();
        let scene = build_scene(&geometry, scene_settings);

        log::info!(
            "bootstrap finished: {} eyes x {} slots, {} drawables",
            eyes.len(),
            ring.slot_count(),
            scene.drawables.len()
        );
        Ok(Self {
            ctx,
            compositor,
            settings,
            eyes,
            ring,
            geometry,
            pipeline,
            scene,
            pixel_constants: PixelConstants::default(),
        })
    }

    /// swap chain、render target view、depth buffer
    fn create_eye_resources(
        gfx: &G,
        compositor: &mut C,
        settings: &RenderSettings,
        out: &mut EyeResources<G>,
    ) -> RenderResult<()> {
        let default_fovs = compositor.hmd_desc().default_eye_fov.clone();

        for (eye, fov) in default_fovs.iter().enumerate() {
            let extent = compositor
                .fov_texture_size(eye, fov, settings.pixel_density)
                .step("Failed to query eye texture size!")?;
            let chain = compositor
                .create_swap_chain(
                    gfx,
                    &SwapChainDesc {
                        extent,
                        format: ColorFormat::Rgba8UnormSrgb,
                        name: format!("eye{eye}-swap-chain"),
                    },
                )
                .step("Failed to create eye swap chain!")?;
            out.swap_chains.push(chain);
            out.layouts.push((extent, *fov));
            log::info!("eye {eye}: {}x{}", extent.width, extent.height);
        }

        // 以第一只眼睛的 swap chain 长度作为 slot 数量
        let Some(&first) = out.swap_chains.first() else {
            return Err(RenderError::Gfx {
                step: "Failed to create eye swap chain!",
                source: GfxError::invalid_state("hmd", "the hmd reports no eyes"),
            });
        };
        let slot_count = compositor
            .swap_chain_length(first)
            .step("Failed to query swap chain length!")?;
        for (eye, &chain) in out.swap_chains.iter().enumerate().skip(1) {
            let length = compositor
                .swap_chain_length(chain)
                .step("Failed to query swap chain length!")?;
            if length != slot_count {
                if settings.validate_slot_parity {
                    return Err(RenderError::SlotParity {
                        what: "swap chain length",
                        eye,
                        expected: slot_count,
                        actual: length,
                    });
                }
                log::warn!("eye {eye} swap chain length {length} differs from {slot_count}");
            }
        }
        out.slot_count = slot_count;

        let images = out
            .swap_chains
            .iter()
            .map(|&chain| {
                (0..slot_count)
                    .map(|slot| compositor.swap_chain_image(chain, slot))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()
            .step("Failed to get swap chain image!")?;
        out.rtvs = frame_ring::create_rtv_table(gfx, &images).step("Failed to create render target view!")?;

        for (eye, (extent, _)) in out.layouts.iter().enumerate() {
            let image = gfx
                .create_image(&ImageDesc {
                    extent: *extent,
                    usage: ImageUsage::Depth(DepthFormat::D32Float),
                    initial_state: ResourceState::DepthWrite,
                    name: format!("eye{eye}-depth"),
                })
                .step("Failed to allocate depth buffer!")?;
            match gfx
                .create_depth_stencil_view(&image, &format!("eye{eye}-dsv"))
                .step("Failed to create depth stencil view!")
            {
                Ok(dsv) => out.depth_targets.push((image, dsv)),
                Err(err) => {
                    gfx.destroy_image(image);
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// 各只眼睛的 swap chain 当前序号必须一致，否则同一帧会使用不同的 slot
    fn check_slot_parity(compositor: &C, settings: &RenderSettings, chains: &[SwapChainHandle]) -> RenderResult<()> {
        if !settings.validate_slot_parity {
            return Ok(());
        }
        let indices: Vec<usize> = chains
            .iter()
            .map(|&chain| compositor.swap_chain_current_index(chain))
            .collect::<Result<_, _>>()
            .step("Failed to query swap chain index!")?;
        if let Some((eye, &actual)) = indices.iter().enumerate().find(|&(_, &index)| index != indices[0]) {
            return Err(RenderError::SlotParity {
                what: "swap chain current index",
                eye,
                expected: indices[0],
                actual,
            });
        }
        Ok(())
    }

    /// 上传静态几何体并创建 pipeline
    fn create_static_resources(
        ctx: &mut RenderContext<G>,
        ring: &mut FrameRing<G>,
        shaders: &ShaderBinaries,
    ) -> RenderResult<(StaticGeometry<G>, G::Pipeline)> {
        let plane = scene::plane_mesh();
        let cube = scene::cube_mesh();
        let blobs = [&plane, &cube]
            .into_iter()
            .flat_map(|mesh| {
                [
                    GeometryBlob {
                        name: mesh.name,
                        bytes: bytemuck::cast_slice(&mesh.vertices),
                        kind: BlobKind::Vertex { stride: Vertex::STRIDE },
                    },
                    GeometryBlob {
                        name: mesh.name,
                        bytes: bytemuck::cast_slice(&mesh.indices),
                        kind: BlobKind::Index(IndexFormat::U32),
                    },
                ]
            })
            .collect_vec();

        let (allocator, list) = ring.streaming();
        let geometry = upload::upload_static_geometry(ctx, allocator, list, &blobs)?;

        let attributes = Vertex::attributes();
        let push_constants = constants::push_constant_ranges();
        let pipeline = ctx
            .gfx
            .create_pipeline(&PipelineDesc {
                name: "scene",
                vertex_shader: &shaders.vertex,
                pixel_shader: &shaders.pixel,
                vertex_stride: Vertex::STRIDE,
                vertex_attributes: &attributes,
                push_constants: &push_constants,
                color_format: ColorFormat::Rgba8UnormSrgb,
                depth_format: DepthFormat::D32Float,
                cull_mode: CullMode::Back,
                front_counter_clockwise: false,
                depth_compare: CompareOp::Less,
                depth_write: true,
            })
            .step("Failed to create pipeline state object!");
        match pipeline {
            Ok(pipeline) => Ok((geometry, pipeline)),
            Err(err) => {
                if let Err(destroy_err) = geometry.destroy(&ctx.gfx) {
                    log::error!("{destroy_err}");
                }
                Err(err)
            }
        }
    }

    /// 等待 GPU 空闲，销毁 renderer 创建的所有资源（包括 swap chain），交还设备和合成器
    pub fn release(self) -> (G, C) {
        let _span = ocular_crate_tools::profile_span!("StereoRenderer::release");
        let Self {
            ctx,
            mut compositor,
            eyes,
            ring,
            geometry,
            pipeline,
            ..
        } = self;
        let gfx = &ctx.gfx;

        if let Err(err) = gfx.wait_idle() {
            log::error!("wait idle before release: {err}");
        }
        gfx.destroy_pipeline(pipeline);
        if let Err(err) = geometry.destroy(gfx) {
            log::error!("{err}");
        }
        ring.destroy(gfx);
        for eye in eyes {
            gfx.destroy_depth_stencil_view(eye.dsv);
            gfx.destroy_image(eye.depth_image);
            compositor.destroy_swap_chain(gfx, eye.swap_chain);
        }

        log::info!("renderer released after {} frames", ctx.frame_counter.frame_index());
        (ctx.into_gfx(), compositor)
    }

    /// 销毁所有资源、合成器会话以及设备
    pub fn destroy(self) {
        let (gfx, compositor) = self.release();
        compositor.destroy(&gfx);
        gfx.destroy();
    }
}

// getters
impl<G: GfxDevice, C: Compositor<G>> StereoRenderer<G, C> {
    #[inline]
    pub fn gfx(&self) -> &G {
        &self.ctx.gfx
    }

    #[inline]
    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    #[inline]
    pub fn compositor_mut(&mut self) -> &mut C {
        &mut self.compositor
    }

    #[inline]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    #[inline]
    pub fn eyes(&self) -> &[EyeTarget<G>] {
        &self.eyes
    }

    #[inline]
    pub fn ring(&self) -> &FrameRing<G> {
        &self.ring
    }

    #[inline]
    pub fn geometry(&self) -> &StaticGeometry<G> {
        &self.geometry
    }

    #[inline]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.ctx.frame_counter.frame_index()
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.ctx.pause.is_paused()
    }
}

// 暂停
impl<G: GfxDevice, C: Compositor<G>> StereoRenderer<G, C> {
    pub fn set_user_paused(&mut self, paused: bool) {
        self.ctx.pause.user_paused = paused;
    }

    /// 返回切换之后的状态
    pub fn toggle_user_pause(&mut self) -> bool {
        self.ctx.pause.user_paused = !self.ctx.pause.user_paused;
        log::info!("user pause: {}", self.ctx.pause.user_paused);
        self.ctx.pause.user_paused
    }
}

fn check_push_constant_limit<G: GfxDevice>(gfx: &G) -> RenderResult<()> {
    let supported = gfx.adapter_info().max_push_constants_size;
    if supported < PUSH_CONSTANTS_SIZE {
        let source = GfxError::UnsupportedLimit {
            limit: "maxPushConstantsSize",
            required: PUSH_CONSTANTS_SIZE as u64,
            supported: supported as u64,
        };
        log::error!("Device does not support the root constants! ({source})");
        return Err(RenderError::Gfx {
            step: "Device does not support the root constants!",
            source,
        });
    }
    Ok(())
}

/// 地面在前、立方体在后
fn build_scene<G: GfxDevice>(geometry: &StaticGeometry<G>, settings: &SceneSettings) -> Scene {
    let plane = scene::plane_mesh();
    let cube = scene::cube_mesh();
    let drawables = [(&plane, 0), (&cube, 2)]
        .into_iter()
        .filter_map(|(mesh, first_view)| {
            let vertex_view = *geometry.views.get(first_view)?.as_vertex()?;
            let index_view = *geometry.views.get(first_view + 1)?.as_index()?;
            Some(Drawable {
                name: mesh.name.to_string(),
                vertex_view,
                index_view,
                index_count: mesh.index_count(),
                model: glam::Mat4::IDENTITY,
            })
        })
        .collect_vec();
    let spinner_target = drawables.iter().position(|d| d.name == "cube");
    Scene::new(
        drawables,
        SpinningCube::new(settings.spin_rate, settings.cube_distance),
        spinner_target,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, SkewedCompositor};
    use ocular_gfx::headless::{FaultPoint, HeadlessOptions};
    use ocular_gfx::rhi::types::{AdapterLuid, AdapterRequest, HeapKind};
    use ocular_xr::simulated::{SimulatedCompositor, SimulatedHmdConfig};

    #[test]
    fn test_bootstrap_creates_frame_resources() {
        let renderer = test_utils::renderer();

        assert_eq!(renderer.eyes().len(), 2);
        assert_eq!(renderer.ring().slot_count(), 3);
        assert_eq!(renderer.ring().allocator_count(), 3 * 2 + 1);
        assert_eq!(renderer.ring().list_count(), 2 + 1);
        // 默认 FOV、像素密度 1.0
        assert_eq!(renderer.eyes()[0].extent, Extent2D::new(1345, 1601));
        assert_eq!(renderer.eyes()[1].fov, renderer.eyes()[0].fov.mirrored());

        let offsets = renderer
            .geometry()
            .views
            .iter()
            .map(|view| match view {
                upload::BufferView::Vertex(v) => v.offset,
                upload::BufferView::Index(i) => i.offset,
            })
            .collect_vec();
        assert_eq!(offsets, vec![0, 320, 368, 1808]);

        let gfx = renderer.gfx();
        assert_eq!(gfx.live_heap_count_of(HeapKind::Upload), 0);
        assert_eq!(gfx.live_heap_count_of(HeapKind::Default), 1);
        assert_eq!(renderer.compositor().live_swap_chain_count(), 2);

        let names = renderer.scene().drawables.iter().map(|d| d.name.as_str()).collect_vec();
        assert_eq!(names, vec!["plane", "cube"]);
        assert_eq!(renderer.scene().drawables[1].index_count, 36);

        renderer.destroy();
    }

    #[test]
    fn test_release_destroys_everything() {
        let mut renderer = test_utils::renderer();
        renderer.tick(0.011).unwrap();
        renderer.tick(0.011).unwrap();

        let (gfx, compositor) = renderer.release();
        assert_eq!(gfx.live_object_count(), 0);
        assert_eq!(gfx.live_heap_count(), 0);
        assert_eq!(compositor.live_swap_chain_count(), 0);
        assert!(gfx.stats().wait_idles >= 1);
        compositor.destroy(&gfx);
        gfx.destroy();
    }

    #[test]
    fn test_push_constant_limit_is_checked() {
        // 集成显卡只支持 128 字节
        let request = AdapterRequest {
            luid: Some(AdapterLuid([1, 0, 0, 0, 0, 0, 0, 0])),
            ..Default::default()
        };
        let gpu = test_utils::open_gpu(&request, HeadlessOptions::default());
        let compositor = SimulatedCompositor::new(SimulatedHmdConfig::default());

        let failure = test_utils::try_renderer(gpu, compositor, RenderSettings::default()).unwrap_err();
        assert!(matches!(
            failure.error,
            RenderError::Gfx {
                step: "Device does not support the root constants!",
                source: GfxError::UnsupportedLimit { required: 140, supported: 128, .. },
            }
        ));
        assert_eq!(failure.gfx.live_object_count(), 0);
        assert_eq!(failure.compositor.live_swap_chain_count(), 0);
        failure.destroy();
    }

    #[test]
    fn test_fence_failure_is_fatal() {
        let options = HeadlessOptions {
            faults: vec![FaultPoint::CreateFence],
            ..Default::default()
        };
        let gpu = test_utils::open_gpu(&AdapterRequest::default(), options);
        let compositor = SimulatedCompositor::new(SimulatedHmdConfig::default());

        let failure = test_utils::try_renderer(gpu, compositor, RenderSettings::default()).unwrap_err();
        assert!(matches!(
            failure.error,
            RenderError::Gfx {
                step: "Failed to create GPU/CPU fence!",
                ..
            }
        ));
        failure.destroy();
    }

    #[test]
    fn test_late_failure_releases_partial_resources() {
        let gpu = test_utils::open_gpu(&AdapterRequest::default(), HeadlessOptions::default());
        let compositor = SimulatedCompositor::new(SimulatedHmdConfig::default());
        let empty = ShaderBinaries::default();

        let failure = StereoRenderer::new(gpu, compositor, RenderSettings::default(), &SceneSettings::default(), &empty)
            .unwrap_err();
        assert!(matches!(
            failure.error,
            RenderError::Gfx {
                step: "Failed to create pipeline state object!",
                ..
            }
        ));
        // 几何体已经上传过，随后被销毁
        assert_eq!(failure.gfx.stats().heaps_created, 2);
        assert_eq!(failure.gfx.live_heap_count(), 0);
        assert_eq!(failure.gfx.live_object_count(), 0);
        assert_eq!(failure.compositor.live_swap_chain_count(), 0);
        failure.destroy();
    }

    #[test]
    fn test_swap_chain_length_parity() {
        let gpu = test_utils::open_gpu(&AdapterRequest::default(), HeadlessOptions::default());
        let failure =
            test_utils::try_renderer(gpu, SkewedCompositor::new(1, 0), RenderSettings::default()).unwrap_err();
        assert!(matches!(
            failure.error,
            RenderError::SlotParity {
                what: "swap chain length",
                eye: 1,
                expected: 3,
                actual: 4,
            }
        ));
        assert_eq!(failure.gfx.live_object_count(), 0);
        failure.destroy();
    }

    #[test]
    fn test_swap_chain_index_parity() {
        let gpu = test_utils::open_gpu(&AdapterRequest::default(), HeadlessOptions::default());
        let failure =
            test_utils::try_renderer(gpu, SkewedCompositor::new(0, 1), RenderSettings::default()).unwrap_err();
        assert!(matches!(
            failure.error,
            RenderError::SlotParity {
                what: "swap chain current index",
                eye: 1,
                expected: 0,
                actual: 1,
            }
        ));
        assert_eq!(failure.gfx.live_object_count(), 0);
        assert_eq!(failure.gfx.live_heap_count(), 0);
        failure.destroy();

        // 关闭检查时 bootstrap 可以继续
        let gpu = test_utils::open_gpu(&AdapterRequest::default(), HeadlessOptions::default());
        let settings = RenderSettings {
            validate_slot_parity: false,
            ..Default::default()
        };
        let renderer = test_utils::try_renderer(gpu, SkewedCompositor::new(0, 1), settings).unwrap();
        renderer.destroy();
    }

    #[test]
    fn test_settings_from_toml_use_defaults() {
        let settings: RenderSettings = toml::from_str("slot_reuse_policy = \"trust_compositor\"").unwrap();
        assert_eq!(settings.slot_reuse_policy, SlotReusePolicy::TrustCompositor);
        assert_eq!(settings.near, 0.2);
        assert!(settings.validate_slot_parity);
    }
}
