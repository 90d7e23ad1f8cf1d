//! 每帧的状态机
//!
//! `Idle → 查询会话状态 → (Paused | Running) → 逐眼录制 → 提交 → Idle`，每次 host tick 执行一次

use glam::Mat4;
use itertools::Itertools;
use ocular_gfx::rhi::{
    GfxCommandList, GfxDevice,
    types::{ClearValues, ResourceState, ShaderStage},
};
use ocular_xr::{
    Compositor, XrError,
    types::{Layer, LayerEye, Pose},
};

use crate::constants::{PIXEL_CONSTANTS_OFFSET, VERTEX_CONSTANTS_OFFSET, VertexConstants};
use crate::error::{RenderResult, StepContext};
use crate::math;
use crate::renderer::StereoRenderer;

pub const CLEAR_VALUES: ClearValues = ClearValues {
    color: [0.5294, 0.8078, 0.9216, 1.0],
    depth: 1.0,
};

/// 一次 tick 的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// 帧已经提交给合成器
    Submitted { frame_index: u64 },
    /// 画面不可见，本次没有任何提交
    Skipped,
    /// 合成器要求退出，之后不再产生新的帧
    Quit,
    /// 头显显示丢失，需要销毁 renderer 并重建会话
    SessionLost,
}

impl<G: GfxDevice, C: Compositor<G>> StereoRenderer<G, C> {
    /// 执行一帧，dt 为距离上一次 tick 的秒数
    ///
    /// 显示丢失返回 [`TickOutcome::SessionLost`]，其他错误都是致命的
    pub fn tick(&mut self, dt: f32) -> RenderResult<TickOutcome> {
        let _span = ocular_crate_tools::profile_span!("StereoRenderer::tick");
        match self.tick_inner(dt) {
            Err(err) if err.is_display_lost() => {
                log::warn!("{} display lost during frame", self.ctx.frame_counter.frame_name(0));
                Ok(TickOutcome::SessionLost)
            }
            other => other,
        }
    }

    fn tick_inner(&mut self, dt: f32) -> RenderResult<TickOutcome> {
        let status = self.compositor.session_status().step("Failed to get session status!")?;
        if status.display_lost {
            return Ok(TickOutcome::SessionLost);
        }
        if status.should_quit {
            log::info!("compositor requested quit");
            return Ok(TickOutcome::Quit);
        }
        if status.should_recenter {
            if let Err(err) = self.compositor.recenter_tracking_origin() {
                log::warn!("recenter tracking origin failed: {err}");
            }
        }

        let was_focus_lost = self.ctx.pause.focus_lost;
        self.ctx.pause.focus_lost = !status.has_input_focus;
        if was_focus_lost != self.ctx.pause.focus_lost {
            log::info!("input focus {}", if status.has_input_focus { "regained" } else { "lost" });
        }
        let dt = self.ctx.pause.effective_dt(dt);

        if !status.is_visible {
            return Ok(TickOutcome::Skipped);
        }

        let frame_index = self.ctx.frame_counter.frame_index();
        self.compositor
            .wait_to_begin_frame(frame_index)
            .step("Failed to wait to begin frame!")?;
        self.compositor.begin_frame(frame_index).step("Failed to begin frame!")?;

        // 每只眼睛的位姿和 FOV
        let hmd_to_eye = self
            .eyes
            .iter()
            .enumerate()
            .map(|(eye, target)| {
                self.compositor
                    .eye_render_desc(eye, &target.fov)
                    .map(|desc| desc.hmd_to_eye_pose)
            })
            .collect::<Result<Vec<Pose>, _>>()
            .step("Failed to get eye render desc!")?;
        let eye_poses = self
            .compositor
            .eye_poses(frame_index, &hmd_to_eye)
            .step("Failed to get eye poses!")?;
        if eye_poses.poses.len() != self.eyes.len() {
            return Err::<TickOutcome, _>(XrError::call_failed(
                "eye_poses",
                format!("expected {} poses, got {}", self.eyes.len(), eye_poses.poses.len()),
            ))
            .step("Failed to get eye poses!");
        }

        self.scene.update(dt);

        for (eye, pose) in eye_poses.poses.iter().enumerate() {
            self.render_eye(eye, pose)?;
        }

        let layer = Layer::EyeFov {
            eyes: self
                .eyes
                .iter()
                .zip(eye_poses.poses.iter())
                .map(|(target, pose)| LayerEye {
                    swap_chain: target.swap_chain,
                    viewport: target.layer_viewport,
                    fov: target.fov,
                    render_pose: *pose,
                })
                .collect_vec(),
            sensor_sample_time: eye_poses.sensor_sample_time,
        };
        self.compositor
            .end_frame(frame_index, std::slice::from_ref(&layer))
            .step("Failed to end frame!")?;

        self.ctx.frame_counter.next_frame();
        Ok(TickOutcome::Submitted { frame_index })
    }

    /// 录制并提交一只眼睛，然后通知合成器
    fn render_eye(&mut self, eye: usize, pose: &Pose) -> RenderResult<()> {
        let _span = ocular_crate_tools::profile_span!("render_eye");
        let target = &self.eyes[eye];
        let slot = self
            .compositor
            .swap_chain_current_index(target.swap_chain)
            .step("Failed to get swap chain index!")?;

        // 矩阵
        let (cam_rotation, cam_position) = self.scene.camera.eye_camera(pose.orientation, pose.position);
        let view = math::view_from_pose(cam_rotation, cam_position);
        let proj = math::off_axis_projection_rh(&target.fov, self.settings.near, self.settings.far)?;
        let view_proj = proj * view;
        let draw_constants = self
            .scene
            .drawables
            .iter()
            .map(|drawable| -> RenderResult<VertexConstants> {
                let mvp: Mat4 = view_proj * drawable.model;
                let normal = math::inverse_transpose_3x3(&drawable.model)?;
                Ok(VertexConstants::new(&mvp, &normal))
            })
            .collect::<RenderResult<Vec<_>>>()?;

        let gfx = &self.ctx.gfx;
        let image = self
            .compositor
            .swap_chain_image(target.swap_chain, slot)
            .step("Failed to get swap chain image!")?;
        let rtv = *self.ring.rtv(eye, slot)?;
        let frame_name = self.ctx.frame_counter.frame_name(slot);

        let list = self.ring.begin_eye(gfx, &self.ctx.fence, eye, slot)?;
        list.begin_label(&format!("{frame_name} eye {eye}"));
        list.image_barrier(image, ResourceState::CompositorRead, ResourceState::RenderTarget);
        list.begin_render_pass(&rtv, &target.dsv, &CLEAR_VALUES, &target.viewport, &target.scissor);

        list.bind_pipeline(&self.pipeline);
        list.push_constants(
            &self.pipeline,
            ShaderStage::Pixel,
            PIXEL_CONSTANTS_OFFSET,
            bytemuck::bytes_of(&self.pixel_constants),
        );
        for (drawable, constants) in self.scene.drawables.iter().zip(draw_constants.iter()) {
            list.push_constants(
                &self.pipeline,
                ShaderStage::Vertex,
                VERTEX_CONSTANTS_OFFSET,
                bytemuck::bytes_of(constants),
            );
            list.bind_vertex_buffer(self.geometry.buffer(), &drawable.vertex_view);
            list.bind_index_buffer(self.geometry.buffer(), &drawable.index_view);
            list.draw_indexed(drawable.index_count, 0, 0);
        }

        list.end_render_pass();
        list.image_barrier(image, ResourceState::RenderTarget, ResourceState::CompositorRead);
        list.end_label();

        let swap_chain = target.swap_chain;
        self.ring.finish_eye(gfx, &mut self.ctx.fence, eye, slot)?;
        self.compositor
            .commit_swap_chain(swap_chain)
            .step("Failed to commit swap chain!")?;

        log::trace!("{frame_name} eye {eye} submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_ring::SlotReusePolicy;
    use crate::renderer::RenderSettings;
    use crate::test_utils::{self, TestRenderer};
    use ocular_gfx::headless::{DEFAULT_EVENT_LOG_CAPACITY, FenceCompletion, QueueEvent, RecordedCommand};
    use ocular_xr::simulated::{SimulatedFailure, SimulatedHmdConfig, XrCall};
    use ocular_xr::types::SessionStatus;

    const DT: f32 = 1.0 / 90.0;

    fn status(f: impl FnOnce(&mut SessionStatus)) -> SessionStatus {
        let mut status = SessionStatus::RUNNING;
        f(&mut status);
        status
    }

    fn cube_angle(renderer: &TestRenderer) -> f32 {
        renderer.scene().spinner.angle_deg
    }

    #[test]
    fn test_frame_records_expected_sequence() {
        let mut renderer = test_utils::renderer();
        renderer.gfx().clear_events();

        assert_eq!(renderer.tick(DT).unwrap(), TickOutcome::Submitted { frame_index: 0 });
        assert_eq!(renderer.frame_index(), 1);

        let submissions = renderer.gfx().submissions();
        assert_eq!(submissions.len(), 2);
        for (eye, submission) in submissions.iter().enumerate() {
            assert_eq!(submission.list, format!("eye{eye}"));
            assert_eq!(submission.allocator, format!("eye{eye}-slot0"));

            let commands = test_utils::render_commands(submission);
            let kinds = commands
                .iter()
                .map(|c| match c {
                    RecordedCommand::ImageBarrier { before, after, .. } => format!("barrier {before:?}->{after:?}"),
                    RecordedCommand::BeginRenderPass { clear, .. } => {
                        assert_eq!(*clear, CLEAR_VALUES);
                        "begin".to_string()
                    }
                    RecordedCommand::BindPipeline { .. } => "pipeline".to_string(),
                    RecordedCommand::PushConstants { stage, offset, data } => {
                        format!("push {stage:?}@{offset}+{}", data.len())
                    }
                    RecordedCommand::BindVertexBuffer { .. } => "vb".to_string(),
                    RecordedCommand::BindIndexBuffer { .. } => "ib".to_string(),
                    RecordedCommand::DrawIndexed { index_count, .. } => format!("draw {index_count}"),
                    RecordedCommand::EndRenderPass => "end".to_string(),
                    other => format!("{other:?}"),
                })
                .collect_vec();
            assert_eq!(
                kinds,
                vec![
                    "barrier CompositorRead->RenderTarget",
                    "begin",
                    "pipeline",
                    "push Pixel@112+28",
                    "push Vertex@0+112",
                    "vb",
                    "ib",
                    "draw 12",
                    "push Vertex@0+112",
                    "vb",
                    "ib",
                    "draw 36",
                    "end",
                    "barrier RenderTarget->CompositorRead",
                ]
            );
        }

        // 每只眼睛提交之后 signal 一次
        let events = renderer.gfx().events();
        assert!(matches!(events[1], QueueEvent::Signal { .. }));
        assert!(matches!(events[3], QueueEvent::Signal { .. }));

        let stats = renderer.compositor().stats();
        assert_eq!((stats.commits, stats.frames_ended), (2, 1));
        let Layer::EyeFov { eyes, .. } = &renderer.compositor().last_layers()[0];
        assert_eq!(eyes.len(), 2);
        assert_eq!(eyes[0].viewport.extent(), renderer.eyes()[0].extent);
        assert_eq!(eyes[1].fov, renderer.eyes()[1].fov);
        assert!(renderer.compositor().is_frame_idle());

        renderer.destroy();
    }

    #[test]
    fn test_vertex_constants_match_eye_pose() {
        let mut renderer = test_utils::renderer();
        renderer.gfx().clear_events();
        renderer.tick(DT).unwrap();

        let Layer::EyeFov { eyes, .. } = renderer.compositor().last_layers()[0].clone();
        let pose = eyes[1].render_pose;
        let view = math::view_from_pose(pose.orientation, pose.position);
        let proj = math::off_axis_projection_rh(&eyes[1].fov, 0.2, 100.0).unwrap();
        let expected = VertexConstants::new(&(proj * view), &glam::Mat3::IDENTITY);

        let commands = test_utils::render_commands(&renderer.gfx().submissions()[1]);
        let Some(RecordedCommand::PushConstants { data, .. }) = commands
            .iter()
            .find(|c| matches!(c, RecordedCommand::PushConstants { stage: ShaderStage::Vertex, .. }))
        else {
            panic!("no vertex constants pushed");
        };
        let pushed: VertexConstants = bytemuck::pod_read_unaligned(data);
        for (a, b) in pushed.mvp.iter().flatten().zip(expected.mvp.iter().flatten()) {
            assert!((a - b).abs() < 1e-5, "{a} != {b}");
        }
        assert_eq!(pushed.normal_mat, expected.normal_mat);

        renderer.destroy();
    }

    #[test]
    fn test_slots_rotate_through_allocators() {
        let mut renderer = test_utils::renderer();
        renderer.gfx().clear_events();
        for _ in 0..4 {
            renderer.tick(DT).unwrap();
        }

        let allocators = renderer
            .gfx()
            .submissions()
            .iter()
            .filter(|s| s.list == "eye1")
            .map(|s| s.allocator.clone())
            .collect_vec();
        assert_eq!(allocators, vec!["eye1-slot0", "eye1-slot1", "eye1-slot2", "eye1-slot0"]);
        assert_eq!(renderer.ring().allocator_index(1, 2).unwrap(), 5);

        renderer.destroy();
    }

    #[test]
    fn test_fence_tracked_waits_for_slot_before_reuse() {
        let mut renderer = test_utils::renderer();
        renderer.gfx().set_fence_completion(FenceCompletion::Manual);

        // 三帧用完所有 slot，GPU 还没有完成任何一帧
        for _ in 0..3 {
            renderer.tick(DT).unwrap();
        }
        let before = renderer.gfx().stats();
        assert_eq!(before.fence_waits, 0);

        let completer = renderer.ctx.fence.fence().completer();
        let last_signaled = renderer.ctx.fence.last_signaled();
        let worker = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            completer.complete(last_signaled);
        });
        assert_eq!(renderer.tick(DT).unwrap(), TickOutcome::Submitted { frame_index: 3 });
        worker.join().unwrap();

        let after = renderer.gfx().stats();
        assert_eq!(after.fence_waits - before.fence_waits, 1);
        assert_eq!(after.blocking_fence_waits - before.blocking_fence_waits, 1);

        renderer.gfx().set_fence_completion(FenceCompletion::Immediate);
        renderer.destroy();
    }

    #[test]
    fn test_trust_compositor_skips_frame_signals() {
        let settings = RenderSettings {
            slot_reuse_policy: SlotReusePolicy::TrustCompositor,
            ..Default::default()
        };
        let mut renderer = test_utils::renderer_with(settings, SimulatedHmdConfig::default());
        renderer.gfx().clear_events();
        for _ in 0..4 {
            renderer.tick(DT).unwrap();
        }
        assert_eq!(renderer.gfx().stats().submits, 1 + 8);
        assert!(renderer.gfx().events().iter().all(|e| matches!(e, QueueEvent::Submit(_))));
        renderer.destroy();
    }

    #[test]
    fn test_focus_loss_pauses_but_still_renders() {
        let mut renderer = test_utils::renderer();
        renderer.gfx().clear_events();
        renderer
            .compositor_mut()
            .push_status(status(|s| s.has_input_focus = false));

        assert_eq!(renderer.tick(1.0).unwrap(), TickOutcome::Submitted { frame_index: 0 });
        assert!(renderer.is_paused());
        assert_eq!(cube_angle(&renderer), 0.0);
        assert_eq!(renderer.gfx().submissions().len(), 2);

        renderer.tick(1.0).unwrap();
        assert!(!renderer.is_paused());
        assert!((cube_angle(&renderer) - 50.0).abs() < 1e-4);

        renderer.destroy();
    }

    #[test]
    fn test_user_pause_survives_focus_changes() {
        let mut renderer = test_utils::renderer();
        renderer.set_user_paused(true);
        renderer
            .compositor_mut()
            .push_status(status(|s| s.has_input_focus = false));

        renderer.tick(1.0).unwrap();
        renderer.tick(1.0).unwrap();
        assert!(renderer.is_paused());
        assert_eq!(cube_angle(&renderer), 0.0);

        assert!(!renderer.toggle_user_pause());
        renderer.tick(0.5).unwrap();
        assert!((cube_angle(&renderer) - 25.0).abs() < 1e-4);

        renderer.destroy();
    }

    #[test]
    fn test_invisible_frame_is_skipped() {
        let mut renderer = test_utils::renderer();
        renderer.gfx().clear_events();
        renderer.compositor_mut().push_status(status(|s| s.is_visible = false));

        assert_eq!(renderer.tick(DT).unwrap(), TickOutcome::Skipped);
        assert!(renderer.gfx().events().is_empty());
        assert_eq!(renderer.frame_index(), 0);
        assert_eq!(renderer.compositor().stats().frames_waited, 0);

        assert_eq!(renderer.tick(DT).unwrap(), TickOutcome::Submitted { frame_index: 0 });
        renderer.destroy();
    }

    #[test]
    fn test_quit_stops_frames() {
        let mut renderer = test_utils::renderer();
        renderer.gfx().clear_events();
        renderer.compositor_mut().push_status(status(|s| s.should_quit = true));

        assert_eq!(renderer.tick(DT).unwrap(), TickOutcome::Quit);
        assert!(renderer.gfx().submissions().is_empty());

        let (gfx, compositor) = renderer.release();
        assert_eq!(gfx.live_object_count(), 0);
        compositor.destroy(&gfx);
        gfx.destroy();
    }

    #[test]
    fn test_recenter_is_requested_and_frame_continues() {
        let mut renderer = test_utils::renderer();
        renderer.compositor_mut().push_status(status(|s| s.should_recenter = true));

        assert_eq!(renderer.tick(DT).unwrap(), TickOutcome::Submitted { frame_index: 0 });
        assert_eq!(renderer.compositor().stats().recenters, 1);
        renderer.destroy();
    }

    #[test]
    fn test_begin_frame_failure_is_fatal() {
        let mut renderer = test_utils::renderer();
        renderer
            .compositor_mut()
            .fail_next(XrCall::BeginFrame, SimulatedFailure::CallFailed);

        let err = renderer.tick(DT).unwrap_err();
        assert!(!err.is_display_lost());
        assert!(err.to_string().starts_with("Failed to begin frame!"));
        assert_eq!(renderer.frame_index(), 0);
        renderer.destroy();
    }

    #[test]
    fn test_end_frame_failure_is_fatal() {
        let mut renderer = test_utils::renderer();
        renderer
            .compositor_mut()
            .fail_next(XrCall::EndFrame, SimulatedFailure::CallFailed);

        let err = renderer.tick(DT).unwrap_err();
        assert!(err.to_string().starts_with("Failed to end frame!"));
        // 两只眼睛都已经提交
        assert_eq!(renderer.compositor().stats().commits, 2);
        assert_eq!(renderer.frame_index(), 0);
        renderer.destroy();
    }

    #[test]
    fn test_short_pose_list_is_fatal() {
        let mut renderer = test_utils::renderer();
        renderer.gfx().clear_events();
        renderer.compositor_mut().truncate_next_eye_poses(1);

        let err = renderer.tick(DT).unwrap_err();
        assert!(!err.is_display_lost());
        assert!(err.to_string().starts_with("Failed to get eye poses!"));
        assert!(err.to_string().contains("expected 2 poses, got 1"));
        // 没有录制任何一只眼睛
        assert!(renderer.gfx().submissions().is_empty());
        assert_eq!(renderer.compositor().stats().commits, 0);
        assert_eq!(renderer.frame_index(), 0);
        renderer.destroy();
    }

    #[test]
    fn test_long_run_keeps_event_log_bounded() {
        let mut renderer = test_utils::renderer();
        for _ in 0..1000 {
            assert!(matches!(renderer.tick(DT).unwrap(), TickOutcome::Submitted { .. }));
        }
        let stats = renderer.gfx().stats();
        assert!(stats.submits as usize > DEFAULT_EVENT_LOG_CAPACITY);
        assert_eq!(renderer.gfx().events().len(), DEFAULT_EVENT_LOG_CAPACITY);
        renderer.destroy();
    }

    #[test]
    fn test_display_loss_ends_session() {
        let mut renderer = test_utils::renderer();
        renderer
            .compositor_mut()
            .fail_next(XrCall::WaitToBeginFrame, SimulatedFailure::DisplayLost);
        assert_eq!(renderer.tick(DT).unwrap(), TickOutcome::SessionLost);
        // 之后的状态查询也会报告显示丢失
        assert_eq!(renderer.tick(DT).unwrap(), TickOutcome::SessionLost);

        let (gfx, compositor) = renderer.release();
        assert_eq!(gfx.live_object_count(), 0);
        assert_eq!(gfx.live_heap_count(), 0);
        compositor.destroy(&gfx);
        gfx.destroy();
    }
}
