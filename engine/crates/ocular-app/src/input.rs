//! 宿主输入
//!
//! 头显会话本身通过 `SessionStatus` 报告退出/暂停，这里只处理桌面窗口上的按键：
//! Escape 切换暂停，关闭窗口或者 Alt+F4 退出

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Context;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, ModifiersState, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use crate::config::WindowConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostSignal {
    Quit,
    TogglePause,
}

/// 每帧调用一次，返回这段时间内产生的信号
pub trait InputSource {
    fn poll(&mut self) -> Vec<HostSignal>;
}

/// 按帧预先写好的输入；脚本用完之后不再产生信号
#[derive(Debug, Default)]
pub struct ScriptedInput {
    frames: VecDeque<Vec<HostSignal>>,
}
impl ScriptedInput {
    pub fn new(frames: impl IntoIterator<Item = Vec<HostSignal>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// 第 frame 次 poll 时产生 signal
    pub fn at(frame: usize, signal: HostSignal) -> Self {
        let mut frames = vec![Vec::new(); frame + 1];
        frames[frame].push(signal);
        Self::new(frames)
    }
}
impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Vec<HostSignal> {
        self.frames.pop_front().unwrap_or_default()
    }
}

/// 把按键翻译成信号
#[derive(Debug, Default)]
struct KeyMapper {
    modifiers: ModifiersState,
}
impl KeyMapper {
    fn map(&self, event: &KeyEvent) -> Option<HostSignal> {
        if event.state != ElementState::Pressed || event.repeat {
            return None;
        }
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => Some(HostSignal::TogglePause),
            Key::Named(NamedKey::F4) if self.modifiers.alt_key() => Some(HostSignal::Quit),
            _ => None,
        }
    }
}

struct InputHandler {
    window_config: WindowConfig,
    window: Option<Window>,
    keys: KeyMapper,
    signals: Vec<HostSignal>,
    error: Option<anyhow::Error>,
}

impl ApplicationHandler for InputHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        log::info!("creating mirror window");
        let attributes = Window::default_attributes()
            .with_title(self.window_config.title.clone())
            .with_inner_size(LogicalSize::new(self.window_config.width, self.window_config.height));
        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(window),
            Err(err) => {
                log::error!("failed to create window: {err}");
                self.error = Some(anyhow::Error::new(err).context("failed to create window"));
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("close requested");
                self.signals.push(HostSignal::Quit);
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.keys.modifiers = modifiers.state();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(signal) = self.keys.map(&event) {
                    log::info!("key signal: {signal:?}");
                    self.signals.push(signal);
                }
            }
            _ => (),
        }
    }
}

/// 桌面窗口的输入，事件循环由 [`InputSource::poll`] 驱动，不阻塞渲染循环
pub struct WinitInput {
    event_loop: EventLoop<()>,
    handler: InputHandler,
}
impl WinitInput {
    pub fn new(window_config: &WindowConfig) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new().context("failed to create event loop")?;
        Ok(Self {
            event_loop,
            handler: InputHandler {
                window_config: window_config.clone(),
                window: None,
                keys: KeyMapper::default(),
                signals: Vec::new(),
                error: None,
            },
        })
    }
}
impl InputSource for WinitInput {
    fn poll(&mut self) -> Vec<HostSignal> {
        let status = self.event_loop.pump_app_events(Some(Duration::ZERO), &mut self.handler);
        let mut signals = std::mem::take(&mut self.handler.signals);
        if let PumpStatus::Exit(code) = status {
            log::info!("event loop exited with code {code}");
            signals.push(HostSignal::Quit);
        }
        if let Some(err) = self.handler.error.take() {
            log::warn!("window input disabled: {err:#}");
        }
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_input() {
        let mut input = ScriptedInput::at(2, HostSignal::Quit);
        assert!(input.poll().is_empty());
        assert!(input.poll().is_empty());
        assert_eq!(input.poll(), vec![HostSignal::Quit]);
        assert!(input.poll().is_empty());
    }

    #[test]
    fn test_scripted_input_keeps_order() {
        let mut input = ScriptedInput::new([vec![HostSignal::TogglePause, HostSignal::Quit]]);
        assert_eq!(input.poll(), vec![HostSignal::TogglePause, HostSignal::Quit]);
    }
}
