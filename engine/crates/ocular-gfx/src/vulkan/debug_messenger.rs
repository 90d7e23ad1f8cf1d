use std::ffi::CStr;

use ash::vk;

use crate::rhi::GfxResult;
use crate::vulkan::convert::vk_error;

/// 将 validation layer 的消息转发到 log
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

// 创建与销毁
impl DebugMessenger {
    pub fn new(entry: &ash::Entry, instance: &ash::Instance) -> GfxResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let handle = unsafe {
            loader
                .create_debug_utils_messenger(&Self::create_info(), None)
                .map_err(vk_error("vkCreateDebugUtilsMessengerEXT"))?
        };
        Ok(Self { loader, handle })
    }

    pub fn destroy(self) {
        log::info!("destroying debug messenger");
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.handle, None);
        }
    }

    /// 也用于 instance 创建过程中的消息
    pub fn create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vk_debug_callback))
    }
}

/// validation layer 的消息可能是一段 json，MainMessage 字段里面有换行符，需要单独输出
fn format_message(message_type: vk::DebugUtilsMessageTypeFlagsEXT, msg: &str) -> String {
    let mut json_value = serde_json::from_str::<serde_json::Value>(msg).ok();
    let json_obj = json_value.as_mut().and_then(|v| v.as_object_mut());

    match json_obj {
        Some(obj) => {
            let main_msg = obj.remove("MainMessage");
            let main_msg = main_msg.as_ref().and_then(|v| v.as_str()).unwrap_or_default();
            let rest = serde_json::to_string_pretty(&obj).unwrap_or_default();
            format!("[{:?}]\n{}\n{}\n", message_type, rest, main_msg)
        }
        None => format!("[{:?}] {}", message_type, msg),
    }
}

/// # Safety
/// 由 Vulkan loader 调用，`p_callback_data` 在回调期间有效
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let msg = if p_callback_data.is_null() || unsafe { (*p_callback_data).p_message.is_null() } {
        std::borrow::Cow::from("")
    } else {
        unsafe { CStr::from_ptr((*p_callback_data).p_message).to_string_lossy() }
    };
    let format_msg = format_message(message_type, msg.as_ref());

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", format_msg),
        _ => log::info!("{}", format_msg),
    };

    // 只有 layer developer 才需要返回 True
    vk::FALSE
}

/// 可以设置 debug name 的 Vulkan 对象
pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}
