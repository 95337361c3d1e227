use std::{
    borrow::Cow,
    ffi::{c_void, CStr},
    sync::Arc,
};

use ash::{
    ext::debug_utils,
    vk::{
        self, Bool32, DebugUtilsMessageSeverityFlagsEXT, DebugUtilsMessageTypeFlagsEXT,
        DebugUtilsMessengerCallbackDataEXT, DebugUtilsMessengerCreateInfoEXT,
        DebugUtilsMessengerEXT,
    },
};
use tracing::debug;

use crate::{
    vulkan::{
        diagnostics::{condense_message, DiagnosticsSink, MessageSeverity},
        InstanceGuard,
    },
    InitError,
};

/// RAII for the debug utils messenger. Keeps the sink the callback writes into
/// alive for as long as the messenger exists.
pub struct DebugUtilsGuard {
    debug_utils: debug_utils::Instance,
    messenger: DebugUtilsMessengerEXT,
    sink: Arc<DiagnosticsSink>,
    // need to keep a reference to instance to ensure we get dropped before it does
    _instance: Arc<InstanceGuard>,
}

impl DebugUtilsGuard {
    pub fn try_new(
        instance: &Arc<InstanceGuard>,
        sink: Arc<DiagnosticsSink>,
    ) -> Result<Self, InitError> {
        let debug_utils = debug_utils::Instance::new(instance.entry(), instance);
        let create_info = get_debug_create_info(&sink);
        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(InitError::DebugMessenger)?;
        debug!("Debug messenger attached");
        Ok(Self {
            debug_utils,
            messenger,
            sink,
            _instance: Arc::clone(instance),
        })
    }

    pub fn sink(&self) -> &Arc<DiagnosticsSink> {
        &self.sink
    }
}

impl Drop for DebugUtilsGuard {
    fn drop(&mut self) {
        debug!("Dropping DebugUtilsGuard");
        unsafe {
            self.debug_utils
                .destroy_debug_utils_messenger(self.messenger, None)
        }
    }
}

fn get_debug_create_info(
    sink: &Arc<DiagnosticsSink>,
) -> DebugUtilsMessengerCreateInfoEXT<'static> {
    DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            DebugUtilsMessageSeverityFlagsEXT::ERROR | DebugUtilsMessageSeverityFlagsEXT::WARNING,
        )
        .message_type(
            DebugUtilsMessageTypeFlagsEXT::GENERAL
                | DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                | DebugUtilsMessageTypeFlagsEXT::VALIDATION,
        )
        .pfn_user_callback(Some(vulkan_debug_utils_callback))
        .user_data(Arc::as_ptr(sink) as *mut c_void)
}

unsafe extern "system" fn vulkan_debug_utils_callback(
    message_severity: DebugUtilsMessageSeverityFlagsEXT,
    _message_type: DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const DebugUtilsMessengerCallbackDataEXT<'_>,
    p_user_data: *mut c_void,
) -> Bool32 {
    if p_callback_data.is_null() || p_user_data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: user data is the sink owned by the DebugUtilsGuard, which outlives the messenger
    let sink = unsafe { &*(p_user_data as *const DiagnosticsSink) };
    // SAFETY: the layer hands us valid callback data for the duration of the call
    let callback_data = unsafe { &*p_callback_data };

    let message = if callback_data.p_message.is_null() {
        Cow::from("")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message) }.to_string_lossy()
    };

    let objects = if callback_data.p_objects.is_null() || callback_data.object_count == 0 {
        &[][..]
    } else {
        unsafe {
            std::slice::from_raw_parts(callback_data.p_objects, callback_data.object_count as usize)
        }
    };
    let object_names = objects
        .iter()
        .map(|object| {
            (!object.p_object_name.is_null())
                .then(|| unsafe { CStr::from_ptr(object.p_object_name) }.to_string_lossy())
        })
        .collect::<Vec<_>>();
    let object_names = object_names
        .iter()
        .map(|name| name.as_deref())
        .collect::<Vec<_>>();

    sink.submit(
        MessageSeverity::from_flags(message_severity),
        condense_message(&message, &object_names),
    );

    // dont skip driver
    vk::FALSE
}
