use std::{backtrace::Backtrace, collections::HashSet, sync::Mutex};

use ash::vk::DebugUtilsMessageSeverityFlagsEXT;
use tracing::{event, Level};

/// Distinct validation messages reported per process before the rest are dropped.
pub const MAX_REPORTED_MESSAGES: usize = 20;

const VALID_USAGE_MARKER: &str = " The Vulkan spec states:";

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum MessageSeverity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl MessageSeverity {
    pub fn from_flags(flags: DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if flags.contains(DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            MessageSeverity::Error
        } else if flags.contains(DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            MessageSeverity::Warning
        } else if flags.contains(DebugUtilsMessageSeverityFlagsEXT::INFO) {
            MessageSeverity::Info
        } else {
            MessageSeverity::Verbose
        }
    }

    fn label(&self) -> &'static str {
        match self {
            MessageSeverity::Verbose => "vulkan verbose",
            MessageSeverity::Info => "vulkan info",
            MessageSeverity::Warning => "vulkan warning",
            MessageSeverity::Error => "vulkan error",
        }
    }
}

/// Deduplicating, bounded sink for messages coming out of the validation layer.
///
/// The layer may call in from any driver thread, so all state sits behind one
/// mutex. Once `capacity` distinct messages have been reported, further distinct
/// messages are dropped silently.
#[derive(Debug)]
pub struct DiagnosticsSink {
    seen: Mutex<HashSet<String>>,
    capacity: usize,
    callstack: bool,
}

impl DiagnosticsSink {
    pub fn new(callstack: bool) -> Self {
        Self::with_capacity(MAX_REPORTED_MESSAGES, callstack)
    }

    pub fn with_capacity(capacity: usize, callstack: bool) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            capacity,
            callstack,
        }
    }

    /// Records `message` and logs it if it is new and the cap has not been reached.
    /// Returns whether the message was reported.
    pub fn submit(&self, severity: MessageSeverity, message: String) -> bool {
        {
            let mut seen = self.seen.lock().unwrap_or_else(|err| err.into_inner());
            if seen.len() >= self.capacity || seen.contains(&message) {
                return false;
            }
            seen.insert(message.clone());
        }

        let label = severity.label();
        match severity {
            MessageSeverity::Verbose => event!(Level::TRACE, "[{label}] {message}"),
            MessageSeverity::Info => event!(Level::INFO, "[{label}] {message}"),
            MessageSeverity::Warning => event!(Level::WARN, "[{label}] {message}"),
            MessageSeverity::Error => {
                event!(Level::ERROR, "[{label}] {message}");
                if self.callstack {
                    event!(Level::ERROR, "{}", Backtrace::force_capture());
                }
            }
        }
        true
    }

    pub fn reported_count(&self) -> usize {
        self.seen.lock().unwrap_or_else(|err| err.into_inner()).len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Shortens a raw validation message.
///
/// Messages shaped like `id | handle | text` are reduced to `text`, cut before the
/// quoted valid usage text, and followed by the names of the involved objects.
/// Anything else passes through untouched.
pub fn condense_message(raw: &str, object_names: &[Option<&str>]) -> String {
    let parts: Vec<&str> = raw.split(" | ").collect();
    if parts.len() != 3 {
        return raw.to_owned();
    }

    let text = parts[2];
    let mut message = match text.find(VALID_USAGE_MARKER) {
        Some(pos) => text[..pos].to_owned(),
        None => text.to_owned(),
    };

    if !object_names.is_empty() {
        let names = object_names
            .iter()
            .map(|name| name.unwrap_or("<noname>"))
            .collect::<Vec<_>>()
            .join(", ");
        message.push_str(&format!(" ({names})"));
    }
    message
}
