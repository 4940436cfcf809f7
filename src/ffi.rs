// SPDX-License-Identifier: Apache-2.0 OR MIT
// C-ABI bridge: opaque handles over the core pipeline
//
// Foreign hosts interact with the engine through u64 handles backed by a
// process-wide registry. Constructors register an object and return its
// handle (0 on failure); destructors remove it. The registry tracks which
// components an object was built from, so freeing a logger also frees the
// routes, formatters, and sinks nothing else references.
//
// Message and fields arrive as length-prefixed byte buffers. The fields
// payload is a JSON-encoded mapping decoded on the route consumer, never on
// the producer path.

use crate::format::{Format, JsonFormatter, TextFormatter};
use crate::level::LogLevel;
use crate::logger::Logger;
use crate::record::{Envelope, RawRecord};
use crate::route::Route;
use crate::sink::{FileSink, GzipCompressor, RotateInterval, Sink, StdoutSink};
use crate::style::FormatStyle;
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Default)]
struct Registry {
    next_id: u64,
    styles: HashMap<u64, FormatStyle>,
    formatters: HashMap<u64, Arc<dyn Format>>,
    sinks: HashMap<u64, Arc<dyn Sink>>,
    routes: HashMap<u64, Arc<Route>>,
    loggers: HashMap<u64, Arc<Logger>>,
    /// Object handle -> handles of the components it was built from.
    deps: HashMap<u64, Vec<u64>>,
}

impl Registry {
    fn make_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn referenced(&self, id: u64) -> bool {
        self.deps.values().any(|children| children.contains(&id))
    }

    /// Remove `id` from every store, collecting the removed objects into
    /// `graveyard` so their teardown (which may join threads) runs after
    /// the registry lock is released. Components that no remaining object
    /// depends on are removed recursively.
    fn remove(&mut self, id: u64, graveyard: &mut Graveyard) {
        if let Some(logger) = self.loggers.remove(&id) {
            graveyard.loggers.push(logger);
        }
        if let Some(route) = self.routes.remove(&id) {
            graveyard.routes.push(route);
        }
        if let Some(sink) = self.sinks.remove(&id) {
            graveyard.sinks.push(sink);
        }
        if let Some(formatter) = self.formatters.remove(&id) {
            graveyard.formatters.push(formatter);
        }
        self.styles.remove(&id);

        if let Some(children) = self.deps.remove(&id) {
            for child in children {
                if !self.referenced(child) {
                    self.remove(child, graveyard);
                }
            }
        }
    }
}

#[derive(Default)]
struct Graveyard {
    loggers: Vec<Arc<Logger>>,
    routes: Vec<Arc<Route>>,
    sinks: Vec<Arc<dyn Sink>>,
    formatters: Vec<Arc<dyn Format>>,
}

static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();

fn registry() -> &'static Mutex<Registry> {
    REGISTRY.get_or_init(|| {
        Mutex::new(Registry {
            next_id: 1,
            ..Default::default()
        })
    })
}

fn lock() -> std::sync::MutexGuard<'static, Registry> {
    registry().lock().unwrap_or_else(|e| e.into_inner())
}

/// Borrow a C string, treating null as absent.
unsafe fn cstr<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Copy a length-prefixed buffer, treating null or empty as empty.
unsafe fn copy_bytes(ptr: *const u8, len: usize) -> Vec<u8> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(ptr, len).to_vec()
}

/// Register a format style. Returns its handle.
#[no_mangle]
pub extern "C" fn logfan_style_new(
    color_keys: u8,
    color_values: u8,
    color_level: u8,
    key_color: *const c_char,
    value_color: *const c_char,
    reset: *const c_char,
) -> u64 {
    let defaults = FormatStyle::default();
    let style = FormatStyle::new(
        color_keys != 0,
        color_values != 0,
        color_level != 0,
        unsafe { cstr(key_color) }.unwrap_or(defaults.key_color.as_str()),
        unsafe { cstr(value_color) }.unwrap_or(defaults.value_color.as_str()),
        unsafe { cstr(reset) }.unwrap_or(defaults.reset.as_str()),
    );

    let mut reg = lock();
    let id = reg.make_id();
    reg.styles.insert(id, style);
    id
}

fn register_formatter(style_id: u64, max_depth: i32, text: bool) -> u64 {
    let mut reg = lock();
    let style = reg.styles.get(&style_id).cloned().unwrap_or_default();
    let formatter: Arc<dyn Format> = if text {
        let mut f = TextFormatter::new().with_style(style);
        if max_depth > 0 {
            f = f.with_max_depth(max_depth as usize);
        }
        Arc::new(f)
    } else {
        let mut f = JsonFormatter::new().with_style(style);
        if max_depth > 0 {
            f = f.with_max_depth(max_depth as usize);
        }
        Arc::new(f)
    };

    let id = reg.make_id();
    reg.formatters.insert(id, formatter);
    if style_id != 0 {
        reg.deps.insert(id, vec![style_id]);
    }
    id
}

/// Register a JSON formatter. A `style_id` of 0 uses the default style;
/// `max_depth` of 0 or below uses the default depth.
#[no_mangle]
pub extern "C" fn logfan_formatter_json_new(style_id: u64, max_depth: i32) -> u64 {
    register_formatter(style_id, max_depth, false)
}

/// Register a text formatter.
#[no_mangle]
pub extern "C" fn logfan_formatter_text_new(style_id: u64, max_depth: i32) -> u64 {
    register_formatter(style_id, max_depth, true)
}

/// Register a standard-output sink.
#[no_mangle]
pub extern "C" fn logfan_sink_stdout_new() -> u64 {
    let mut reg = lock();
    let id = reg.make_id();
    reg.sinks.insert(id, Arc::new(StdoutSink::new()));
    id
}

/// Register a rotating file sink. `interval` is one of `"day"`, `"week"`,
/// `"month"` (anything else disables time rotation); `compress` of `"gz"`
/// enables gzip archives. Returns 0 when the file cannot be opened.
#[no_mangle]
pub extern "C" fn logfan_sink_file_new(
    path: *const c_char,
    max_size_mb: u64,
    max_backups: u64,
    interval: *const c_char,
    compress: *const c_char,
) -> u64 {
    let Some(path) = (unsafe { cstr(path) }) else {
        return 0;
    };
    let interval = match unsafe { cstr(interval) } {
        Some("day") => RotateInterval::Daily,
        Some("week") => RotateInterval::Weekly,
        Some("month") => RotateInterval::Monthly,
        _ => RotateInterval::None,
    };
    let compressor = match unsafe { cstr(compress) } {
        Some("gz") => Some(Arc::new(GzipCompressor) as Arc<dyn crate::sink::Compress>),
        Some("") | None => None,
        Some(_) => return 0,
    };

    let Ok(sink) = FileSink::new(path, max_size_mb, max_backups as usize, interval, compressor)
    else {
        return 0;
    };

    let mut reg = lock();
    let id = reg.make_id();
    reg.sinks.insert(id, Arc::new(sink));
    id
}

/// Register a route over an existing formatter and sink. Returns 0 when
/// either handle is unknown.
#[no_mangle]
pub extern "C" fn logfan_route_new(formatter_id: u64, sink_id: u64, level: i32) -> u64 {
    let Some(level) = LogLevel::from_i32(level) else {
        return 0;
    };

    let mut reg = lock();
    let (Some(formatter), Some(sink)) = (
        reg.formatters.get(&formatter_id).cloned(),
        reg.sinks.get(&sink_id).cloned(),
    ) else {
        return 0;
    };

    let route = Arc::new(Route::new(formatter, sink, level));
    let id = reg.make_id();
    reg.routes.insert(id, route);
    reg.deps.insert(id, vec![formatter_id, sink_id]);
    id
}

/// Register a logger over existing routes and start their consumers.
/// Unknown route handles are skipped.
#[no_mangle]
pub extern "C" fn logfan_logger_new(route_ids: *const u64, count: usize) -> u64 {
    let ids: Vec<u64> = if route_ids.is_null() || count == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(route_ids, count) }.to_vec()
    };

    let mut reg = lock();
    let mut routes = Vec::with_capacity(ids.len());
    let mut kept = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(route) = reg.routes.get(&id) {
            routes.push(Arc::clone(route));
            kept.push(id);
        }
    }

    let logger = Arc::new(Logger::new(routes));
    let id = reg.make_id();
    reg.loggers.insert(id, logger);
    reg.deps.insert(id, kept);
    id
}

/// Emit through a logger. `fields`/`fields_len` carry a JSON-encoded
/// mapping, decoded on the consumer path.
#[no_mangle]
pub extern "C" fn logfan_log(
    logger_id: u64,
    level: i32,
    msg: *const u8,
    msg_len: usize,
    fields: *const u8,
    fields_len: usize,
) {
    let Some(level) = LogLevel::from_i32(level) else {
        return;
    };
    let logger = match lock().loggers.get(&logger_id) {
        Some(logger) => Arc::clone(logger),
        None => return,
    };
    // The registry lock is released before the (possibly blocking) send.
    logger.emit_raw(RawRecord {
        level,
        message: unsafe { copy_bytes(msg, msg_len) },
        fields: unsafe { copy_bytes(fields, fields_len) },
    });
}

/// Emit onto a single route, bypassing logger fan-out.
#[no_mangle]
pub extern "C" fn logfan_route_log(
    route_id: u64,
    level: i32,
    msg: *const u8,
    msg_len: usize,
    fields: *const u8,
    fields_len: usize,
) {
    let Some(level) = LogLevel::from_i32(level) else {
        return;
    };
    let route = match lock().routes.get(&route_id) {
        Some(route) => Arc::clone(route),
        None => return,
    };
    // Enqueue applies the route's threshold itself.
    route.enqueue(Envelope::Raw(RawRecord {
        level,
        message: unsafe { copy_bytes(msg, msg_len) },
        fields: unsafe { copy_bytes(fields, fields_len) },
    }));
}

/// Drain and close a logger's routes. Blocks until every accepted record
/// is committed. The handle stays valid until freed.
#[no_mangle]
pub extern "C" fn logfan_logger_close(logger_id: u64) {
    let logger = match lock().loggers.get(&logger_id) {
        Some(logger) => Arc::clone(logger),
        None => return,
    };
    logger.close();
}

/// Free a logger and every component of it that nothing else references.
#[no_mangle]
pub extern "C" fn logfan_logger_free(logger_id: u64) {
    logfan_handle_free(logger_id);
}

/// Free any handle; components exclusive to it are freed transitively.
#[no_mangle]
pub extern "C" fn logfan_handle_free(id: u64) {
    let mut graveyard = Graveyard::default();
    {
        let mut reg = lock();
        reg.remove(id, &mut graveyard);
    }
    // Teardown (closing loggers joins consumer threads) happens here,
    // outside the registry lock.
    drop(graveyard);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::fs;

    #[test]
    fn test_bridge_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = CString::new(
            dir.path().join("bridge.log").to_str().unwrap(),
        )
        .unwrap();

        let style = logfan_style_new(
            0,
            0,
            0,
            std::ptr::null(),
            std::ptr::null(),
            std::ptr::null(),
        );
        assert_ne!(style, 0);

        let formatter = logfan_formatter_json_new(style, 0);
        let sink = logfan_sink_file_new(path.as_ptr(), 0, 0, std::ptr::null(), std::ptr::null());
        assert_ne!(sink, 0);

        let route = logfan_route_new(formatter, sink, LogLevel::Debug.as_i32());
        assert_ne!(route, 0);

        let routes = [route];
        let logger = logfan_logger_new(routes.as_ptr(), routes.len());
        assert_ne!(logger, 0);

        let msg = b"over the bridge";
        let fields = br#"{"lane":2}"#;
        logfan_log(
            logger,
            LogLevel::Info.as_i32(),
            msg.as_ptr(),
            msg.len(),
            fields.as_ptr(),
            fields.len(),
        );
        logfan_logger_close(logger);

        let contents = fs::read_to_string(dir.path().join("bridge.log")).unwrap();
        assert!(contents.contains("over the bridge"));
        assert!(contents.contains(r#""lane":2"#));

        logfan_logger_free(logger);
        let reg = lock();
        assert!(!reg.loggers.contains_key(&logger));
        assert!(!reg.routes.contains_key(&route));
        assert!(!reg.formatters.contains_key(&formatter));
        assert!(!reg.sinks.contains_key(&sink));
        assert!(!reg.styles.contains_key(&style));
    }

    #[test]
    fn test_shared_components_survive_free() {
        let formatter = logfan_formatter_json_new(0, 0);
        let sink = logfan_sink_stdout_new();

        let route_a = logfan_route_new(formatter, sink, LogLevel::Info.as_i32());
        let route_b = logfan_route_new(formatter, sink, LogLevel::Error.as_i32());
        assert_ne!(route_a, 0);
        assert_ne!(route_b, 0);

        logfan_handle_free(route_a);
        {
            let reg = lock();
            assert!(!reg.routes.contains_key(&route_a));
            // Still used by route_b.
            assert!(reg.formatters.contains_key(&formatter));
            assert!(reg.sinks.contains_key(&sink));
        }

        logfan_handle_free(route_b);
        let reg = lock();
        assert!(!reg.formatters.contains_key(&formatter));
        assert!(!reg.sinks.contains_key(&sink));
    }

    #[test]
    fn test_invalid_handles_ignored() {
        assert_eq!(logfan_route_new(9_999_999, 9_999_998, 20), 0);
        assert_eq!(
            logfan_route_new(logfan_formatter_json_new(0, 0), 9_999_997, 20),
            0
        );
        // Unknown logger / bad level: silently ignored.
        logfan_log(9_999_996, 20, std::ptr::null(), 0, std::ptr::null(), 0);
        logfan_logger_close(9_999_995);
        logfan_handle_free(9_999_994);
    }

    #[test]
    fn test_unknown_compression_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path =
            CString::new(dir.path().join("c.log").to_str().unwrap()).unwrap();
        let compress = CString::new("zstd").unwrap();
        assert_eq!(
            logfan_sink_file_new(path.as_ptr(), 0, 0, std::ptr::null(), compress.as_ptr()),
            0
        );
    }

    #[test]
    fn test_route_log_respects_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("direct.log");
        let path = CString::new(file.to_str().unwrap()).unwrap();

        let formatter = logfan_formatter_text_new(0, 0);
        let sink = logfan_sink_file_new(path.as_ptr(), 0, 0, std::ptr::null(), std::ptr::null());
        let route = logfan_route_new(formatter, sink, LogLevel::Error.as_i32());

        let msg = b"below threshold";
        logfan_route_log(route, LogLevel::Info.as_i32(), msg.as_ptr(), msg.len(), std::ptr::null(), 0);

        // A logger starts the consumer and drains on close.
        let routes = [route];
        let logger = logfan_logger_new(routes.as_ptr(), routes.len());
        let msg = b"at threshold";
        logfan_route_log(route, LogLevel::Error.as_i32(), msg.as_ptr(), msg.len(), std::ptr::null(), 0);
        logfan_logger_close(logger);

        let contents = fs::read_to_string(&file).unwrap();
        assert!(!contents.contains("below threshold"));
        assert!(contents.contains("at threshold"));

        logfan_logger_free(logger);
    }
}
