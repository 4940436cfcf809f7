// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logger: fan-out over routes, lifecycle, and the severity convenience API

use crate::level::LogLevel;
use crate::record::{Envelope, LogRecord, RawRecord};
use crate::route::Route;
use crate::value::Value;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owns an ordered set of routes and fans records out to those whose
/// threshold admits the level. Construction eagerly starts every route's
/// consumer; `close` stops intake, drains, and joins them.
///
/// Emitting never fails and never surfaces sink errors: a logging failure
/// must not corrupt the producer's own control flow.
pub struct Logger {
    routes: Vec<Arc<Route>>,
    capture_caller: bool,
    closed: AtomicBool,
}

impl Logger {
    pub fn new(routes: Vec<Arc<Route>>) -> Self {
        for route in &routes {
            route.start();
        }
        Self {
            routes,
            capture_caller: false,
            closed: AtomicBool::new(false),
        }
    }

    /// Record the emitting call site (`file:line`) on every record.
    pub fn with_caller(mut self) -> Self {
        self.capture_caller = true;
        self
    }

    /// Build a record once and offer it to every admitting route.
    ///
    /// Returns without allocating when no route admits the level.
    #[track_caller]
    pub fn emit(&self, level: LogLevel, message: impl Into<String>, fields: HashMap<String, Value>) {
        if !self.routes.iter().any(|r| r.should_log(level)) {
            return;
        }

        let caller = if self.capture_caller {
            let location = std::panic::Location::caller();
            Some(format!("{}:{}", base_name(location.file()), location.line()))
        } else {
            None
        };

        let record = Arc::new(LogRecord {
            level,
            timestamp: Utc::now(),
            message: message.into(),
            fields,
            caller,
        });

        // Each route's enqueue is the threshold gate; non-admitting routes
        // discard the shared handle without touching their queue.
        for route in &self.routes {
            route.enqueue(Envelope::Shared(Arc::clone(&record)));
        }
    }

    /// Fan out a bridge record; the payload stays raw until each route's
    /// consumer decodes it.
    pub fn emit_raw(&self, raw: RawRecord) {
        for route in &self.routes {
            route.enqueue(Envelope::Raw(raw.clone()));
        }
    }

    #[track_caller]
    pub fn trace(&self, message: impl Into<String>, fields: HashMap<String, Value>) {
        self.emit(LogLevel::Trace, message, fields);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>, fields: HashMap<String, Value>) {
        self.emit(LogLevel::Debug, message, fields);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>, fields: HashMap<String, Value>) {
        self.emit(LogLevel::Info, message, fields);
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<String>, fields: HashMap<String, Value>) {
        self.emit(LogLevel::Warning, message, fields);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>, fields: HashMap<String, Value>) {
        self.emit(LogLevel::Error, message, fields);
    }

    #[track_caller]
    pub fn exception(&self, message: impl Into<String>, fields: HashMap<String, Value>) {
        self.emit(LogLevel::Exception, message, fields);
    }

    /// Close every route in registration order, then wait for each consumer
    /// to finish its drain-and-flush. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for route in &self.routes {
            route.close();
        }
        for route in &self.routes {
            route.join();
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.close();
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
