use chrono::Utc;
use serde_json::json;

/// Logger struct for handling structured logging
#[derive(Clone, Debug)]
pub struct Logger {
    request_id: String,
}

impl Logger {
    /// Create a new Logger instance
    ///
    /// # Arguments
    ///
    /// * `request_id` - A unique identifier for the current request
    pub fn new(request_id: String) -> Self {
        Self { request_id }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Log an info message
    ///
    /// # Arguments
    ///
    /// * `message` - The log message
    /// * `data` - Optional additional data to include in the log
    pub fn info(&self, message: &str, data: Option<serde_json::Value>) {
        self.log("INFO", message, data);
    }

    /// Log a warning message
    pub fn warn(&self, message: &str, data: Option<serde_json::Value>) {
        self.log("WARN", message, data);
    }

    /// Log an error message
    pub fn error(&self, message: &str, data: Option<serde_json::Value>) {
        self.log("ERROR", message, data);
    }

    fn entry(&self, level: &str, message: &str, data: Option<serde_json::Value>) -> serde_json::Value {
        json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "request_id": self.request_id,
            "message": message,
            "data": data
        })
    }

    fn log(&self, level: &str, message: &str, data: Option<serde_json::Value>) {
        let line = self.entry(level, message, data).to_string();

        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                match level {
                    "WARN" => worker::console_warn!("{}", line),
                    "ERROR" => worker::console_error!("{}", line),
                    _ => worker::console_log!("{}", line),
                }
            } else {
                eprintln!("{}", line);
            }
        }
    }
}

/// Macro to create a JSON object for additional log data
///
/// Usage: log_data!("key1" => "value1", "key2" => 42)
#[macro_export]
macro_rules! log_data {
    ($($key:expr => $value:expr),* $(,)?) => {
        Some(serde_json::json!({ $($key: $value),* }))
    };
}
