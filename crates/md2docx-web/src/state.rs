use md2docx_core::Settings;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub settings: Settings,
    /// Converter version line captured by the startup check.
    pub converter_version: String,
}
