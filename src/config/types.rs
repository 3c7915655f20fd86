//! Configuration type definitions.
//!
//! Pure data, every section optional with defaults:
//!
//! ```yaml
//! render:
//!   chars_per_page: 3000
//!   lang: fr
//! fetch:
//!   timeout_secs: 10
//! store:
//!   url: https://xyz.supabase.co
//!   api_key: ...
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub render: RenderSettings,
    pub fetch: FetchSettings,
    pub codes: CodeSettings,
    /// Hosted database for signatures and attachments.
    pub store: Option<StoreSettings>,
    pub serve: ServeSettings,
    pub dev: DevConfig,
}

// =============================================================================
// Rendering
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Variables holding organization logos.
    pub logo_keys: Vec<String>,
    /// Hosts of the object storage serving logos. A bare URL on one of
    /// these hosts is turned into a logo image.
    pub storage_hosts: Vec<String>,
    /// Variables holding prebuilt HTML, inserted without escaping.
    pub raw_html_keys: Vec<String>,
    /// Content characters per page for the page count estimate.
    pub chars_per_page: usize,
    /// `lang` attribute of the generated document.
    pub lang: String,
    /// Pagination polyfill loaded by the document. Empty disables it.
    pub pagedjs_url: String,
    /// Print `Page n / N` in the running footer.
    pub page_numbers: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            logo_keys: vec![
                "ecole_logo".to_string(),
                "organization_logo".to_string(),
                "organisation_logo".to_string(),
            ],
            storage_hosts: vec!["supabase.co".to_string()],
            raw_html_keys: vec![
                "modules_lignes".to_string(),
                "students_table_rows".to_string(),
            ],
            chars_per_page: 3000,
            lang: "fr".to_string(),
            pagedjs_url: "https://unpkg.com/pagedjs/dist/paged.polyfill.js".to_string(),
            page_numbers: true,
        }
    }
}

// =============================================================================
// Collaborators
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Timeout of one outbound request.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: concat!("formadoc/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Public services rendering QR codes and barcodes from a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeSettings {
    pub qr_base_url: String,
    pub barcode_base_url: String,
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            qr_base_url: "https://api.qrserver.com/v1/create-qr-code/".to_string(),
            barcode_base_url: "https://barcode.tec-it.com/barcode.ashx".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Project URL, without the `/rest/v1` suffix.
    pub url: String,
    pub api_key: String,
    pub signatures_table: String,
    pub attachments_table: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            signatures_table: "document_signatures".to_string(),
            attachments_table: "document_attachments".to_string(),
        }
    }
}

// =============================================================================
// Server and development
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeSettings {
    pub bind: String,
    pub port: u16,
}

impl Default for ServeSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// File watching configuration
    #[serde(default)]
    pub watch: WatchConfig,
    /// Reload the preview in the browser when files change (default: true)
    #[serde(default = "default_live_reload")]
    pub live_reload: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            watch: WatchConfig::default(),
            live_reload: true,
        }
    }
}

fn default_live_reload() -> bool {
    true
}

/// Configuration for file watching during `serve --watch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Use polling-based watcher instead of native file system events.
    /// Useful for network filesystems or Docker volumes.
    #[serde(default)]
    pub poll: bool,
    /// Poll interval in milliseconds (only used if poll=true).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Debounce timeout in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll: false,
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}
