use anyhow::{Context, Result};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_RASTER_MAX_PIXELS: u32 = 2048;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    /// Bearer tokens accepted by the authentication gate.
    pub auth_tokens: Vec<String>,
    /// Where unauthenticated requests are redirected (with a `next` parameter).
    pub auth_url: String,
    /// Directory holding the pdfium shared library. System library when unset.
    pub pdfium_library_path: Option<String>,
    /// Longest edge of the rendered preview image, in pixels.
    pub raster_max_pixels: u32,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let auth_tokens = parse_token_list(&require_env("AUTH_TOKENS")?);
        if auth_tokens.is_empty() {
            anyhow::bail!("AUTH_TOKENS must contain at least one token");
        }

        Ok(Config {
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            s3_region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            auth_tokens,
            auth_url: std::env::var("AUTH_URL").unwrap_or_else(|_| "/auth".to_string()),
            pdfium_library_path: std::env::var("PDFIUM_LIBRARY_PATH").ok(),
            raster_max_pixels: check_raster_max_pixels(optional_parsed(
                "RASTER_MAX_PIXELS",
                DEFAULT_RASTER_MAX_PIXELS,
            )?)?,
            max_upload_bytes: optional_parsed("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            port: optional_parsed("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_parsed<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}

/// The renderer takes the edge as an `i32`.
fn check_raster_max_pixels(value: u32) -> Result<u32> {
    if value == 0 || i32::try_from(value).is_err() {
        anyhow::bail!("RASTER_MAX_PIXELS must be between 1 and {}", i32::MAX);
    }
    Ok(value)
}

/// Splits a comma-separated token list, dropping blanks.
fn parse_token_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}
