use std::env;
use std::path::PathBuf;

/// Media upload configuration.
///
/// # Environment Variables
///
/// - `MEDIA_ROOT`: Directory uploads are written to (default: `./uploads`)
/// - `MEDIA_BASE_URL`: Public URL prefix for stored files
///   (default: `http://localhost:3000/media`)
/// - `MEDIA_MAX_FILE_SIZE`: Largest accepted file in bytes (default: 5MB)
#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub base_url: String,
    pub max_file_size: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./uploads"),
            base_url: "http://localhost:3000/media".into(),
            max_file_size: 5 * 1024 * 1024,
        }
    }
}

impl MediaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            base_url: env::var("MEDIA_BASE_URL").unwrap_or(defaults.base_url),
            max_file_size: env::var("MEDIA_MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_file_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MediaConfig::default();
        assert_eq!(config.root, PathBuf::from("./uploads"));
        assert_eq!(config.max_file_size, 5_242_880);
    }
}
