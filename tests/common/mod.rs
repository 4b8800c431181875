use campusdesk::LifecycleManager;
use campusdesk::media::ContentMediaStore;
use campusdesk::repository::MemoryRepository;
use campusdesk_core::LocalFileStorage;
use campusdesk_models::{EntityDefinition, FieldSet, MediaUpload, ResourceInput, UserId};
use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub type TestManager = LifecycleManager<MemoryRepository, ContentMediaStore>;

/// Manager over an in-memory repository and a media store rooted in a
/// temporary directory. The directory lives as long as the context.
#[allow(dead_code)]
pub struct TestContext {
    pub manager: TestManager,
    pub repo: MemoryRepository,
    pub media_root: TempDir,
}

#[allow(dead_code)]
impl TestContext {
    pub fn path_of(&self, stored_name: &str) -> PathBuf {
        self.media_root.path().join(stored_name)
    }

    pub fn stored(&self, stored_name: &str) -> bool {
        self.path_of(stored_name).is_file()
    }

    /// Number of files under the media root, in any namespace.
    pub fn file_count(&self) -> usize {
        fn walk(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|entry| {
                            let path = entry.path();
                            if path.is_dir() { walk(&path) } else { 1 }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        walk(self.media_root.path())
    }
}

#[allow(dead_code)]
pub fn setup(definition: EntityDefinition) -> TestContext {
    let media_root = tempfile::tempdir().unwrap();
    let storage = LocalFileStorage::new(
        media_root.path().to_path_buf(),
        "http://localhost:3000/media".to_string(),
    );
    let repo = MemoryRepository::new();
    let manager = LifecycleManager::new(
        repo.clone(),
        ContentMediaStore::new(Arc::new(storage)),
        definition,
    );

    TestContext {
        manager,
        repo,
        media_root,
    }
}

/// Field set from a JSON object literal.
#[allow(dead_code)]
pub fn fields(value: serde_json::Value) -> FieldSet {
    value.as_object().cloned().expect("fields must be a JSON object")
}

#[allow(dead_code)]
pub fn titled(title: &str) -> ResourceInput {
    ResourceInput::with_fields(fields(serde_json::json!({ "title": title })))
}

#[allow(dead_code)]
pub fn titled_with_upload(title: &str, field: &str, bytes: Vec<u8>) -> ResourceInput {
    titled(title).upload(MediaUpload::new(field, bytes))
}

#[allow(dead_code)]
pub fn actor() -> Option<UserId> {
    Some(UserId::new())
}

/// Solid-colour PNG. Different `shade` values give different fingerprints.
#[allow(dead_code)]
pub fn png(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([shade, 40, 120, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

#[allow(dead_code)]
pub fn image_dimensions(path: &std::path::Path) -> (u32, u32) {
    let img = image::open(path).unwrap();
    (img.width(), img.height())
}
