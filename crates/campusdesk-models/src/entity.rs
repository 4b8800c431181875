//! Entity type definitions: what a lifecycle manager needs to know about
//! the type it manages.

use serde::{Deserialize, Serialize};

/// Maximum dimensions an image is scaled down to fit within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl Bounds {
    pub const fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Scale down to fit inside the box, keeping the aspect ratio.
    #[default]
    Contain,
    /// Scale and centre-crop to fill the box exactly.
    Cover,
}

impl FitMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contain => "contain",
            Self::Cover => "cover",
        }
    }
}

/// A named resized derivative of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantSpec {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub fit: FitMode,
}

impl VariantSpec {
    pub fn contain(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            fit: FitMode::Contain,
        }
    }

    pub fn cover(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            fit: FitMode::Cover,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFieldSpec {
    pub name: String,
    pub bounds: Bounds,
    #[serde(default)]
    pub variants: Vec<VariantSpec>,
}

impl MediaFieldSpec {
    pub fn new(name: impl Into<String>, max_width: u32, max_height: u32) -> Self {
        Self {
            name: name.into(),
            bounds: Bounds::new(max_width, max_height),
            variants: Vec::new(),
        }
    }

    pub fn with_variant(mut self, variant: VariantSpec) -> Self {
        self.variants.push(variant);
        self
    }
}

/// Describes one entity type (course, slider, faq, ...).
///
/// # Example
///
/// ```ignore
/// let course = EntityDefinition::new("course")
///     .slugged_by("title")
///     .with_media(MediaFieldSpec::new("image", 1200, 800)
///         .with_variant(VariantSpec::cover("thumb", 300, 200)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    /// Media store bucket; defaults to the entity name.
    pub namespace: String,
    /// Field the slug is derived from. `None` for types without slugs.
    pub slug_source: Option<String>,
    #[serde(default)]
    pub media_fields: Vec<MediaFieldSpec>,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            namespace: name.clone(),
            name,
            slug_source: None,
            media_fields: Vec::new(),
        }
    }

    pub fn slugged_by(mut self, field: impl Into<String>) -> Self {
        self.slug_source = Some(field.into());
        self
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_media(mut self, field: MediaFieldSpec) -> Self {
        self.media_fields.push(field);
        self
    }

    pub fn uses_slug(&self) -> bool {
        self.slug_source.is_some()
    }

    pub fn media_field(&self, name: &str) -> Option<&MediaFieldSpec> {
        self.media_fields.iter().find(|f| f.name == name)
    }
}
