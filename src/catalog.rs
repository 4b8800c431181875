//! Stock entity definitions for the back office.
//!
//! Each function returns the definition for one entity type; [`all`] lists
//! them and [`by_name`] looks one up.

use campusdesk_models::{EntityDefinition, MediaFieldSpec, VariantSpec};

fn thumb(width: u32, height: u32) -> VariantSpec {
    VariantSpec::cover("thumb", width, height)
}

pub fn page() -> EntityDefinition {
    EntityDefinition::new("page")
        .slugged_by("title")
        .with_media(MediaFieldSpec::new("banner", 1920, 600))
}

pub fn slider() -> EntityDefinition {
    EntityDefinition::new("slider")
        .with_media(MediaFieldSpec::new("image", 1920, 800).with_variant(thumb(300, 125)))
}

pub fn course() -> EntityDefinition {
    EntityDefinition::new("course").slugged_by("title").with_media(
        MediaFieldSpec::new("image", 1200, 800)
            .with_variant(thumb(300, 200))
            .with_variant(VariantSpec::contain("medium", 600, 400)),
    )
}

pub fn gallery() -> EntityDefinition {
    EntityDefinition::new("gallery").slugged_by("title").with_media(
        MediaFieldSpec::new("image", 1600, 1200)
            .with_variant(thumb(300, 300))
            .with_variant(VariantSpec::contain("medium", 800, 600))
            .with_variant(VariantSpec::contain("large", 1280, 960)),
    )
}

pub fn news() -> EntityDefinition {
    EntityDefinition::new("news")
        .slugged_by("title")
        .with_media(MediaFieldSpec::new("image", 1200, 800).with_variant(thumb(400, 300)))
}

pub fn event() -> EntityDefinition {
    EntityDefinition::new("event")
        .slugged_by("title")
        .with_media(MediaFieldSpec::new("image", 1200, 800).with_variant(thumb(400, 300)))
}

pub fn notice() -> EntityDefinition {
    EntityDefinition::new("notice")
        .slugged_by("title")
        .with_media(MediaFieldSpec::new("attachment", 2000, 2000))
}

pub fn faq() -> EntityDefinition {
    EntityDefinition::new("faq")
}

pub fn fee() -> EntityDefinition {
    EntityDefinition::new("fee").slugged_by("name")
}

pub fn hostel() -> EntityDefinition {
    EntityDefinition::new("hostel")
        .slugged_by("name")
        .with_media(MediaFieldSpec::new("image", 1200, 800).with_variant(thumb(300, 200)))
}

pub fn testimonial() -> EntityDefinition {
    EntityDefinition::new("testimonial")
        .with_media(MediaFieldSpec::new("photo", 400, 400).with_variant(thumb(100, 100)))
}

pub fn download() -> EntityDefinition {
    EntityDefinition::new("download")
        .slugged_by("title")
        .with_media(MediaFieldSpec::new("file", 4096, 4096))
}

pub fn all() -> Vec<EntityDefinition> {
    vec![
        page(),
        slider(),
        course(),
        gallery(),
        news(),
        event(),
        notice(),
        faq(),
        fee(),
        hostel(),
        testimonial(),
        download(),
    ]
}

pub fn by_name(name: &str) -> Option<EntityDefinition> {
    all().into_iter().find(|def| def.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_and_namespaces_are_unique() {
        let defs = all();
        let names: HashSet<_> = defs.iter().map(|d| d.name.as_str()).collect();
        let namespaces: HashSet<_> = defs.iter().map(|d| d.namespace.as_str()).collect();
        assert_eq!(names.len(), defs.len());
        assert_eq!(namespaces.len(), defs.len());
    }

    #[test]
    fn test_variant_names_are_storage_safe() {
        for def in all() {
            for field in &def.media_fields {
                for variant in &field.variants {
                    assert!(
                        variant
                            .name
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '_'),
                        "{}.{} variant {:?}",
                        def.name,
                        field.name,
                        variant.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("course").map(|d| d.uses_slug()), Some(true));
        assert_eq!(by_name("faq").map(|d| d.uses_slug()), Some(false));
        assert!(by_name("timetable").is_none());
    }
}
