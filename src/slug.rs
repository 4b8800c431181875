//! URL slug derivation.
//!
//! Slugs are unique per entity type across active and trashed rows. The
//! generator picks the first free `base`, `base-2`, `base-3`, ... against the
//! slugs visible inside the caller's transaction; the database constraint
//! catches concurrent writers and the manager retries once.

use std::collections::HashSet;

use campusdesk_models::ResourceId;

use crate::repository::{RepositoryError, ResourceTx};

/// Width of the `slug` column.
pub const MAX_SLUG_LEN: usize = 255;

/// Longest base; leaves room for a `-N` suffix with any `u64` counter.
pub const MAX_BASE_LEN: usize = MAX_SLUG_LEN - 21;

/// Lowercases `text`, turns whitespace, `_` and `-` runs into single hyphens
/// and strips everything else outside `[a-z0-9]`.
///
/// # Examples
///
/// ```
/// use campusdesk::slug::slugify;
///
/// assert_eq!(slugify("Annual Day"), "annual-day");
/// assert_eq!(slugify("  Fees & Dues__2025 "), "fees-dues-2025");
/// ```
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_hyphen = true;
        }
    }

    slug
}

/// Slug base for `candidate`, falling back to the entity name when the
/// candidate has nothing sluggable in it. Capped at [`MAX_BASE_LEN`].
pub fn base_slug(candidate: &str, entity: &str) -> String {
    let slug = truncate_base(slugify(candidate));
    if !slug.is_empty() {
        return slug;
    }

    let fallback = truncate_base(slugify(entity));
    if fallback.is_empty() {
        "item".to_string()
    } else {
        fallback
    }
}

fn truncate_base(mut slug: String) -> String {
    // Slugs are ASCII, any byte index is a char boundary
    slug.truncate(MAX_BASE_LEN);
    let trimmed = slug.trim_end_matches('-').len();
    slug.truncate(trimmed);
    slug
}

/// First of `base`, `base-2`, `base-3`, ... not in `taken`.
pub fn first_available<'a>(base: &str, taken: impl IntoIterator<Item = &'a str>) -> String {
    let taken: HashSet<&str> = taken.into_iter().collect();
    if !taken.contains(base) {
        return base.to_string();
    }

    let mut n: u64 = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

/// Slug for `candidate` that no other row of `entity` holds.
///
/// `exclude_id` is the row being updated; its own slug does not count as
/// taken.
pub async fn generate_unique_slug<T>(
    tx: &mut T,
    candidate: &str,
    entity: &str,
    exclude_id: Option<ResourceId>,
) -> Result<String, RepositoryError>
where
    T: ResourceTx + ?Sized,
{
    next_available(tx, candidate, entity, exclude_id, None).await
}

/// Same as [`generate_unique_slug`] after a write lost the race for
/// `collided`. The collided slug stays taken even if the competing row is
/// not yet visible to this transaction.
pub async fn regenerate_after_collision<T>(
    tx: &mut T,
    candidate: &str,
    entity: &str,
    exclude_id: Option<ResourceId>,
    collided: &str,
) -> Result<String, RepositoryError>
where
    T: ResourceTx + ?Sized,
{
    next_available(tx, candidate, entity, exclude_id, Some(collided)).await
}

async fn next_available<T>(
    tx: &mut T,
    candidate: &str,
    entity: &str,
    exclude_id: Option<ResourceId>,
    collided: Option<&str>,
) -> Result<String, RepositoryError>
where
    T: ResourceTx + ?Sized,
{
    let base = base_slug(candidate, entity);
    let existing = tx.slugs_with_prefix(entity, &base).await?;

    let taken = existing
        .iter()
        .filter(|(id, _)| Some(*id) != exclude_id)
        .map(|(_, slug)| slug.as_str())
        .chain(collided);

    Ok(first_available(&base, taken))
}
