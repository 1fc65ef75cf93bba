//! Image retention rules.

use super::{DecisionSet, Reason, Verdict};
use crate::inventory::ImageSnapshot;
use dw_common::{ImageId, ImageRecord};
use dw_config::RetentionPolicy;

/// Repository part of a `repo:tag` label.
///
/// The tag separator is the last `:` not followed by a `/`, so a registry
/// port stays in the repository (`registry:5000/app:v1` → `registry:5000/app`).
/// A digest suffix (`@sha256:...`) is ignored.
pub fn repository(label: &str) -> &str {
    let name = label.split('@').next().unwrap_or(label);
    match name.rfind(':') {
        Some(pos) if !name[pos + 1..].contains('/') => &name[..pos],
        _ => name,
    }
}

/// Everything before the first `:` of a label.
pub fn first_colon_prefix(label: &str) -> &str {
    label.split(':').next().unwrap_or(label)
}

/// Whether keep-list `entry` protects an image carrying `label`.
///
/// Matches the full label, the text before its first `:` or its
/// registry-aware repository. For `registry:5000/app:v1` that means
/// `registry:5000/app:v1`, `registry` and `registry:5000/app` all protect.
pub fn entry_protects(entry: &str, label: &str) -> bool {
    entry == label || entry == first_colon_prefix(label) || entry == repository(label)
}

/// First keep-list entry protecting `image`, if any.
pub fn keep_list_match<'p>(image: &ImageRecord, keep: &'p [String]) -> Option<&'p str> {
    image.tags().find_map(|label| {
        keep.iter()
            .find(|entry| entry_protects(entry, label))
            .map(String::as_str)
    })
}

/// Decide every image in `snapshot` against `policy` at `now`.
pub fn evaluate_images(
    snapshot: &ImageSnapshot,
    policy: &RetentionPolicy,
    now: i64,
) -> DecisionSet<ImageId> {
    let lifetime = policy.image_lifetime();
    let index = snapshot.index();
    let mut decisions = DecisionSet::new();

    for image in snapshot.images() {
        let mut verdict = match image.created_at {
            Some(created) => {
                let age_secs = now.saturating_sub(created);
                if now > created.saturating_add(lifetime) {
                    Verdict::remove(Reason::Expired { age_secs })
                } else {
                    Verdict::keep(Reason::WithinLifetime { age_secs })
                }
            }
            None => Verdict::keep(Reason::AgeUnknown),
        };

        let children = index.child_count(&image.id);
        if children > 0 {
            verdict = Verdict::keep(Reason::ParentOfOther { children });
        }

        if let Some(entry) = keep_list_match(image, &policy.keep_images) {
            verdict = Verdict::keep(Reason::KeepListed {
                entry: entry.to_string(),
            });
        }

        let containers = index.container_count(&image.id);
        if containers > 0 {
            verdict = Verdict::keep(Reason::InUse { containers });
        }

        decisions.insert(image.id.clone(), verdict);
    }
    decisions
}
