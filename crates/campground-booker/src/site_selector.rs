use crate::booking_types::{Campground, SiteCandidate};

/// Pick at most one site from a probe result.
///
/// Only candidates flagged available are considered. Rules, in order:
/// 1. the first of `preferred_sites` (in the user's order) that is available;
/// 2. the first available site in a preferred section, by section order and
///    then page order;
/// 3. the first available site in page order.
///
/// A rule with no preferences configured is skipped. Rule 3 is skipped when
/// the campground sets `strict_preferences` and has any preference. Ids and
/// section names compare case-insensitively with whitespace collapsed.
pub fn select_site(candidates: &[SiteCandidate], campground: &Campground) -> Option<SiteCandidate> {
    let available: Vec<&SiteCandidate> = candidates.iter().filter(|c| c.available).collect();

    by_preferred_site(&available, &campground.preferred_sites)
        .or_else(|| by_preferred_section(&available, &campground.preferred_sections))
        .or_else(|| {
            let has_preferences = !campground.preferred_sites.is_empty()
                || !campground.preferred_sections.is_empty();
            if campground.strict_preferences && has_preferences {
                None
            } else {
                available.first().copied()
            }
        })
        .cloned()
}

fn by_preferred_site<'a>(
    available: &[&'a SiteCandidate],
    preferred_sites: &[String],
) -> Option<&'a SiteCandidate> {
    preferred_sites.iter().find_map(|preferred| {
        let preferred = normalize(preferred);
        available
            .iter()
            .find(|candidate| normalize(&candidate.site_id) == preferred)
            .copied()
    })
}

fn by_preferred_section<'a>(
    available: &[&'a SiteCandidate],
    preferred_sections: &[String],
) -> Option<&'a SiteCandidate> {
    preferred_sections.iter().find_map(|preferred| {
        let preferred = normalize(preferred);
        available
            .iter()
            .find(|candidate| {
                candidate
                    .section
                    .as_deref()
                    .is_some_and(|section| normalize(section) == preferred)
            })
            .copied()
    })
}

fn normalize(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
