//! Per-group deal eligibility.
//!
//! Each ranking group may configure a set of filters; a deal failing any of
//! them gets rank byte zero for that group's sequence and nothing else. An
//! unconfigured filter is skipped. Exempt deal types bypass the whole set.

use crate::models::deal::Deal;
use crate::registry::groups::CompiledRankingGroup;

/// Whether a deal may carry a nonzero rank under this group's rules.
pub fn is_eligible(deal: &Deal, group: &CompiledRankingGroup) -> bool {
    if deal.deal_type.is_filter_exempt() {
        return true;
    }
    let rules = &group.group.rules;

    if let Some(size) = rules.min_image_size {
        if !deal.images.iter().any(|image| image.meets(size.width, size.height)) {
            return false;
        }
    }

    if let Some(min_price) = rules.min_price {
        if deal.price.map_or(true, |price| price < min_price) {
            return false;
        }
    }

    if let Some(min_discount) = rules.min_discount {
        if deal.discount_percent.map_or(true, |discount| discount < min_discount) {
            return false;
        }
    }

    if let Some(required) = &rules.required_categories {
        if !required.is_empty() {
            let matched = deal.categories.iter().any(|category| {
                required.iter().any(|wanted| wanted.eq_ignore_ascii_case(category))
            });
            if !matched {
                return false;
            }
        }
    }

    if let Some(keywords) = &rules.required_keywords {
        if !keywords.is_empty() {
            let title = deal.title.to_lowercase();
            let description = deal.description.to_lowercase();
            let matched = keywords.iter().any(|keyword| {
                let keyword = keyword.to_lowercase();
                title.contains(&keyword) || description.contains(&keyword)
            });
            if !matched {
                return false;
            }
        }
    }

    for pattern in &group.blacklist {
        if pattern.is_match(&deal.title) {
            return false;
        }
        if deal.businesses.iter().any(|business| pattern.is_match(&business.name)) {
            return false;
        }
    }

    true
}
