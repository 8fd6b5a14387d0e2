//! Deal documents and the scoring-ready projection stored in the search
//! index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::models::publishing::RankSlot;

/// Deal lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealStatus {
    Pending,
    Active,
    Paused,
    Expired,
    Deleted,
}

/// Deal monetization type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealType {
    Voucher,
    Discount,
    Coupon,
    CardLinked,
}

impl DealType {
    /// Card-linked offers carry no imagery or list price of their own, so
    /// the eligibility filters do not apply to them.
    pub fn is_filter_exempt(self) -> bool {
        matches!(self, DealType::CardLinked)
    }
}

/// How the deal is fulfilled geographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationType {
    NotSpecified,
    Physical,
    Online,
}

/// Geographic point attached to a business location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// ISO 3166-1 alpha-2 country code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Image attached to a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Stock artwork substituted by the ingestion pipeline when the
    /// provider supplied no image.
    #[serde(default)]
    pub placeholder: bool,
}

impl DealImage {
    pub fn meets(&self, width: u32, height: u32) -> bool {
        self.width >= width && self.height >= height
    }
}

/// Business offering the deal, with its physical locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealBusiness {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub locations: Vec<GeoPoint>,
}

/// Observed engagement counters feeding CTR-driven ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DealEngagement {
    pub clicks: u64,
    pub impressions: u64,
}

impl DealEngagement {
    /// Click-through rate; zero when nothing was shown yet.
    pub fn ctr(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.clicks as f64 / self.impressions as f64
        }
    }
}

/// Full deal document as delivered by the indexing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub provider: String,
    pub deal_type: DealType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<f64>,
    #[serde(default)]
    pub images: Vec<DealImage>,
    #[serde(default)]
    pub businesses: Vec<DealBusiness>,
    pub status: DealStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    pub location_type: LocationType,
    /// Editorial quality score in [0, 100] assigned upstream.
    pub static_rank: u8,
    #[serde(default)]
    pub engagement: DealEngagement,
}

impl Deal {
    /// Country of the first business location, if any.
    pub fn primary_country(&self) -> Option<&str> {
        self.businesses
            .iter()
            .flat_map(|business| business.locations.iter())
            .find_map(|location| location.country.as_deref())
    }

    pub fn has_real_image(&self) -> bool {
        self.images.iter().any(|image| !image.placeholder)
    }

    pub fn geo_points(&self) -> Vec<GeoPoint> {
        self.businesses
            .iter()
            .flat_map(|business| business.locations.iter().cloned())
            .collect()
    }
}

/// Per-slot rank byte array, tagged with the publishing version it was
/// computed under. Array length always equals that version's sequence count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotRanks {
    pub publishing_version: u64,
    #[serde(default)]
    pub ranks: Vec<u8>,
}

impl SlotRanks {
    pub fn new(publishing_version: u64, sequence_count: u16) -> Self {
        Self {
            publishing_version,
            ranks: vec![0; sequence_count as usize],
        }
    }

    /// Rank byte at a 1-based sequence; zero outside the array.
    pub fn rank_at(&self, sequence: u16) -> u8 {
        if sequence == 0 {
            return 0;
        }
        self.ranks.get(sequence as usize - 1).copied().unwrap_or(0)
    }
}

/// Anything carrying double-buffered rank bytes the query layer can order by.
pub trait Rankable {
    fn slot_ranks(&self, slot: RankSlot) -> &SlotRanks;
}

/// Reduced, scoring-ready view of a deal as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealProjection {
    pub id: Uuid,
    pub provider: String,
    pub business_ids: Vec<Uuid>,
    pub categories: Vec<String>,
    pub keywords: HashSet<String>,
    pub points: Vec<GeoPoint>,
    /// Spatial tile ids covering the deal's locations, computed by the
    /// tiling pass of the indexing pipeline.
    #[serde(default)]
    pub tile_ids: Vec<u64>,
    pub status: DealStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    slots: [SlotRanks; RankSlot::COUNT],
}

impl DealProjection {
    pub fn from_deal(deal: &Deal, tile_ids: Vec<u64>) -> Self {
        Self {
            id: deal.id,
            provider: deal.provider.clone(),
            business_ids: deal.businesses.iter().map(|business| business.id).collect(),
            categories: deal.categories.clone(),
            keywords: deal.keywords.iter().cloned().collect(),
            points: deal.geo_points(),
            tile_ids,
            status: deal.status,
            starts_at: deal.starts_at,
            ends_at: deal.ends_at,
            slots: [SlotRanks::default(), SlotRanks::default()],
        }
    }

    /// Whether the deal is currently servable: active and inside its
    /// validity window.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        if self.status != DealStatus::Active {
            return false;
        }
        if let Some(starts_at) = self.starts_at {
            if now < starts_at {
                return false;
            }
        }
        if let Some(ends_at) = self.ends_at {
            if now > ends_at {
                return false;
            }
        }
        true
    }

    /// Write one rank byte at a 1-based sequence.
    ///
    /// When the slot currently holds bytes for a different publishing
    /// version, the whole array is re-tagged and zero-filled at the new
    /// version's length before the write. Returns whether the stored state
    /// actually changed, so callers can skip no-op index writes.
    pub fn update_rank(
        &mut self,
        slot: RankSlot,
        publishing_version: u64,
        sequence: u16,
        value: u8,
        sequence_count: u16,
    ) -> bool {
        if sequence == 0 || sequence > sequence_count {
            return false;
        }
        let entry = &mut self.slots[slot.index()];
        let position = sequence as usize - 1;

        if entry.publishing_version != publishing_version
            || entry.ranks.len() != sequence_count as usize
        {
            let mut ranks = vec![0u8; sequence_count as usize];
            ranks[position] = value;
            *entry = SlotRanks {
                publishing_version,
                ranks,
            };
            return true;
        }

        let changed = entry.ranks[position] != value;
        entry.ranks[position] = value;
        changed
    }

    /// Replace a slot's array wholesale. Returns whether anything changed.
    pub fn replace_slot_ranks(&mut self, slot: RankSlot, ranks: SlotRanks) -> bool {
        let entry = &mut self.slots[slot.index()];
        let changed = *entry != ranks;
        *entry = ranks;
        changed
    }
}

impl Rankable for DealProjection {
    fn slot_ranks(&self, slot: RankSlot) -> &SlotRanks {
        &self.slots[slot.index()]
    }
}
