use chrono::Utc;
use std::collections::BTreeMap;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use deal_ranking_service::models::allocation::TrafficAllocation;
use deal_ranking_service::models::client::{ClientApp, ClientId};
use deal_ranking_service::models::deal::{
    DealBusiness, DealEngagement, DealImage, DealStatus, DealType, GeoPoint, LocationType,
};
use deal_ranking_service::models::flight::Flight;
use deal_ranking_service::models::placement::{ClientFlightPlacement, PlacementRules};
use deal_ranking_service::models::publishing::PublishingVersion;
use deal_ranking_service::models::ranking_group::{RankingGroup, RankingGroupRef, RankingRules};
use deal_ranking_service::{
    Deal, DealProjection, DealRankingService, QueryFilters, RankSlot, RankingConfigDocument,
    RegistrySnapshot, SharedRegistry,
};

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init();
}

/// Complete configuration: all Skype traffic in the Promo flight (which
/// requires a 30% discount), everyone else on Default.
fn config_json() -> String {
    let document = RankingConfigDocument {
        clients: {
            let mut clients = deal_ranking_service::models::client::ClientMappings::default();
            clients.id_values.insert("skype".into(), ClientId::Skype);
            clients.id_values.insert("bing".into(), ClientId::Bing);
            clients.app_values.insert("android".into(), ClientApp::Android);
            clients.app_values.insert("web".into(), ClientApp::Web);
            clients
        },
        flights: vec![
            Flight {
                id: "Default".into(),
                version: 1,
                external_id: None,
                description: None,
            },
            Flight {
                id: "Promo".into(),
                version: 1,
                external_id: Some("exp-2210".into()),
                description: Some("Discount pushers".into()),
            },
        ],
        allocations: vec![TrafficAllocation {
            client_id: "Skype".into(),
            client_app: "*".into(),
            flight_id: "Promo".into(),
            flight_version: 1,
            allocation_version: 1,
            publishing_version: Some(1),
            percent: 100,
            active_from: None,
            active_until: None,
            reseed_interval_secs: None,
        }],
        placements: vec![
            ClientFlightPlacement {
                client_id: "Skype".into(),
                client_app: "*".into(),
                flight_id: "Promo".into(),
                flight_version: 1,
                placement: "Default".into(),
                position: 0,
                rules: PlacementRules {
                    ranking_group: RankingGroupRef::new("PromoDeals", 1),
                    feature_deal_count: None,
                    randomization_window: None,
                    fallback_to_broader_results: false,
                    default_deals_count: Some(30),
                },
            },
            ClientFlightPlacement {
                client_id: "*".into(),
                client_app: "*".into(),
                flight_id: "Default".into(),
                flight_version: 1,
                placement: "Default".into(),
                position: 0,
                rules: PlacementRules {
                    ranking_group: RankingGroupRef::new("General", 1),
                    feature_deal_count: None,
                    randomization_window: None,
                    fallback_to_broader_results: true,
                    default_deals_count: None,
                },
            },
        ],
        ranking_groups: vec![
            RankingGroup {
                id: "General".into(),
                version: 1,
                rules: RankingRules::default(),
            },
            RankingGroup {
                id: "PromoDeals".into(),
                version: 1,
                rules: RankingRules {
                    min_discount: Some(30.0),
                    ..RankingRules::default()
                },
            },
        ],
        publishing_versions: vec![PublishingVersion {
            version: 12,
            slot: Some(RankSlot::Slot1),
            sequences: BTreeMap::from([
                (1u16, RankingGroupRef::new("General", 1)),
                (2u16, RankingGroupRef::new("PromoDeals", 1)),
            ]),
            created_at: Utc::now(),
            replicas_completed_at: Some(Utc::now()),
            retired_at: None,
        }],
    };
    document.to_json().unwrap()
}

fn deal(title: &str, static_rank: u8, discount: Option<f64>) -> Deal {
    Deal {
        id: Uuid::new_v4(),
        provider: "GrabOne".into(),
        deal_type: DealType::Voucher,
        title: title.into(),
        description: "A tidy little offer".into(),
        categories: vec!["Restaurants".into()],
        keywords: vec!["dinner".into()],
        price: Some(19.0),
        discount_percent: discount,
        images: vec![DealImage {
            url: "https://img.example/deal.jpg".into(),
            width: 200,
            height: 200,
            placeholder: false,
        }],
        businesses: vec![DealBusiness {
            id: Uuid::new_v4(),
            name: "Harbour Kitchen".into(),
            locations: vec![GeoPoint {
                latitude: -36.84,
                longitude: 174.76,
                country: Some("NZ".into()),
            }],
        }],
        status: DealStatus::Active,
        starts_at: None,
        ends_at: None,
        location_type: LocationType::Physical,
        static_rank,
        engagement: DealEngagement::default(),
    }
}

fn service_from_config() -> DealRankingService {
    let document = RankingConfigDocument::from_json(&config_json()).unwrap();
    let snapshot = RegistrySnapshot::build(&document).unwrap();
    DealRankingService::new(SharedRegistry::new(snapshot))
}

#[test]
fn test_end_to_end_ranking_flow() {
    init_tracing();
    let service = service_from_config();

    // Canonicalize the raw caller token.
    let client = service.resolve_client("Skype_Android (Linux; U)", true);
    assert_eq!(client.id, ClientId::Skype);
    assert_eq!(client.app, ClientApp::Android);

    // Resolve the context: Skype is fully allocated to the Promo flight.
    let filters = QueryFilters {
        query_text: Some("dinner".into()),
        ..QueryFilters::default()
    };
    let context = service
        .resolve(&client, Some("user-314"), &filters, &[], false)
        .unwrap()
        .unwrap();
    assert_eq!(context.flight_key, "Promo_1");
    assert_eq!(context.publishing_version, 12);
    assert_eq!(context.slot, RankSlot::Slot1);
    assert_eq!(context.default_sequence, 2);
    assert_eq!(context.default_deals_count, Some(30));

    // Index three candidates: the scoring pass fills slot 1 for version 12.
    let snapshot = service.registry().load();
    let version = snapshot.publishing.get(12).unwrap();

    let strong = deal("Waterfront dinner cruise", 80, Some(45.0));
    let medium = deal("City lunch special", 50, Some(35.0));
    let shallow = deal("Tiny discount snack", 90, Some(5.0));

    let mut projections: Vec<DealProjection> = [&strong, &medium, &shallow]
        .into_iter()
        .map(|deal| {
            let mut projection = DealProjection::from_deal(deal, Vec::new());
            let changed =
                service
                    .scoring()
                    .refresh_projection(&mut projection, deal, version, &snapshot.groups);
            assert!(changed);
            projection
        })
        .collect();

    // Rank through the context: ordering follows the computed bytes, and
    // the 5% discount deal fails the Promo group's eligibility filter.
    let ranks: Vec<u8> = projections
        .iter()
        .map(|projection| service.rank(projection, &context))
        .collect();
    assert!(ranks[0] > ranks[1]);
    assert_eq!(ranks[2], 0);

    // The General sequence still ranks the short-discount deal.
    assert!(context.rank_at(&projections[2], 1) > 0);

    // A deal scored under an older pass reads as unranked until re-scored.
    let stale_pass = PublishingVersion {
        version: 11,
        ..version.clone()
    };
    let refreshed = service.scoring().refresh_projection(
        &mut projections[0],
        &strong,
        &stale_pass,
        &snapshot.groups,
    );
    assert!(refreshed);
    assert_eq!(service.rank(&projections[0], &context), 0);
}

#[test]
fn test_unmatched_client_ranks_with_the_default_flight() {
    init_tracing();
    let service = service_from_config();

    let client = service.resolve_client("Bing_Web", false);
    assert_eq!(client.id, ClientId::Bing);

    let context = service
        .resolve(&client, Some("user-271"), &QueryFilters::default(), &[], false)
        .unwrap()
        .unwrap();
    assert_eq!(context.flight_key, "Default_1");
    assert_eq!(context.default_sequence, 1);
    assert!(context.fallback_to_broader_results);

    // The General group has no filters, so a plain deal ranks by its
    // adjusted static rank.
    let snapshot = service.registry().load();
    let version = snapshot.publishing.get(12).unwrap();
    let candidate = deal("Quiet monday special", 60, None);
    let mut projection = DealProjection::from_deal(&candidate, Vec::new());
    service
        .scoring()
        .refresh_projection(&mut projection, &candidate, version, &snapshot.groups);

    assert_eq!(service.rank(&projection, &context), 60);
}

#[test]
fn test_assignments_are_stable_for_a_user() {
    init_tracing();
    let service = service_from_config();
    let client = service.resolve_client("Skype_Android", false);
    let filters = QueryFilters::default();

    let first = service
        .resolve(&client, Some("user-99"), &filters, &[], false)
        .unwrap()
        .unwrap();
    for _ in 0..10 {
        let again = service
            .resolve(&client, Some("user-99"), &filters, &[], false)
            .unwrap()
            .unwrap();
        assert_eq!(again.flight_key, first.flight_key);
        assert_eq!(again.default_sequence, first.default_sequence);
    }
}
