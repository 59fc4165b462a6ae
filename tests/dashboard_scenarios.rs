use district_pulse::controller::{Controller, Dataset, DatasetView, Publisher};
use district_pulse::engine::{aggregate, MIN_TARGET_VIEWS, TARGET_VIEWS_PER_POST};
use district_pulse::ingest::{read_csv, sample_table, Origin};
use district_pulse::normalize::normalize;
use district_pulse::resolver::district_code;
use district_pulse::types::{
    AggregateResult, FilterSelection, FilterUpdate, MetricRecord, Platform, Tier, ALL,
};

const WIDE_HEADER: &str = "Timestamp,District,Month,\
Facebook - Total Posts,Facebook - Total Interactions,Facebook - Total Views,Facebook - Followers Gained,\
Instagram - Total Posts,Instagram - Total Interactions,Instagram - Total Views,Instagram - Followers Gained,\
YouTube - Total Posts,YouTube - Total Interactions,YouTube - Total Views,YouTube - Followers Gained,\
WhatsApp - Total Posts,WhatsApp - Total Interactions,WhatsApp - Total Views,WhatsApp - Followers Gained";

fn wide(rows: &[&str]) -> Vec<MetricRecord> {
    let mut text = format!("{}\n", WIDE_HEADER);
    for r in rows {
        text.push_str(r);
        text.push('\n');
    }
    let table = read_csv(text.as_bytes()).unwrap();
    normalize(&table).0
}

#[test]
fn kochi_single_row_scenario() {
    let records = wide(&["2024-05-01,Kochi,May,10,200,1000,0,0,0,0,0,0,0,0,0,0,0,0,0"]);
    assert_eq!(records.len(), 4);

    let fb = records.iter().find(|r| r.platform == Platform::Facebook).unwrap();
    assert_eq!(fb.engagement_rate(), 20.0);
    for r in records.iter().filter(|r| r.platform != Platform::Facebook) {
        assert!(r.is_all_zero());
        assert_eq!(r.engagement_rate(), 0.0);
    }

    let result = aggregate(&records, &FilterSelection::new(ALL, ALL, "Facebook"));
    assert_eq!(result.total_posts, 10);
    assert_eq!(result.total_views, 1000);
    let perf = &result.platforms[0];
    assert_eq!(perf.platform, Platform::Facebook);
    assert_eq!(perf.target_views, 10 * TARGET_VIEWS_PER_POST);
    assert_eq!(perf.percentage, 4.0);
    assert_eq!(perf.tier, Tier::NeedsImprovement);
}

#[test]
fn repeated_column_resolves_to_the_first() {
    let data = "District,Month,Facebook - Total Views,Facebook - Total Views\nA,B,1,2\n";
    let (records, _) = normalize(&read_csv(data.as_bytes()).unwrap());
    let fb = records.iter().find(|r| r.platform == Platform::Facebook).unwrap();
    assert_eq!(fb.total_views(), 1);
}

#[test]
fn huge_cell_does_not_break_aggregation() {
    let records = wide(&[
        "2024-05-01,Kochi,May,1,1,99999999999999999999999,0,0,0,0,0,0,0,0,0,0,0,0,0",
        "2024-06-01,Kochi,June,1,1,5,0,0,0,0,0,0,0,0,0,0,0,0,0",
    ]);
    let result = aggregate(&records, &FilterSelection::default());
    assert_eq!(result.total_views, u64::MAX);
    assert!(result.platforms[0].percentage <= 100.0);
}

#[test]
fn empty_dataset_scenario() {
    let result = aggregate(&[], &FilterSelection::default());
    assert_eq!(
        (result.total_posts, result.total_interactions, result.total_views, result.followers_gained),
        (0, 0, 0, 0)
    );
    assert_eq!(result.platforms.len(), 4);
    for (perf, platform) in result.platforms.iter().zip(Platform::ALL) {
        assert_eq!(perf.platform, platform);
        assert_eq!(perf.actual_views, 0);
        assert_eq!(perf.target_views, MIN_TARGET_VIEWS);
        assert_eq!(perf.percentage, 0.0);
        assert_eq!(perf.tier, Tier::NeedsImprovement);
    }
}

#[test]
fn filter_to_nothing_is_a_clean_zero_result() {
    let records = wide(&["2024-05-01,Kochi,May,10,200,1000,0,0,0,0,0,0,0,0,0,0,0,0,0"]);
    let result = aggregate(&records, &FilterSelection::new("Goa", ALL, ALL));
    assert_eq!(result, aggregate(&[], &FilterSelection::default()));
}

#[test]
fn sample_dataset_holds_record_invariants() {
    let table = sample_table();
    let (records, report) = normalize(&table);

    // Fan-out: four records per wide row.
    assert_eq!(records.len(), 4 * table.rows.len());
    assert!(report.warnings.is_empty());

    for r in &records {
        if r.total_views() == 0 {
            assert_eq!(r.engagement_rate(), 0.0);
        } else {
            let expected = r.total_interactions() as f64 / r.total_views() as f64 * 100.0;
            assert!((r.engagement_rate() - expected).abs() < 1e-9);
        }
    }

    let all = aggregate(&records, &FilterSelection::default());
    assert_eq!(all.total_posts, records.iter().map(|r| r.total_posts).sum::<u64>());
    assert_eq!(all.total_interactions, records.iter().map(|r| r.total_interactions()).sum::<u64>());
    assert_eq!(all.total_views, records.iter().map(|r| r.total_views()).sum::<u64>());
    assert_eq!(all.followers_gained, records.iter().map(|r| r.followers_gained).sum::<u64>());
}

#[test]
fn percentage_never_reaches_past_target() {
    let (records, _) = normalize(&sample_table());
    let months = ["All", "January", "March", "June"];
    let districts = ["All", "Kozhikode", "Palakkad"];
    for m in months {
        for d in districts {
            let result = aggregate(&records, &FilterSelection::new(d, m, ALL));
            for p in &result.platforms {
                assert!(p.percentage <= 100.0);
                if p.actual_views == 0 {
                    assert!(p.target_views >= MIN_TARGET_VIEWS);
                } else {
                    assert!(p.target_views > p.actual_views);
                }
            }
        }
    }
}

#[test]
fn district_codes_from_data() {
    assert_eq!(district_code("Kozhikode North"), "KN");
    assert_eq!(district_code("Goa"), "GOA");
    assert_eq!(district_code("Thrissur"), "THR");
}

#[derive(Default)]
struct Log {
    results: Vec<AggregateResult>,
    views: Vec<DatasetView>,
}

impl Publisher for Log {
    fn publish_result(&mut self, _: &FilterSelection, _: &Dataset, result: &AggregateResult) {
        self.results.push(result.clone());
    }
    fn publish_dataset(&mut self, view: &DatasetView) {
        self.views.push(view.clone());
    }
    fn publish_status(&mut self, _: &str) {}
}

#[test]
fn controller_recomputes_on_dataset_and_filter_changes() {
    let mut c = Controller::new(Log::default());
    let records = wide(&[
        "2024-05-01,Kochi,May,10,200,1000,0,0,0,0,0,0,0,0,0,0,0,0,0",
        "2024-06-01,Goa,June,1,0,3000,0,0,0,0,0,0,0,0,0,0,0,0,0",
    ]);
    c.replace_dataset(records, Origin::Primary);
    assert!(c.pump());
    c.select(FilterUpdate::district("Goa"));
    assert!(c.pump());

    let log = c.publisher();
    assert_eq!(log.views.len(), 1);
    assert_eq!(log.views[0].district_options, vec!["All", "Kochi", "Goa"]);
    assert_eq!(
        log.views[0].platform_options,
        vec!["All", "Facebook", "Instagram", "YouTube", "WhatsApp"]
    );
    assert_eq!(log.results.len(), 2);
    let goa = &log.results[1].platforms[0];
    // 3000 views beat the 2500 target, so the target moves to 4000.
    assert_eq!(goa.target_views, 4000);
    assert_eq!(goa.percentage, 75.0);
    assert_eq!(goa.tier, Tier::Good);
}
