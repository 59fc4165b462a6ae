//! Reactive recomputation.
//!
//! The controller is the single owner of the dataset and the filter. Events
//! are queued on a channel; [`Controller::pump`] drains the queue, folds all
//! pending events into the latest dataset + filter, and runs at most one
//! aggregation for the whole batch. Refreshes run on a worker thread and are
//! tagged with a sequence number so a superseded fetch is dropped on arrival.

use crate::engine::{self, options};
use crate::ingest::{Ingestor, Origin};
use crate::normalize::normalize;
use crate::resolver::resolve_districts;
use crate::types::{AggregateResult, DistrictCode, FilterSelection, FilterUpdate, MetricRecord};
use chrono::{DateTime, Utc};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// One immutable generation of records. Replaced wholesale, never edited.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub version: u64,
    pub loaded_at: DateTime<Utc>,
    pub origin: Origin,
    pub records: Vec<MetricRecord>,
}

impl Dataset {
    fn empty() -> Self {
        Dataset {
            version: 0,
            loaded_at: Utc::now(),
            origin: Origin::Empty,
            records: Vec::new(),
        }
    }
}

/// Everything derived from the dataset alone, republished when it changes.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetView {
    pub version: u64,
    pub district_codes: Vec<DistrictCode>,
    pub district_options: Vec<String>,
    pub month_options: Vec<String>,
    pub platform_options: Vec<String>,
}

impl DatasetView {
    fn build(dataset: &Dataset) -> Self {
        let records = &dataset.records;
        DatasetView {
            version: dataset.version,
            district_codes: resolve_districts(records.iter().map(|r| r.district.as_str())),
            district_options: options(records.iter().map(|r| r.district.as_str())),
            month_options: options(records.iter().map(|r| r.month.as_str())),
            platform_options: options(records.iter().map(|r| r.platform.as_str())),
        }
    }
}

/// The presentation side. Implementations render or store what they get.
pub trait Publisher {
    fn publish_result(&mut self, filter: &FilterSelection, dataset: &Dataset, result: &AggregateResult);
    fn publish_dataset(&mut self, view: &DatasetView);
    fn publish_status(&mut self, status: &str);
}

#[derive(Debug)]
pub enum Event {
    DatasetChanged {
        records: Vec<MetricRecord>,
        origin: Origin,
    },
    FilterChanged(FilterUpdate),
    RefreshCompleted {
        seq: u64,
        records: Vec<MetricRecord>,
        origin: Origin,
        status: Option<String>,
    },
}

pub struct Controller<P: Publisher> {
    dataset: Arc<Dataset>,
    filter: FilterSelection,
    publisher: P,
    tx: Sender<Event>,
    rx: Receiver<Event>,
    /// Latest refresh requested; completions with a lower number are stale.
    refresh_seq: u64,
    published_version: Option<u64>,
    last_result: Option<AggregateResult>,
}

impl<P: Publisher> Controller<P> {
    pub fn new(publisher: P) -> Self {
        let (tx, rx) = mpsc::channel();
        Controller {
            dataset: Arc::new(Dataset::empty()),
            filter: FilterSelection::default(),
            publisher,
            tx,
            rx,
            refresh_seq: 0,
            published_version: None,
            last_result: None,
        }
    }

    pub fn dataset(&self) -> Arc<Dataset> {
        Arc::clone(&self.dataset)
    }

    pub fn filter(&self) -> &FilterSelection {
        &self.filter
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn last_result(&self) -> Option<&AggregateResult> {
        self.last_result.as_ref()
    }

    /// Handle for producers on other threads.
    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn submit(&self, event: Event) {
        // The receiver lives in `self`, so the send cannot fail here.
        let _ = self.tx.send(event);
    }

    pub fn select(&self, update: FilterUpdate) {
        self.submit(Event::FilterChanged(update));
    }

    /// Install a dataset directly. Any refresh still in flight is superseded.
    pub fn replace_dataset(&mut self, records: Vec<MetricRecord>, origin: Origin) {
        self.refresh_seq += 1;
        self.submit(Event::DatasetChanged { records, origin });
    }

    /// Start a fetch on a worker thread. Returns its sequence number.
    pub fn request_refresh(&mut self, ingestor: &Ingestor) -> u64 {
        self.refresh_seq += 1;
        let seq = self.refresh_seq;
        let tx = self.tx.clone();
        let ingestor = ingestor.clone();
        tracing::info!(seq, source = ingestor.primary(), "refresh requested");
        thread::spawn(move || {
            let outcome = ingestor.load();
            let (records, _) = normalize(&outcome.table);
            let _ = tx.send(Event::RefreshCompleted {
                seq,
                records,
                origin: outcome.origin,
                status: outcome.status,
            });
        });
        seq
    }

    /// Block until refresh `seq` (or a newer one) completes, folding every
    /// event seen on the way, then recompute once. Returns false on timeout;
    /// whatever did arrive is still applied.
    pub fn wait_for_refresh(&mut self, seq: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = Pending::default();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(event) => {
                    let done = matches!(event, Event::RefreshCompleted { seq: s, .. } if s >= seq);
                    self.fold(&mut pending, event);
                    if done {
                        break;
                    }
                }
                Err(_) => {
                    tracing::warn!(seq, ?timeout, "refresh did not complete in time");
                    self.commit(pending);
                    return false;
                }
            }
        }
        self.drain_into(&mut pending);
        self.commit(pending)
    }

    /// Drain queued events and recompute once if anything changed.
    /// Returns whether a new result was published.
    pub fn pump(&mut self) -> bool {
        let mut pending = Pending::default();
        self.drain_into(&mut pending);
        self.commit(pending)
    }

    fn drain_into(&mut self, pending: &mut Pending) {
        while let Ok(event) = self.rx.try_recv() {
            self.fold(pending, event);
        }
    }

    fn fold(&mut self, pending: &mut Pending, event: Event) {
        match event {
            Event::DatasetChanged { records, origin } => {
                pending.dataset = Some((records, origin));
            }
            Event::FilterChanged(update) => {
                if self.filter.apply(&update) {
                    pending.filter_changed = true;
                }
            }
            Event::RefreshCompleted { seq, records, origin, status } => {
                if seq < self.refresh_seq {
                    tracing::debug!(seq, latest = self.refresh_seq, "dropping superseded refresh");
                    return;
                }
                pending.dataset = Some((records, origin));
                pending.status = status;
            }
        }
    }

    fn commit(&mut self, pending: Pending) -> bool {
        let dataset_changed = pending.dataset.is_some();
        if let Some((records, origin)) = pending.dataset {
            let next = Dataset {
                version: self.dataset.version + 1,
                loaded_at: Utc::now(),
                origin,
                records,
            };
            tracing::info!(version = next.version, records = next.records.len(), %origin, "dataset replaced");
            self.dataset = Arc::new(next);
        }
        if let Some(status) = &pending.status {
            self.publisher.publish_status(status);
        }
        if !dataset_changed && !pending.filter_changed && self.last_result.is_some() {
            return false;
        }

        if self.published_version != Some(self.dataset.version) {
            let view = DatasetView::build(&self.dataset);
            self.publisher.publish_dataset(&view);
            self.published_version = Some(self.dataset.version);
        }

        let result = engine::aggregate(&self.dataset.records, &self.filter);
        tracing::debug!(
            filter = ?self.filter,
            version = self.dataset.version,
            total_views = result.total_views,
            "recomputed"
        );
        self.publisher.publish_result(&self.filter, &self.dataset, &result);
        self.last_result = Some(result);
        true
    }
}

#[derive(Default)]
struct Pending {
    dataset: Option<(Vec<MetricRecord>, Origin)>,
    filter_changed: bool,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Platform, ALL};

    #[derive(Default)]
    struct Recorder {
        results: Vec<(FilterSelection, u64, AggregateResult)>,
        views: Vec<DatasetView>,
        statuses: Vec<String>,
    }

    impl Publisher for Recorder {
        fn publish_result(&mut self, filter: &FilterSelection, dataset: &Dataset, result: &AggregateResult) {
            self.results.push((filter.clone(), dataset.version, result.clone()));
        }
        fn publish_dataset(&mut self, view: &DatasetView) {
            self.views.push(view.clone());
        }
        fn publish_status(&mut self, status: &str) {
            self.statuses.push(status.to_string());
        }
    }

    fn records(views: u64) -> Vec<MetricRecord> {
        vec![
            MetricRecord::new("Kochi".into(), "May".into(), Platform::Facebook, 1, 10, views, 0),
            MetricRecord::new("Goa".into(), "June".into(), Platform::YouTube, 2, 5, 50, 0),
        ]
    }

    #[test]
    fn first_pump_publishes_empty_state() {
        let mut c = Controller::new(Recorder::default());
        assert!(c.pump());
        let p = c.publisher();
        assert_eq!(p.views.len(), 1);
        assert_eq!(p.views[0].month_options, vec![ALL]);
        assert_eq!(p.results[0].2.total_views, 0);
        assert!(!c.pump());
    }

    #[test]
    fn burst_of_events_coalesces_into_one_aggregation() {
        let mut c = Controller::new(Recorder::default());
        c.replace_dataset(records(100), Origin::Primary);
        c.select(FilterUpdate::month("May"));
        c.replace_dataset(records(400), Origin::Primary);
        c.select(FilterUpdate::platform("Facebook"));
        assert!(c.pump());

        let p = c.publisher();
        assert_eq!(p.results.len(), 1);
        let (filter, version, result) = &p.results[0];
        assert_eq!(filter, &FilterSelection::new(ALL, "May", "Facebook"));
        assert_eq!(*version, 1);
        assert_eq!(result.total_views, 400);
        assert_eq!(p.views.len(), 1);
        assert_eq!(p.views[0].month_options, vec!["All", "May", "June"]);
        assert_eq!(p.views[0].district_codes[0].code, "KOC");
    }

    #[test]
    fn filter_change_does_not_rebuild_dataset_view() {
        let mut c = Controller::new(Recorder::default());
        c.replace_dataset(records(100), Origin::Primary);
        c.pump();
        c.select(FilterUpdate::district("Goa"));
        assert!(c.pump());
        // Re-selecting the same value changes nothing.
        c.select(FilterUpdate::district("Goa"));
        assert!(!c.pump());

        let p = c.publisher();
        assert_eq!(p.views.len(), 1);
        assert_eq!(p.results.len(), 2);
        assert_eq!(p.results[1].2.total_posts, 2);
    }

    #[test]
    fn superseded_refresh_is_ignored() {
        let mut c = Controller::new(Recorder::default());
        c.refresh_seq = 2;
        c.submit(Event::RefreshCompleted {
            seq: 1,
            records: records(999),
            origin: Origin::Primary,
            status: Some("stale".into()),
        });
        c.submit(Event::RefreshCompleted {
            seq: 2,
            records: records(100),
            origin: Origin::Sample,
            status: Some("Could not load data".into()),
        });
        c.pump();
        let p = c.publisher();
        assert_eq!(p.statuses, vec!["Could not load data"]);
        assert_eq!(p.results.last().unwrap().2.total_views, 150);
        assert_eq!(c.dataset().origin, Origin::Sample);
    }

    #[test]
    fn manual_dataset_supersedes_in_flight_refresh() {
        let mut c = Controller::new(Recorder::default());
        c.refresh_seq = 1;
        c.replace_dataset(records(100), Origin::Primary);
        c.submit(Event::RefreshCompleted {
            seq: 1,
            records: records(999),
            origin: Origin::Sample,
            status: None,
        });
        c.pump();
        assert_eq!(c.dataset().origin, Origin::Primary);
        assert_eq!(c.last_result().unwrap().total_views, 150);

        // A refresh issued after the replacement still lands.
        c.submit(Event::RefreshCompleted {
            seq: c.refresh_seq,
            records: records(300),
            origin: Origin::Cache,
            status: None,
        });
        assert!(c.pump());
        assert_eq!(c.dataset().origin, Origin::Cache);
        assert_eq!(c.last_result().unwrap().total_views, 350);
    }

    #[test]
    fn worker_refresh_loads_and_normalizes_the_source() {
        use crate::config::SourceConfig;
        crate::logging::init_test();
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("sheet.csv");
        std::fs::write(
            &primary,
            "District,Month,Facebook - Total Posts,Facebook - Total Views\nKochi,May,2,900\n",
        )
        .unwrap();
        let cfg = SourceConfig {
            primary: primary.display().to_string(),
            cache_path: dir.path().join("cache.csv"),
            ..SourceConfig::default()
        };
        let ingestor = Ingestor::from_config(&cfg).unwrap();

        let mut c = Controller::new(Recorder::default());
        let first = c.request_refresh(&ingestor);
        let second = c.request_refresh(&ingestor);
        assert_eq!(second, first + 1);
        assert!(c.wait_for_refresh(second, Duration::from_secs(10)));
        assert_eq!(c.dataset().records.len(), 4);
        assert_eq!(c.dataset().origin, Origin::Primary);
        assert_eq!(c.last_result().unwrap().total_views, 900);
        assert!(c.publisher().statuses.is_empty());
    }

    #[test]
    fn replaced_dataset_leaves_old_snapshot_intact() {
        let mut c = Controller::new(Recorder::default());
        c.replace_dataset(records(100), Origin::Primary);
        c.pump();
        let old = c.dataset();
        c.replace_dataset(Vec::new(), Origin::Empty);
        c.pump();
        assert_eq!(old.records.len(), 2);
        assert_eq!(c.dataset().version, old.version + 1);
        assert!(c.dataset().records.is_empty());
    }
}
