//! Filter-and-aggregate engine behind a district social-media dashboard.
//!
//! Data flows one way: [`ingest`] fetches a wide sheet, [`normalize`] turns
//! it into long-format [`types::MetricRecord`]s, [`resolver`] derives district
//! codes, [`engine`] filters and aggregates, and [`controller`] decides when
//! to recompute and hands results to a [`controller::Publisher`].

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod normalize;
pub mod output;
pub mod resolver;
pub mod types;
pub mod util;
