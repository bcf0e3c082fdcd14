pub mod acquisition;
pub mod annotation;
pub mod chart;
pub mod config;
pub mod error;
pub mod filter;
pub mod parser;
pub mod report;
pub mod runner;
pub mod series;
pub mod store;

pub use acquisition::{Measurement, OutputParser, SpeedTester};
pub use annotation::{compute_extremum, compute_mean, compute_median, compute_running_average, find_nearest_by_time, find_nearest_by_value, AnnotationSet, Extremum};
pub use chart::{format_raw_info, AdHocAnnotation, ChartEngine, InspectionState, InteractionMode};
pub use config::Settings;
pub use error::{SpeedError, SpeedResult};
pub use filter::filter_store;
pub use parser::{ParsedResults, ResultParser};
pub use report::{print_summary, print_summary_header};
pub use runner::{parse_period, request_stop, PidFile, Runner};
pub use series::{Metric, Series, SeriesDescriptor};
pub use store::{MeasurementRecord, ResultStore, WIRED_SSID};

pub const LABEL_AREA_SIZE_LEFT: i32 = 100;
pub const LABEL_AREA_SIZE_RIGHT: i32 = 100;
pub const LABEL_AREA_SIZE_BOTTOM: i32 = 50;
pub const CAPTION_STYLE_FONT: &str = "monospace";
pub const CAPTION_STYLE_FONT_SIZE: i32 = 30;
pub const MESH_STYLE_FONT: &str = "monospace";
pub const MESH_STYLE_FONT_SIZE: i32 = 17;
pub const LABELS_STYLE_FONT: &str = "monospace";
pub const LABELS_STYLE_FONT_SIZE: i32 = 15;
