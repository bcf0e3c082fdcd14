use std::path::Path;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use itertools::{Itertools, MinMaxResult};
use log::*;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::chart::SeriesLabelPosition::UpperLeft;
use regex::Regex;

use crate::annotation::{find_nearest_by_time, AnnotationSet};
use crate::error::{SpeedError, SpeedResult};
use crate::parser::{reference_day, ParsedResults};
use crate::series::{Metric, Series, SeriesDescriptor};
use crate::{CAPTION_STYLE_FONT, CAPTION_STYLE_FONT_SIZE, LABELS_STYLE_FONT, LABELS_STYLE_FONT_SIZE, LABEL_AREA_SIZE_BOTTOM, LABEL_AREA_SIZE_LEFT, LABEL_AREA_SIZE_RIGHT, MESH_STYLE_FONT, MESH_STYLE_FONT_SIZE};

const PRIMARY_COLOR: RGBColor = RGBColor(31, 119, 180);
const AUXILIARY_COLORS: [RGBColor; 2] = [RGBColor(255, 127, 14), RGBColor(148, 103, 189)];
const RUNNING_AVERAGE_COLOR: RGBColor = RGBColor(44, 160, 44);
const EXTREMUM_COLOR: RGBColor = RGBColor(214, 39, 40);
const ANNOTATION_LINE_HEIGHT: i32 = 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InteractionMode
{
    Hover,
    Inspect,
}

/// The single annotation that follows the pointer or shows a picked point.
#[derive(Debug, Clone, PartialEq)]
pub struct AdHocAnnotation {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectionState {
    pub mode: InteractionMode,
    pub annotation: Option<AdHocAnnotation>,
    pub last_hovered: Option<usize>,
}

impl Default for InspectionState {
    fn default() -> Self
    {
        Self {
            mode: InteractionMode::Hover,
            annotation: None,
            last_hovered: None,
        }
    }
}

/// Put a line break after every run of three or more periods and turn \r\n into \n.
pub fn format_raw_info(raw: &str) -> String
{
    // constant pattern
    let periods = Regex::new(r"\.{3,}").unwrap();
    let normalized = raw.replace("\r\n", "\n");
    periods.replace_all(&normalized, "$0\n").into_owned()
}

fn render_error<E: std::error::Error + Send + Sync>(error: DrawingAreaErrorKind<E>) -> SpeedError
{
    SpeedError::Render(error.to_string())
}

fn to_utc(timestamp: NaiveDateTime) -> DateTime<Utc>
{
    Utc.from_utc_datetime(&timestamp)
}

/// Draws one primary series with its annotations and two auxiliary series on a shared time axis,
/// and keeps the hover/inspect state of one viewing session.
pub struct ChartEngine {
    title: String,
    results: ParsedResults,
    primary: Series,
    auxiliary: [Series; 2],
    annotations: AnnotationSet,
    state: InspectionState,
}

impl ChartEngine {
    pub fn new(
        results: ParsedResults,
        metric: Metric,
    ) -> SpeedResult<Self>
    {
        let [first, second] = metric.auxiliaries();
        let primary = Series::new(metric.descriptor(&results), &results.timestamps)?;
        let annotations = AnnotationSet::compute(&primary)?;
        let auxiliary = [
            Series::new(first.descriptor(&results), &results.timestamps)?,
            Series::new(second.descriptor(&results), &results.timestamps)?,
        ];
        Ok(Self {
            title: "Internet Speeds".to_string(),
            results,
            primary,
            auxiliary,
            annotations,
            state: InspectionState::default(),
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self
    {
        self.title = title.into();
        self
    }

    /// Make `metric` the primary series; the other two metrics become the auxiliary series.
    pub fn set_primary_series(&mut self, metric: Metric) -> SpeedResult<()>
    {
        let [first, second] = metric.auxiliaries();
        self.set_series(
            metric.descriptor(&self.results),
            [first.descriptor(&self.results), second.descriptor(&self.results)],
        )
    }

    /// Install externally built series.
    /// The descriptors carry no timestamps of their own: value `i` of every descriptor is paired with
    /// timestamp `i` of the loaded results, so each descriptor must hold exactly one value per loaded record.
    /// A length mismatch or an empty primary series is refused and leaves the engine unchanged.
    pub fn set_series(
        &mut self,
        primary: SeriesDescriptor,
        auxiliary: [SeriesDescriptor; 2],
    ) -> SpeedResult<()>
    {
        let primary = Series::new(primary, &self.results.timestamps)?;
        let annotations = AnnotationSet::compute(&primary)?;
        let [first, second] = auxiliary;
        let auxiliary = [
            Series::new(first, &self.results.timestamps)?,
            Series::new(second, &self.results.timestamps)?,
        ];
        debug!("primary series: {}, auxiliary: {}, {}", primary.name(), auxiliary[0].name(), auxiliary[1].name());
        self.primary = primary;
        self.auxiliary = auxiliary;
        self.annotations = annotations;
        self.state = InspectionState::default();
        Ok(())
    }

    pub fn primary(&self) -> &Series
    {
        &self.primary
    }

    pub fn auxiliary(&self) -> &[Series; 2]
    {
        &self.auxiliary
    }

    pub fn annotations(&self) -> &AnnotationSet
    {
        &self.annotations
    }

    pub fn state(&self) -> &InspectionState
    {
        &self.state
    }

    fn hover_text(&self, index: usize) -> Option<String>
    {
        let (timestamp, value) = *self.primary.points().get(index)?;
        Some(format!("{}: {} {}\n{}", self.primary.name(), value, self.primary.unit(), timestamp.format("%Y-%m-%d %H:%M:%S")))
    }

    /// Pointer moved to `at`. Returns true when the hover annotation was replaced.
    pub fn pointer_moved(&mut self, at: NaiveDateTime) -> SpeedResult<bool>
    {
        if self.state.mode == InteractionMode::Inspect { return Ok(false) };

        let index = find_nearest_by_time(&self.primary, at)?;
        if self.state.last_hovered == Some(index) { return Ok(false) };

        self.state.last_hovered = Some(index);
        self.state.annotation = self.hover_text(index).map(|text| AdHocAnnotation { index, text });
        debug!("hover: index {}", index);
        Ok(true)
    }

    /// A plotted point was picked: show its full speed test output.
    /// Returns false for an index outside the series.
    pub fn point_picked(&mut self, index: usize) -> bool
    {
        let Some(raw_info) = self.results.raw_infos.get(index) else { return false };
        if index >= self.primary.len() { return false };

        self.state.mode = InteractionMode::Inspect;
        self.state.annotation = Some(AdHocAnnotation { index, text: format_raw_info(raw_info) });
        debug!("inspect: index {}", index);
        true
    }

    /// The pick was released: back to hovering, without annotation.
    pub fn released(&mut self) -> bool
    {
        if self.state.mode != InteractionMode::Inspect { return false };

        self.state.mode = InteractionMode::Hover;
        self.state.annotation = None;
        self.state.last_hovered = None;
        debug!("inspect released");
        true
    }

    /// Export the chart; the extension picks the backend (.svg, anything else is a bitmap).
    pub fn render(
        &self,
        path: &Path,
        size: (u32, u32),
    ) -> SpeedResult<()>
    {
        let svg = path.extension().map_or(false, |extension| extension.eq_ignore_ascii_case("svg"));
        if svg
        {
            let root = SVGBackend::new(path, size).into_drawing_area();
            self.draw(&root)?;
        }
        else
        {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            self.draw(&root)?;
        }
        info!("chart written to {}", path.display());
        Ok(())
    }

    fn time_range(&self) -> SpeedResult<(DateTime<Utc>, DateTime<Utc>)>
    {
        let (start, end) = match self.primary.timestamps().minmax() {
            MinMaxResult::MinMax(start, end) => (start, end),
            MinMaxResult::OneElement(only) => (only, only),
            MinMaxResult::NoElements => return Err(SpeedError::EmptySeries(self.primary.name().to_string())),
        };
        if start == end { return Ok((to_utc(start - Duration::minutes(1)), to_utc(end + Duration::minutes(1)))) };
        Ok((to_utc(start), to_utc(end)))
    }

    fn high_value<'s>(series: impl Iterator<Item = &'s Series>) -> f64
    {
        let high = series
            .flat_map(|series| series.values())
            .fold(0., f64::max);
        if high > 0. { high * 1.1 } else { 1. }
    }

    pub fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> SpeedResult<()>
    {
        let (start_time, end_time) = self.time_range()?;
        let overlaid = self.primary.timestamps().all(|timestamp| timestamp.date() == reference_day());
        let time_format = if overlaid { "%H:%M:%S" } else { "%Y-%m-%d %H:%M" };

        // auxiliary series with another unit than the primary series go on the right axis
        let on_secondary: Vec<bool> = self.auxiliary.iter().map(|series| series.unit() != self.primary.unit()).collect();
        let primary_axis_series = std::iter::once(&self.primary)
            .chain(self.auxiliary.iter().zip(&on_secondary).filter(|(_, secondary)| !**secondary).map(|(series, _)| series));
        let high_value = Self::high_value(primary_axis_series);
        let secondary_series: Vec<&Series> = self.auxiliary.iter().zip(&on_secondary).filter(|(_, secondary)| **secondary).map(|(series, _)| series).collect();
        let high_value_secondary = Self::high_value(secondary_series.iter().copied());
        let secondary_unit = secondary_series.first().map(|series| series.unit()).unwrap_or(self.primary.unit());

        root.fill(&WHITE).map_err(render_error)?;
        let mut contextarea = ChartBuilder::on(root)
            .set_label_area_size(LabelAreaPosition::Left, LABEL_AREA_SIZE_LEFT)
            .set_label_area_size(LabelAreaPosition::Bottom, LABEL_AREA_SIZE_BOTTOM)
            .set_label_area_size(LabelAreaPosition::Right, LABEL_AREA_SIZE_RIGHT)
            .caption(format!("{}: {}", self.title, self.primary.name()), (CAPTION_STYLE_FONT, CAPTION_STYLE_FONT_SIZE))
            .build_cartesian_2d(start_time..end_time, 0f64..high_value)
            .map_err(render_error)?
            .set_secondary_coord(start_time..end_time, 0f64..high_value_secondary);
        contextarea.configure_mesh()
            .x_labels(4)
            .x_label_formatter(&|x| x.format(time_format).to_string())
            .x_desc(if overlaid { "Time of day" } else { "Date Time" })
            .y_desc(self.primary.unit())
            .label_style((MESH_STYLE_FONT, MESH_STYLE_FONT_SIZE))
            .draw()
            .map_err(render_error)?;
        contextarea.configure_secondary_axes()
            .y_desc(secondary_unit)
            .label_style((MESH_STYLE_FONT, MESH_STYLE_FONT_SIZE))
            .draw()
            .map_err(render_error)?;

        // auxiliary series first, so the primary series is drawn on top
        for ((series, secondary), color) in self.auxiliary.iter().zip(&on_secondary).zip(AUXILIARY_COLORS)
        {
            let line = LineSeries::new(series.points().iter().map(|(timestamp, value)| (to_utc(*timestamp), *value)), color.mix(0.6).stroke_width(1));
            let label = format!("{:10} ({})", series.name(), series.unit());
            let anno = if *secondary { contextarea.draw_secondary_series(line) } else { contextarea.draw_series(line) };
            anno.map_err(render_error)?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }

        let annotations = &self.annotations;
        contextarea.draw_series(LineSeries::new(self.primary.points().iter().map(|(timestamp, value)| (to_utc(*timestamp), *value)), PRIMARY_COLOR.stroke_width(2)))
            .map_err(render_error)?
            .label(format!("{:10} min: {:10.2}, max: {:10.2}", self.primary.name(), annotations.min.1, annotations.max.1))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], PRIMARY_COLOR.stroke_width(2)));
        contextarea.draw_series(self.primary.points().iter().map(|(timestamp, value)| Circle::new((to_utc(*timestamp), *value), 3, PRIMARY_COLOR.mix(0.5).filled())))
            .map_err(render_error)?;

        contextarea.draw_series(LineSeries::new(vec![(start_time, annotations.mean), (end_time, annotations.mean)], BLACK.mix(0.6).stroke_width(1)))
            .map_err(render_error)?
            .label(format!("{:10} {:10.2}", "mean", annotations.mean))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.mix(0.6).stroke_width(1)));
        contextarea.draw_series(LineSeries::new(self.primary.timestamps().zip(annotations.running_average.iter()).map(|(timestamp, value)| (to_utc(timestamp), *value)), RUNNING_AVERAGE_COLOR.stroke_width(1)))
            .map_err(render_error)?
            .label("running average")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RUNNING_AVERAGE_COLOR.stroke_width(1)));

        // the median index counts from the shortened series, so it can sit one point early
        let markers = [("max", annotations.max), ("min", annotations.min), ("median", annotations.median)];
        for (name, (index, value)) in markers
        {
            let Some(timestamp) = self.primary.timestamp(index) else { continue };
            contextarea.draw_series(std::iter::once(
                EmptyElement::at((to_utc(timestamp), value))
                    + TriangleMarker::new((0, 0), 6, EXTREMUM_COLOR.filled())
                    + Text::new(format!("{} {:.2}", name, value), (8, -8), (LABELS_STYLE_FONT, LABELS_STYLE_FONT_SIZE).into_font()),
            ))
                .map_err(render_error)?;
        }

        if let Some(annotation) = &self.state.annotation
        {
            if let Some((timestamp, value)) = self.primary.points().get(annotation.index)
            {
                let point = (to_utc(*timestamp), *value);
                contextarea.draw_series(std::iter::once(EmptyElement::at(point) + Circle::new((0, 0), 6, BLACK.stroke_width(2))))
                    .map_err(render_error)?;
                contextarea.draw_series(annotation.text.lines().enumerate().map(|(number, line)| {
                    EmptyElement::at(point)
                        + Text::new(line.to_string(), (10, 10 + number as i32 * ANNOTATION_LINE_HEIGHT), (LABELS_STYLE_FONT, LABELS_STYLE_FONT_SIZE).into_font())
                }))
                    .map_err(render_error)?;
            }
        }

        contextarea.configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.7))
            .label_font((LABELS_STYLE_FONT, LABELS_STYLE_FONT_SIZE))
            .position(UpperLeft)
            .draw()
            .map_err(render_error)?;
        root.present().map_err(render_error)?;
        Ok(())
    }
}
