//! Meal Chart Assembly
//!
//! Correlates one meal with the glucose readings and boluses around it.
//!
//! The x axis is whole minutes since the earliest event in the window rather
//! than dates: timestamps are naive local time and Plotly would shift date
//! axes into the browser's timezone. Tick labels are restored through
//! `labelalias`.

mod figure;

pub use figure::{Annotation, Figure, Layout, Line, MinorAxis, Shape, Title, Trace, XAxis, YAxis};

use crate::storage::{GlucoseReading, InsulinDelivery, Meal, StorageResult, Store};
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use std::collections::BTreeMap;

/// Visual parameters of the meal chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartStyle {
    pub meal_color: String,
    pub meal_width: f64,
    pub meal_opacity: f64,
    pub bolus_color: String,
    /// Minor grid spacing in hours
    pub grid_hours: i64,
    /// Major ticks every `grid_step` minor ticks
    pub grid_step: i64,
    pub grid_color: String,
    pub grid_width: f64,
    pub spike_color: String,
    pub spike_dash: String,
    pub spike_thickness: f64,
    pub y_min: i64,
    pub y_max: i64,
    /// Raised y max is rounded up to a multiple of this
    pub y_step: i64,
    pub band_colors: [String; 2],
    pub band_opacity: f64,
    /// Glucose band boundaries in mg/dL
    pub band_stops: Vec<i64>,
    pub y_title: String,
    /// Shift of a bolus drawn at exactly the meal time
    pub bolus_dither: Duration,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            meal_color: "purple".to_string(),
            meal_width: 4.0,
            meal_opacity: 0.7,
            bolus_color: "red".to_string(),
            grid_hours: 1,
            grid_step: 2,
            grid_color: "white".to_string(),
            grid_width: 2.0,
            spike_color: "black".to_string(),
            spike_dash: "dot".to_string(),
            spike_thickness: 2.0,
            y_min: 40,
            y_max: 250,
            y_step: 50,
            band_colors: ["white".to_string(), "gray".to_string()],
            band_opacity: 0.2,
            band_stops: vec![0, 70, 90, 140, 180, 200],
            y_title: "EGV (mg/dL)".to_string(),
            bolus_dither: Duration::seconds(90),
        }
    }
}

/// Chart title, e.g. `Mon, Jan. 8, 2024, 7:05 p.m.`
pub fn format_title(dt: NaiveDateTime) -> String {
    let (is_pm, hour) = dt.hour12();
    format!(
        "{}, {}. {}, {}, {}:{:02} {}",
        dt.format("%a"),
        dt.format("%b"),
        dt.day(),
        dt.year(),
        hour,
        dt.minute(),
        if is_pm { "p.m." } else { "a.m." }
    )
}

/// Axis label, zero-padded 12-hour clock
pub fn format_tick(dt: NaiveDateTime) -> String {
    dt.format("%I:%M").to_string()
}

fn minutes_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

/// Build the chart for `meal` from the events in its window.
///
/// Returns `None` when there are no glucose readings.
pub fn build(
    meal: &Meal,
    glucose: &[GlucoseReading],
    insulin: &[InsulinDelivery],
    style: &ChartStyle,
) -> Option<Figure> {
    let max_value = glucose.iter().map(|r| r.value).max()?;
    let t0 = glucose
        .iter()
        .map(|r| r.timestamp)
        .chain(insulin.iter().map(|r| r.timestamp))
        .min()?;

    let xs: Vec<i64> = glucose
        .iter()
        .map(|r| (r.timestamp - t0).num_minutes())
        .collect();
    let ys: Vec<i64> = glucose.iter().map(|r| r.value).collect();

    let mut shapes = Vec::new();
    let mut annotations = Vec::new();

    if !meal.approximate {
        shapes.push(Shape::vline(
            minutes_between(t0, meal.timestamp),
            &style.meal_color,
            style.meal_width,
            style.meal_opacity,
        ));
    }

    // Line weight proportional to the bolus amount
    for bolus in insulin {
        let mut t = bolus.timestamp;
        if t == meal.timestamp {
            // Right of the meal line, where the label goes
            t += style.bolus_dither;
        }
        let x = minutes_between(t0, t);
        shapes.push(Shape::vline(
            x,
            &style.bolus_color,
            bolus.amount.as_f64().ceil(),
            1.0,
        ));
        annotations.push(Annotation::line_label(x, format!("{:.2} u", bolus.amount.as_f64())));
    }

    let tick0 = minutes_between(t0, meal.timestamp).round_ties_even() as i64;
    let dtick = (style.grid_hours * 60).max(1);

    let mut labelalias = BTreeMap::new();
    for (x, r) in xs.iter().zip(glucose) {
        labelalias.insert(x.to_string(), format_tick(r.timestamp));
    }
    let last_x = xs.iter().copied().max().unwrap_or(0);
    let mut i = tick0.rem_euclid(dtick);
    while i <= last_x {
        let at = meal.timestamp + Duration::minutes(i - tick0);
        labelalias.insert(i.to_string(), format_tick(at));
        i += dtick;
    }

    for (i, pair) in style.band_stops.windows(2).enumerate() {
        shapes.push(Shape::hrect(
            pair[0] as f64,
            pair[1] as f64,
            &style.band_colors[i % 2],
            style.band_opacity,
        ));
    }

    let step = style.y_step.max(1);
    let y_max = if max_value > style.y_max {
        // Ceiling division for positive values
        (max_value + step - 1) / step * step
    } else {
        style.y_max
    };

    let layout = Layout {
        title: Title {
            text: format_title(meal.timestamp),
        },
        hovermode: "x",
        xaxis: XAxis {
            tick0,
            dtick: dtick * style.grid_step,
            gridwidth: style.grid_width,
            gridcolor: style.grid_color.clone(),
            minor: MinorAxis {
                showgrid: true,
                tick0,
                dtick,
                gridwidth: style.grid_width,
                gridcolor: style.grid_color.clone(),
            },
            labelalias,
            showspikes: true,
            spikemode: "across",
            spikethickness: style.spike_thickness,
            spikedash: style.spike_dash.clone(),
            spikecolor: style.spike_color.clone(),
        },
        yaxis: YAxis {
            showgrid: false,
            range: [style.y_min, y_max],
            title: Title {
                text: style.y_title.clone(),
            },
        },
        shapes,
        annotations,
    };

    Some(Figure {
        data: vec![Trace {
            kind: "scatter",
            x: xs,
            y: ys,
            name: "EGV".to_string(),
        }],
        layout,
    })
}

/// Query the meal's window and build its chart
pub fn chart_for_meal(store: &Store, meal: &Meal, style: &ChartStyle) -> StorageResult<Option<Figure>> {
    let Some(window) = meal.window() else {
        return Ok(None);
    };
    let glucose: Vec<GlucoseReading> = store
        .query_range::<GlucoseReading>(window)?
        .into_iter()
        .map(|r| r.record)
        .collect();

    if glucose.is_empty() {
        tracing::debug!(meal_id = meal.id, "No glucose data around meal");
        return Ok(None);
    }

    let insulin: Vec<InsulinDelivery> = store
        .query_range::<InsulinDelivery>(window)?
        .into_iter()
        .map(|r| r.record)
        .collect();

    Ok(build(meal, &glucose, &insulin, style))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Units;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn meal(ts: NaiveDateTime, approximate: bool) -> Meal {
        Meal {
            id: 1,
            dish_id: 1,
            timestamp: ts,
            approximate,
        }
    }

    fn readings(start: NaiveDateTime, values: &[i64]) -> Vec<GlucoseReading> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| GlucoseReading::new(start + Duration::minutes(5 * i as i64), *v))
            .collect()
    }

    fn bolus(ts: NaiveDateTime, hundredths: i64) -> InsulinDelivery {
        InsulinDelivery::new(ts, Units::from_hundredths(hundredths).unwrap())
    }

    #[test]
    fn test_title_format() {
        assert_eq!(format_title(at(19, 5)), "Mon, Jan. 8, 2024, 7:05 p.m.");
        assert_eq!(format_title(at(0, 30)), "Mon, Jan. 8, 2024, 12:30 a.m.");
        assert_eq!(format_title(at(12, 0)), "Mon, Jan. 8, 2024, 12:00 p.m.");
    }

    #[test]
    fn test_tick_format() {
        assert_eq!(format_tick(at(7, 5)), "07:05");
        assert_eq!(format_tick(at(13, 40)), "01:40");
    }

    #[test]
    fn test_no_glucose_no_chart() {
        let m = meal(at(12, 0), false);
        assert!(build(&m, &[], &[bolus(at(12, 0), 300)], &ChartStyle::default()).is_none());
    }

    #[test]
    fn test_axis_origin_is_earliest_event() {
        let m = meal(at(12, 0), false);
        let glucose = readings(at(11, 30), &[100, 105, 110]);
        let insulin = vec![bolus(at(11, 20), 150)];

        let fig = build(&m, &glucose, &insulin, &ChartStyle::default()).unwrap();
        assert_eq!(fig.data[0].x, vec![10, 15, 20]);
        assert_eq!(fig.data[0].y, vec![100, 105, 110]);
        assert_eq!(fig.layout.xaxis.tick0, 40);
        assert_eq!(fig.layout.xaxis.dtick, 120);
        assert_eq!(fig.layout.xaxis.minor.dtick, 60);
    }

    #[test]
    fn test_meal_line_and_bolus_lines() {
        let m = meal(at(12, 0), false);
        let glucose = readings(at(11, 0), &[100, 120]);
        let insulin = vec![bolus(at(12, 0), 425), bolus(at(13, 0), 50)];

        let fig = build(&m, &glucose, &insulin, &ChartStyle::default()).unwrap();
        let lines: Vec<&Shape> = fig.layout.shapes.iter().filter(|s| s.kind == "line").collect();
        assert_eq!(lines.len(), 3);

        assert_eq!(lines[0].x0, 60.0);
        assert_eq!(lines[0].line.color, "purple");
        assert_eq!(lines[0].line.width, 4.0);

        // Same time as the meal: dithered 90 seconds
        assert_eq!(lines[1].x0, 61.5);
        assert_eq!(lines[1].line.width, 5.0);
        assert_eq!(lines[2].x0, 120.0);
        assert_eq!(lines[2].line.width, 1.0);

        let texts: Vec<&str> = fig.layout.annotations.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(texts, vec!["4.25 u", "0.50 u"]);
    }

    #[test]
    fn test_approximate_meal_has_no_meal_line() {
        let m = meal(at(12, 0), true);
        let glucose = readings(at(11, 0), &[100]);
        let fig = build(&m, &glucose, &[], &ChartStyle::default()).unwrap();
        assert!(fig.layout.shapes.iter().all(|s| s.kind != "line"));
    }

    #[test]
    fn test_y_range() {
        let m = meal(at(12, 0), false);
        let style = ChartStyle::default();

        let fig = build(&m, &readings(at(11, 0), &[100, 250]), &[], &style).unwrap();
        assert_eq!(fig.layout.yaxis.range, [40, 250]);

        let fig = build(&m, &readings(at(11, 0), &[100, 251]), &[], &style).unwrap();
        assert_eq!(fig.layout.yaxis.range, [40, 300]);

        let fig = build(&m, &readings(at(11, 0), &[300]), &[], &style).unwrap();
        assert_eq!(fig.layout.yaxis.range, [40, 300]);
    }

    #[test]
    fn test_bands_alternate() {
        let m = meal(at(12, 0), false);
        let fig = build(&m, &readings(at(11, 0), &[100]), &[], &ChartStyle::default()).unwrap();
        let bands: Vec<(f64, f64, String)> = fig
            .layout
            .shapes
            .iter()
            .filter(|s| s.kind == "rect")
            .map(|s| (s.y0, s.y1, s.fillcolor.clone().unwrap()))
            .collect();
        assert_eq!(bands.len(), 5);
        assert_eq!(bands[0], (0.0, 70.0, "white".to_string()));
        assert_eq!(bands[1], (70.0, 90.0, "gray".to_string()));
        assert_eq!(bands[4], (180.0, 200.0, "white".to_string()));
    }

    #[test]
    fn test_label_aliases_include_hourly_ticks() {
        let m = meal(at(12, 0), false);
        // Readings 11:10 .. 14:00 every 5 minutes
        let values = vec![100; 35];
        let glucose = readings(at(11, 10), &values);
        let fig = build(&m, &glucose, &[], &ChartStyle::default()).unwrap();

        let alias = &fig.layout.xaxis.labelalias;
        // tick0 = 50, ticks at 50, 110, 170
        assert_eq!(alias.get("50").map(String::as_str), Some("12:00"));
        assert_eq!(alias.get("110").map(String::as_str), Some("01:00"));
        assert_eq!(alias.get("0").map(String::as_str), Some("11:10"));
        assert_eq!(alias.len(), 35);
    }

    #[test]
    fn test_html_div_embeds_figure() {
        let m = meal(at(12, 0), false);
        let fig = build(&m, &readings(at(11, 0), &[100]), &[], &ChartStyle::default()).unwrap();
        let html = fig.to_html_div().unwrap();
        assert!(html.starts_with("<div id=\"meal-chart-"));
        assert!(html.contains("cdn.plot.ly"));
        assert!(html.contains("Plotly.newPlot"));
        assert!(html.contains("EGV (mg/dL)"));
    }
}
