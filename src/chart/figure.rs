//! Plotly figure JSON
//!
//! Only the subset of the Plotly schema the meal chart uses. Serializes to
//! the `{data, layout}` document `Plotly.newPlot` accepts.

use serde::Serialize;
use std::collections::BTreeMap;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.27.0.min.js";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub x: Vec<i64>,
    pub y: Vec<i64>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub color: String,
    pub width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shape {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub xref: &'static str,
    pub yref: &'static str,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
    pub line: Line,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillcolor: Option<String>,
    pub opacity: f64,
    pub layer: &'static str,
}

impl Shape {
    /// Full-height vertical line at data coordinate `x`
    pub fn vline(x: f64, color: &str, width: f64, opacity: f64) -> Self {
        Self {
            kind: "line",
            xref: "x",
            yref: "paper",
            x0: x,
            x1: x,
            y0: 0.0,
            y1: 1.0,
            line: Line {
                color: color.to_string(),
                width,
                dash: None,
            },
            fillcolor: None,
            opacity,
            layer: "above",
        }
    }

    /// Full-width horizontal band between data coordinates `y0` and `y1`
    pub fn hrect(y0: f64, y1: f64, fillcolor: &str, opacity: f64) -> Self {
        Self {
            kind: "rect",
            xref: "paper",
            yref: "y",
            x0: 0.0,
            x1: 1.0,
            y0,
            y1,
            line: Line {
                color: fillcolor.to_string(),
                width: 0.0,
                dash: None,
            },
            fillcolor: Some(fillcolor.to_string()),
            opacity,
            layer: "below",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub x: f64,
    pub y: f64,
    pub xref: &'static str,
    pub yref: &'static str,
    pub text: String,
    pub showarrow: bool,
    pub xanchor: &'static str,
    pub yanchor: &'static str,
}

impl Annotation {
    /// Label at the top right of a vertical line
    pub fn line_label(x: f64, text: String) -> Self {
        Self {
            x,
            y: 1.0,
            xref: "x",
            yref: "paper",
            text,
            showarrow: false,
            xanchor: "left",
            yanchor: "top",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinorAxis {
    pub showgrid: bool,
    pub tick0: i64,
    pub dtick: i64,
    pub gridwidth: f64,
    pub gridcolor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XAxis {
    pub tick0: i64,
    pub dtick: i64,
    pub gridwidth: f64,
    pub gridcolor: String,
    pub minor: MinorAxis,
    /// Tick value (as a string) → displayed label
    pub labelalias: BTreeMap<String, String>,
    pub showspikes: bool,
    pub spikemode: &'static str,
    pub spikethickness: f64,
    pub spikedash: String,
    pub spikecolor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YAxis {
    pub showgrid: bool,
    pub range: [i64; 2],
    pub title: Title,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: Title,
    pub hovermode: &'static str,
    pub xaxis: XAxis,
    pub yaxis: YAxis,
    pub shapes: Vec<Shape>,
    pub annotations: Vec<Annotation>,
}

impl Figure {
    /// Self-contained `<div>` fragment drawing this figure with Plotly from its CDN
    pub fn to_html_div(&self) -> Result<String, serde_json::Error> {
        let id = format!("meal-chart-{}", uuid::Uuid::new_v4());
        // JSON may contain "</script>" inside label text
        let json = serde_json::to_string(self)?.replace("</", "<\\/");

        Ok(format!(
            r#"<div id="{id}" class="plotly-graph-div" style="height:100%; width:100%;"></div>
<script src="{cdn}" charset="utf-8"></script>
<script type="text/javascript">
(function() {{
  var figure = {json};
  Plotly.newPlot("{id}", figure.data, figure.layout, {{"responsive": true}});
}})();
</script>"#,
            id = id,
            cdn = PLOTLY_CDN,
            json = json
        ))
    }
}
