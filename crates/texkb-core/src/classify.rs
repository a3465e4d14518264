//! Chart category classification for runnable samples.
//!
//! A fixed decision list over marker substrings in the code body. Plotting
//! commands are checked before node/edge drawing, which is checked before
//! pie markers; the first match wins.

use crate::models::ChartCategory;

pub fn classify_chart(code: &str) -> ChartCategory {
    if code.contains("\\addplot") {
        if code.contains("ybar") || code.contains("xbar") {
            ChartCategory::BarChart
        } else if code.contains("scatter") {
            ChartCategory::ScatterPlot
        } else if code.contains("mesh") || code.contains("surf") {
            ChartCategory::Plot3d
        } else {
            ChartCategory::LineChart
        }
    } else if code.contains("\\node") && code.contains("\\draw") {
        ChartCategory::NodeGraph
    } else if code.contains("\\pie") {
        ChartCategory::PieChart
    } else {
        ChartCategory::Other
    }
}
