//! Chart rendering and storage for the analysis branch.

pub mod chart;
pub mod plots;

pub use chart::{render_png, ChartData, ChartKind};
pub use plots::{PlotInfo, PlotStore};
