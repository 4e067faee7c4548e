mod annotate;
pub mod chart;
pub mod config;

pub use chart::{chart_file_name, chart_title, render, trailing_window, RenderedChart};
pub use config::RenderConfig;
