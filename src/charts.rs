use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ColorsConfig, Config};
use crate::error::AppError;
use crate::models::{AnalysisResult, CategoryShift, DailyCount};
use crate::report;
use crate::stats;

pub const TICKET_COMPARISON: &str = "01_ticket_comparison.svg";
pub const CATEGORY_HEATMAP: &str = "02_category_heatmap.svg";
pub const DAILY_TRENDS: &str = "03_daily_trends.svg";
pub const EFFECT_SIZE: &str = "04_effect_size.svg";
pub const DASHBOARD: &str = "05_dashboard.svg";

const FONT: &str = "sans-serif";
const HEAT_LOW: (u8, u8, u8) = (255, 255, 204);
const HEAT_HIGH: (u8, u8, u8) = (189, 0, 38);
const INCREASE: RGBColor = RGBColor(214, 39, 40);
const DECREASE: RGBColor = RGBColor(44, 160, 44);
const TOP_CHANGES_PER_SIDE: usize = 3;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("failed to prepare drawing area: {0}")]
    DrawingArea(String),

    #[error("failed to draw chart elements: {0}")]
    Drawing(String),

    #[error("cannot create figures directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chart data: {0}")]
    InvalidData(String),
}

impl From<ChartError> for AppError {
    fn from(err: ChartError) -> Self {
        AppError::Chart(err.to_string())
    }
}

type Result<T> = core::result::Result<T, ChartError>;
type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

fn area_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::DrawingArea(e.to_string())
}

fn draw_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Drawing(e.to_string())
}

#[derive(Debug, Clone)]
pub struct Palette {
    pub a: RGBColor,
    pub b: RGBColor,
    pub a_name: String,
    pub b_name: String,
}

impl Palette {
    pub fn from_config(config: &Config) -> Self {
        let defaults = ColorsConfig::default();
        let pick = |raw: &str, fallback: &str| {
            parse_hex_color(raw).unwrap_or_else(|| {
                warn!(color = raw, "invalid hex color, using default");
                parse_hex_color(fallback).unwrap_or(BLACK)
            })
        };
        Palette {
            a: pick(&config.colors.a, &defaults.a),
            b: pick(&config.colors.b, &defaults.b),
            a_name: config.groups.a_name.clone(),
            b_name: config.groups.b_name.clone(),
        }
    }
}

/// `#RRGGBB` (leading `#` optional) to an RGB color.
pub fn parse_hex_color(raw: &str) -> Option<RGBColor> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(RGBColor(channel(0)?, channel(2)?, channel(4)?))
}

pub struct ChartInputs<'a> {
    pub sample_a: &'a [f64],
    pub sample_b: &'a [f64],
    pub categories: &'a [CategoryShift],
    pub daily: Option<&'a [DailyCount]>,
    pub result: &'a AnalysisResult,
}

/// A chart that fails is logged and skipped; only directory creation is fatal.
pub fn render_all(inputs: &ChartInputs<'_>, config: &Config) -> Result<Vec<PathBuf>> {
    let dir = config.figures_dir();
    std::fs::create_dir_all(&dir)?;
    let palette = Palette::from_config(config);
    let mut written = Vec::new();

    let mut render = |name: &str, draw: &dyn Fn(&Path) -> Result<()>| {
        let path = dir.join(name);
        match draw(&path) {
            Ok(()) => {
                info!(path = %path.display(), "chart saved");
                written.push(path);
            }
            Err(err) => warn!(chart = name, error = %err, "chart skipped"),
        }
    };

    render(TICKET_COMPARISON, &|path: &Path| {
        plot_ticket_comparison(path, inputs.sample_a, inputs.sample_b, &palette)
    });
    render(CATEGORY_HEATMAP, &|path: &Path| plot_category_heatmap(path, inputs.categories));
    match inputs.daily {
        Some(days) if !days.is_empty() => render(DAILY_TRENDS, &|path: &Path| {
            plot_daily_trends(path, days, config.analysis.trend_window, &palette)
        }),
        _ => debug!("no daily stats, skipping daily trend chart"),
    }
    render(EFFECT_SIZE, &|path: &Path| plot_effect_size(path, inputs.result));
    render(DASHBOARD, &|path: &Path| plot_dashboard(path, inputs, &palette));

    Ok(written)
}

pub fn plot_ticket_comparison(
    path: &Path,
    sample_a: &[f64],
    sample_b: &[f64],
    palette: &Palette,
) -> Result<()> {
    let root = SVGBackend::new(path, (1400, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(area_err)?;
    let root = root
        .titled("A/B test: control vs treatment", (FONT, 24))
        .map_err(area_err)?;
    let (left, right) = root.split_horizontally(700);

    draw_mean_bars(&left, sample_a, sample_b, palette, "Mean tickets per classroom")?;
    draw_box_plots(&right, sample_a, sample_b, palette, "Tickets per classroom")?;

    root.present().map_err(area_err)
}

pub fn plot_category_heatmap(path: &Path, categories: &[CategoryShift]) -> Result<()> {
    let height = (140 + 40 * categories.len().max(1)) as u32;
    let root = SVGBackend::new(path, (1000, height)).into_drawing_area();
    root.fill(&WHITE).map_err(area_err)?;
    let root = root
        .titled("Tickets by category and group", (FONT, 22))
        .map_err(area_err)?;

    let rows = categories.len().max(1) as f64;
    let mut chart = ChartBuilder::on(&root)
        .margin(15)
        .build_cartesian_2d(-1.6f64..3.0f64, 0f64..rows + 1.0)
        .map_err(area_err)?;

    let header = TextStyle::from((FONT, 16).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    chart
        .draw_series([("Group A", 0.5), ("Group B", 1.5)].into_iter().map(|(label, x)| {
            Text::new(label.to_string(), (x, rows + 0.5), header.clone())
        }))
        .map_err(draw_err)?;

    if categories.is_empty() {
        chart
            .draw_series(std::iter::once(Text::new(
                "no categorised tickets".to_string(),
                (0.5, 0.5),
                header.clone(),
            )))
            .map_err(draw_err)?;
        return root.present().map_err(area_err);
    }

    let max_count = categories
        .iter()
        .map(|c| c.count_a.max(c.count_b))
        .max()
        .unwrap_or(1)
        .max(1) as f64;

    let name_style = TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
    let cell_style = TextStyle::from((FONT, 14).into_font()).pos(Pos::new(HPos::Center, VPos::Center));

    for (i, shift) in categories.iter().enumerate() {
        // First category on top.
        let y = rows - 1.0 - i as f64;
        let cells = [(0.0, shift.count_a), (1.0, shift.count_b)];

        chart
            .draw_series(cells.iter().map(|&(x, count)| {
                Rectangle::new(
                    [(x, y), (x + 1.0, y + 1.0)],
                    heat_color(count as f64 / max_count).filled(),
                )
            }))
            .map_err(draw_err)?;
        chart
            .draw_series(cells.iter().map(|&(x, count)| {
                Text::new(count.to_string(), (x + 0.5, y + 0.5), cell_style.clone())
            }))
            .map_err(draw_err)?;

        let mut labels = vec![Text::new(
            shift.category.clone(),
            (-1.55, y + 0.5),
            name_style.clone(),
        )];
        if let Some(pct) = shift.change_percent {
            let (arrow, color): (&str, &'static RGBColor) = if pct >= 0.0 {
                ("▲", &INCREASE)
            } else {
                ("▼", &DECREASE)
            };
            labels.push(Text::new(
                format!("{arrow} {pct:+.1}%"),
                (2.1, y + 0.5),
                name_style.color(color),
            ));
        }
        chart.draw_series(labels).map_err(draw_err)?;
    }

    root.present().map_err(area_err)
}

pub fn plot_daily_trends(
    path: &Path,
    days: &[DailyCount],
    window: usize,
    palette: &Palette,
) -> Result<()> {
    if days.is_empty() {
        return Err(ChartError::InvalidData("no daily counts".into()));
    }
    let root = SVGBackend::new(path, (1400, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(area_err)?;

    let counts_a: Vec<f64> = days.iter().map(|d| d.count_a).collect();
    let counts_b: Vec<f64> = days.iter().map(|d| d.count_b).collect();
    let trend_a = stats::rolling_mean_centered(&counts_a, window);
    let trend_b = stats::rolling_mean_centered(&counts_b, window);
    let y_max = counts_a
        .iter()
        .chain(&counts_b)
        .copied()
        .fold(0.0f64, f64::max)
        .max(1.0)
        * 1.15;
    let last = (days.len() - 1) as f64;
    let dates: Vec<String> = days.iter().map(|d| d.date.format("%d.%m").to_string()).collect();

    let mut chart = ChartBuilder::on(&root)
        .caption("Tickets per day", (FONT, 22))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..last + 0.5, 0f64..y_max)
        .map_err(area_err)?;

    chart
        .configure_mesh()
        .x_labels(dates.len().min(15))
        .x_label_formatter(&|x| index_label(&dates, *x))
        .y_desc("Tickets")
        .draw()
        .map_err(draw_err)?;

    let groups = [
        (&counts_a, &trend_a, palette.a, palette.a_name.as_str()),
        (&counts_b, &trend_b, palette.b, palette.b_name.as_str()),
    ];
    for (counts, trend, color, name) in groups {
        chart
            .draw_series(
                counts
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| Circle::new((i as f64, v), 4, color.mix(0.6).filled())),
            )
            .map_err(draw_err)?;
        chart
            .draw_series(LineSeries::new(
                trend.iter().enumerate().map(|(i, &v)| (i as f64, v)),
                color.stroke_width(3),
            ))
            .map_err(draw_err)?
            .label(format!("{name} ({window}-day trend)"))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));

        let mean = stats::mean(counts);
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(-0.5, mean), (last + 0.5, mean)],
                color.mix(0.5).stroke_width(1),
            )))
            .map_err(draw_err)?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(draw_err)?;

    root.present().map_err(area_err)
}

pub fn plot_effect_size(path: &Path, result: &AnalysisResult) -> Result<()> {
    let root = SVGBackend::new(path, (1000, 260)).into_drawing_area();
    root.fill(&WHITE).map_err(area_err)?;
    draw_effect(&root, result, "Effect size and 95% confidence interval")?;
    root.present().map_err(area_err)
}

pub fn plot_dashboard(path: &Path, inputs: &ChartInputs<'_>, palette: &Palette) -> Result<()> {
    let root = SVGBackend::new(path, (1800, 1000)).into_drawing_area();
    root.fill(&WHITE).map_err(area_err)?;
    let root = root
        .titled("A/B TEST DASHBOARD: new instruction effectiveness", (FONT, 28))
        .map_err(area_err)?;
    let panels = root.split_evenly((2, 3));

    draw_mean_bars(&panels[0], inputs.sample_a, inputs.sample_b, palette, "Group comparison")?;
    draw_key_metrics(&panels[1], inputs.result)?;
    draw_top_changes(&panels[2], inputs.categories)?;
    draw_box_plots(&panels[3], inputs.sample_a, inputs.sample_b, palette, "Distribution")?;
    let diff = inputs.result.ttest.mean_diff;
    draw_effect(&panels[4], inputs.result, &format!("Effect: {diff:.1} tickets"))?;
    draw_status(&panels[5], inputs.result)?;

    root.present().map_err(area_err)
}

fn draw_mean_bars(
    area: &Area<'_>,
    sample_a: &[f64],
    sample_b: &[f64],
    palette: &Palette,
    title: &str,
) -> Result<()> {
    let a = stats::descriptive_stats(sample_a);
    let b = stats::descriptive_stats(sample_b);
    let bars = [(0.0, &a, palette.a), (1.0, &b, palette.b)];
    let top = bars
        .iter()
        .map(|(_, s, _)| s.mean + finite_or_zero(s.sem))
        .fold(0.0f64, f64::max);
    let y_max = nonzero(top) * 1.25;
    ensure_finite(&[y_max])?;

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 18))
        .margin(15)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.6f64..1.6f64, 0f64..y_max)
        .map_err(area_err)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(5)
        .x_label_formatter(&|x| group_tick(*x))
        .y_desc("Tickets")
        .draw()
        .map_err(draw_err)?;

    chart
        .draw_series(bars.iter().map(|&(x, s, color)| {
            Rectangle::new([(x - 0.3, 0.0), (x + 0.3, s.mean)], color.mix(0.85).filled())
        }))
        .map_err(draw_err)?;

    for &(x, s, _) in &bars {
        let sem = finite_or_zero(s.sem);
        let (lo, hi) = (s.mean - sem, s.mean + sem);
        let cap = |y: f64| PathElement::new(vec![(x - 0.08, y), (x + 0.08, y)], BLACK.stroke_width(2));
        chart
            .draw_series([
                PathElement::new(vec![(x, lo), (x, hi)], BLACK.stroke_width(2)),
                cap(lo),
                cap(hi),
            ])
            .map_err(draw_err)?;
    }

    let value_style = TextStyle::from((FONT, 15).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom));
    chart
        .draw_series(bars.iter().map(|&(x, s, _)| {
            Text::new(
                format!("{:.1}", s.mean),
                (x, s.mean + finite_or_zero(s.sem) + y_max * 0.02),
                value_style.clone(),
            )
        }))
        .map_err(draw_err)?;
    Ok(())
}

/// Box plots with 1.5 × IQR whiskers; points beyond them drawn as outliers.
fn draw_box_plots(
    area: &Area<'_>,
    sample_a: &[f64],
    sample_b: &[f64],
    palette: &Palette,
    title: &str,
) -> Result<()> {
    let boxes = [
        (0.0, BoxSummary::new(sample_a), palette.a),
        (1.0, BoxSummary::new(sample_b), palette.b),
    ];
    let lo = boxes.iter().map(|(_, s, _)| s.min).fold(f64::INFINITY, f64::min);
    let hi = boxes.iter().map(|(_, s, _)| s.max).fold(f64::NEG_INFINITY, f64::max);
    ensure_finite(&[lo, hi])?;
    let pad = nonzero(hi - lo) * 0.1;

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 18))
        .margin(15)
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.6f64..1.6f64, (lo - pad).min(0.0)..hi + pad)
        .map_err(area_err)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(5)
        .x_label_formatter(&|x| group_tick(*x))
        .y_desc("Tickets")
        .draw()
        .map_err(draw_err)?;

    for (x, s, color) in &boxes {
        let x = *x;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x - 0.25, s.q1), (x + 0.25, s.q3)],
                color.mix(0.6).filled(),
            )))
            .map_err(draw_err)?;
        chart
            .draw_series([
                PathElement::new(vec![(x - 0.25, s.q1), (x + 0.25, s.q1), (x + 0.25, s.q3), (x - 0.25, s.q3), (x - 0.25, s.q1)], BLACK.stroke_width(1)),
                PathElement::new(vec![(x - 0.25, s.median), (x + 0.25, s.median)], BLACK.stroke_width(3)),
                PathElement::new(vec![(x, s.q3), (x, s.whisker_high)], BLACK.stroke_width(1)),
                PathElement::new(vec![(x, s.q1), (x, s.whisker_low)], BLACK.stroke_width(1)),
                PathElement::new(vec![(x - 0.1, s.whisker_high), (x + 0.1, s.whisker_high)], BLACK.stroke_width(1)),
                PathElement::new(vec![(x - 0.1, s.whisker_low), (x + 0.1, s.whisker_low)], BLACK.stroke_width(1)),
            ])
            .map_err(draw_err)?;
        chart
            .draw_series(
                s.outliers
                    .iter()
                    .map(|&v| Circle::new((x, v), 4, BLACK.stroke_width(1))),
            )
            .map_err(draw_err)?;
    }
    Ok(())
}

fn draw_effect(area: &Area<'_>, result: &AnalysisResult, title: &str) -> Result<()> {
    let diff = result.ttest.mean_diff;
    let (ci_low, ci_high) = result.ttest.confidence_interval;
    ensure_finite(&[diff, ci_low, ci_high])?;

    let lo = ci_low.min(0.0);
    let hi = ci_high.max(0.0);
    let pad = nonzero(hi - lo) * 0.2;

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, 18))
        .margin(15)
        .x_label_area_size(35)
        .build_cartesian_2d(lo - pad..hi + pad, 0f64..1f64)
        .map_err(area_err)?;
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(0)
        .x_desc("Difference in tickets per classroom (B − A)")
        .draw()
        .map_err(draw_err)?;

    chart
        .draw_series([
            PathElement::new(vec![(0.0, 0.0), (0.0, 1.0)], INCREASE.stroke_width(2)),
            PathElement::new(vec![(ci_low, 0.5), (ci_high, 0.5)], BLACK.stroke_width(3)),
            PathElement::new(vec![(ci_low, 0.4), (ci_low, 0.6)], BLACK.stroke_width(3)),
            PathElement::new(vec![(ci_high, 0.4), (ci_high, 0.6)], BLACK.stroke_width(3)),
        ])
        .map_err(draw_err)?;
    chart
        .draw_series(std::iter::once(Circle::new((diff, 0.5), 7, BLUE.filled())))
        .map_err(draw_err)?;

    let label = TextStyle::from((FONT, 15).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom));
    chart
        .draw_series(std::iter::once(Text::new(
            format!("{diff:.2} [{ci_low:.2}, {ci_high:.2}]"),
            (diff, 0.68),
            label,
        )))
        .map_err(draw_err)?;
    Ok(())
}

fn draw_key_metrics(area: &Area<'_>, result: &AnalysisResult) -> Result<()> {
    let desc = &result.descriptive_stats;
    let ttest = &result.ttest;
    let rows = [
        ("Metric", "Group A".to_string(), "Group B".to_string()),
        ("Classrooms", desc.group_a.size.to_string(), desc.group_b.size.to_string()),
        ("Mean", format!("{:.2}", desc.group_a.mean), format!("{:.2}", desc.group_b.mean)),
        ("Median", format!("{:.1}", desc.group_a.median), format!("{:.1}", desc.group_b.median)),
        ("Std", format!("{:.2}", desc.group_a.std), format!("{:.2}", desc.group_b.std)),
        ("Change", String::new(), format!("{:+.1}%", desc.effect.relative_diff)),
        ("Cohen's d", String::new(), format!("{:.2}", desc.effect.cohens_d)),
        ("p-value", String::new(), format!("{:.4}", ttest.p_value)),
    ];

    let (width, height) = area.dim_in_pixel();
    let header = TextStyle::from((FONT, 20).into_font()).pos(Pos::new(HPos::Center, VPos::Top));
    area.draw(&Text::new("Key metrics", (width as i32 / 2, 10), header))
        .map_err(draw_err)?;

    let style = TextStyle::from((FONT, 16).into_font());
    let row_height = ((height as i32 - 60) / rows.len() as i32).max(18);
    let columns = [20, width as i32 * 2 / 5, width as i32 * 7 / 10];
    for (i, (name, a, b)) in rows.iter().enumerate() {
        let y = 50 + i as i32 * row_height;
        for (text, x) in [(name.to_string(), columns[0]), (a.clone(), columns[1]), (b.clone(), columns[2])] {
            area.draw(&Text::new(text, (x, y), style.clone()))
                .map_err(draw_err)?;
        }
    }
    Ok(())
}

fn draw_top_changes(area: &Area<'_>, categories: &[CategoryShift]) -> Result<()> {
    let top = report::top_category_changes(categories, TOP_CHANGES_PER_SIDE);
    if top.is_empty() {
        let (width, height) = area.dim_in_pixel();
        let style = TextStyle::from((FONT, 16).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
        area.draw(&Text::new(
            "No category changes",
            (width as i32 / 2, height as i32 / 2),
            style,
        ))
        .map_err(draw_err)?;
        return Ok(());
    }

    let pcts: Vec<f64> = top.iter().filter_map(|c| c.change_percent).collect();
    let reach = nonzero(pcts.iter().fold(0.0f64, |acc, p| acc.max(p.abs()))) * 1.3;
    let rows = top.len() as f64;

    let mut chart = ChartBuilder::on(area)
        .caption("Top changes", (FONT, 18))
        .margin(15)
        .x_label_area_size(35)
        .build_cartesian_2d(-reach..reach, 0f64..rows)
        .map_err(area_err)?;
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(0)
        .x_desc("Change, %")
        .draw()
        .map_err(draw_err)?;

    let label = TextStyle::from((FONT, 13).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    for (i, shift) in top.iter().enumerate() {
        let Some(pct) = shift.change_percent else {
            continue;
        };
        let y = rows - 1.0 - i as f64;
        let color = if pct >= 0.0 { INCREASE } else { DECREASE };
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(0.0, y + 0.15), (pct, y + 0.85)],
                color.mix(0.8).filled(),
            )))
            .map_err(draw_err)?;
        // Names sit on the opposite side of the bar.
        let x = if pct >= 0.0 { -reach / 2.0 } else { reach / 2.0 };
        chart
            .draw_series(std::iter::once(Text::new(
                format!("{} ({pct:+.0}%)", shift.category),
                (x, y + 0.5),
                label.clone(),
            )))
            .map_err(draw_err)?;
    }
    Ok(())
}

fn draw_status(area: &Area<'_>, result: &AnalysisResult) -> Result<()> {
    let (width, height) = area.dim_in_pixel();
    let (headline, color): (&str, &'static RGBColor) = if result.ttest.significant {
        ("EFFECT CONFIRMED", &DECREASE)
    } else {
        ("NO SIGNIFICANT EFFECT", &INCREASE)
    };
    let big = TextStyle::from((FONT, 30).into_font())
        .pos(Pos::new(HPos::Center, VPos::Center))
        .color(color);
    let small = TextStyle::from((FONT, 18).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    let cx = width as i32 / 2;
    let cy = height as i32 / 2;

    area.draw(&Text::new(headline, (cx, cy - 40), big))
        .map_err(draw_err)?;
    area.draw(&Text::new(
        format!("p-value = {:.4}", result.ttest.p_value),
        (cx, cy + 10),
        small.clone(),
    ))
    .map_err(draw_err)?;
    area.draw(&Text::new(
        format!(
            "Ticket change: {:+.1}%",
            result.descriptive_stats.effect.relative_diff
        ),
        (cx, cy + 40),
        small,
    ))
    .map_err(draw_err)?;
    Ok(())
}

struct BoxSummary {
    min: f64,
    max: f64,
    q1: f64,
    median: f64,
    q3: f64,
    whisker_low: f64,
    whisker_high: f64,
    outliers: Vec<f64>,
}

impl BoxSummary {
    fn new(sample: &[f64]) -> Self {
        let mut sorted = sample.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let q1 = stats::percentile(&sorted, 25.0);
        let median = stats::percentile(&sorted, 50.0);
        let q3 = stats::percentile(&sorted, 75.0);
        let reach = 1.5 * (q3 - q1);
        let inside = |v: &f64| *v >= q1 - reach && *v <= q3 + reach;

        BoxSummary {
            min: sorted.first().copied().unwrap_or(f64::NAN),
            max: sorted.last().copied().unwrap_or(f64::NAN),
            q1,
            median,
            q3,
            whisker_low: sorted.iter().copied().find(|v| inside(v)).unwrap_or(q1),
            whisker_high: sorted.iter().rev().copied().find(|v| inside(v)).unwrap_or(q3),
            outliers: sorted.iter().copied().filter(|v| !inside(v)).collect(),
        }
    }
}

fn heat_color(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let mix = |lo: u8, hi: u8| (lo as f64 + (hi as f64 - lo as f64) * t).round() as u8;
    RGBColor(
        mix(HEAT_LOW.0, HEAT_HIGH.0),
        mix(HEAT_LOW.1, HEAT_HIGH.1),
        mix(HEAT_LOW.2, HEAT_HIGH.2),
    )
}

fn group_tick(x: f64) -> String {
    if (x - 0.0).abs() < 1e-6 {
        "Group A".into()
    } else if (x - 1.0).abs() < 1e-6 {
        "Group B".into()
    } else {
        String::new()
    }
}

fn index_label(labels: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    labels.get(rounded as usize).cloned().unwrap_or_default()
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn nonzero(span: f64) -> f64 {
    if span.is_finite() && span > 0.0 {
        span
    } else {
        1.0
    }
}

fn ensure_finite(values: &[f64]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ChartError::InvalidData(format!(
            "non-finite value among {values:?}"
        )))
    }
}
