//! Report rendering: Plotters SVG charts wrapped in self-contained HTML documents

use crate::error::AnalyticsError;
use crate::metrics::{
    CategoryReport, MonthlyTrend, RegionalReport, Reports, Segment, SegmentationReport,
};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const TREND_FILE: &str = "sales_trend.html";
pub const REGIONAL_FILE: &str = "regional_performance.html";
pub const CATEGORY_FILE: &str = "category_distribution.html";
pub const SEGMENTS_FILE: &str = "customer_segments.html";

/// Fixed artifact names, in the order they are produced
pub const ARTIFACT_FILES: [&str; 4] = [TREND_FILE, REGIONAL_FILE, CATEGORY_FILE, SEGMENTS_FILE];

const CHART_SIZE: (u32, u32) = (960, 540);
/// Upper bound on value labels along the trend line
const MAX_POINT_LABELS: usize = 12;

/// Portfolio palette
const BLUE_500: RGBColor = RGBColor(59, 130, 246);
const VIOLET_500: RGBColor = RGBColor(139, 92, 246);
const PINK_500: RGBColor = RGBColor(236, 72, 153);
const AMBER_500: RGBColor = RGBColor(245, 158, 11);
const PALETTE: [RGBColor; 4] = [BLUE_500, VIOLET_500, PINK_500, AMBER_500];

/// One rendered report waiting to be written
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: &'static str,
    pub html: String,
}

/// Render all four reports and write them into `output_dir`.
///
/// Every document is rendered in memory and staged as a temp file in the
/// output directory before any existing artifact is replaced, so a drawing or
/// staging failure leaves the previous reports untouched.
pub fn render_reports(
    reports: &Reports,
    output_dir: &Path,
    create_output_dir: bool,
) -> Result<Vec<PathBuf>, AnalyticsError> {
    let artifacts = build_artifacts(reports)?;
    write_artifacts(&artifacts, output_dir, create_output_dir)
}

/// Render every report document in memory
pub fn build_artifacts(reports: &Reports) -> Result<Vec<Artifact>, AnalyticsError> {
    let artifacts = vec![
        Artifact {
            file_name: TREND_FILE,
            html: trend_document(&reports.trend)
                .map_err(|e| AnalyticsError::output(TREND_FILE, format!("{:#}", e)))?,
        },
        Artifact {
            file_name: REGIONAL_FILE,
            html: regional_document(&reports.regional)
                .map_err(|e| AnalyticsError::output(REGIONAL_FILE, format!("{:#}", e)))?,
        },
        Artifact {
            file_name: CATEGORY_FILE,
            html: category_document(&reports.category)
                .map_err(|e| AnalyticsError::output(CATEGORY_FILE, format!("{:#}", e)))?,
        },
        Artifact {
            file_name: SEGMENTS_FILE,
            html: segments_document(&reports.segmentation)
                .map_err(|e| AnalyticsError::output(SEGMENTS_FILE, format!("{:#}", e)))?,
        },
    ];
    debug!("Rendered {} report documents", artifacts.len());
    Ok(artifacts)
}

/// Stage every artifact next to its target, then move them all into place
pub fn write_artifacts(
    artifacts: &[Artifact],
    output_dir: &Path,
    create_output_dir: bool,
) -> Result<Vec<PathBuf>, AnalyticsError> {
    let first = artifacts.first().map(|a| a.file_name).unwrap_or_default();

    if !output_dir.is_dir() {
        if !create_output_dir {
            return Err(AnalyticsError::output(
                first,
                format!("output directory {} does not exist", output_dir.display()),
            ));
        }
        fs::create_dir_all(output_dir).map_err(|e| {
            AnalyticsError::output(
                first,
                format!("cannot create {}: {}", output_dir.display(), e),
            )
        })?;
        info!("Created output directory {}", output_dir.display());
    }

    // Dropped temp files delete themselves, so an early return cleans up.
    let mut staged = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let mut file = NamedTempFile::new_in(output_dir)
            .map_err(|e| AnalyticsError::output(artifact.file_name, e))?;
        file.write_all(artifact.html.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| AnalyticsError::output(artifact.file_name, e))?;
        staged.push((artifact.file_name, file));
    }

    let mut written = Vec::with_capacity(staged.len());
    for (file_name, file) in staged {
        let target = output_dir.join(file_name);
        file.persist(&target)
            .map_err(|e| AnalyticsError::output(file_name, e.error))?;
        info!("Report saved to: {}", target.display());
        written.push(target);
    }
    Ok(written)
}

fn trend_document(trend: &MonthlyTrend) -> crate::Result<String> {
    let svg = draw_trend_chart(trend)?;

    let rows = trend
        .points
        .iter()
        .map(|p| {
            vec![
                p.month.to_string(),
                format_money(p.revenue),
                format_money(p.profit),
                p.transactions.to_string(),
                p.active_customers.to_string(),
                format_optional_money(p.revenue_per_customer),
                format_percent(p.growth),
            ]
        })
        .collect();
    let summary = format!(
        "Average month-over-month growth: <strong>{}</strong>. Average revenue per customer: <strong>{}</strong>.",
        format_percent(trend.average_growth),
        format_optional_money(trend.average_revenue_per_customer),
    );
    let table = html_table(
        &[
            "Month",
            "Revenue",
            "Profit",
            "Orders",
            "Customers",
            "Revenue / customer",
            "Growth",
        ],
        rows,
    );

    html_document(
        "Sales Trend Analysis - Monthly Revenue",
        &svg,
        &summary,
        &table,
        trend,
    )
}

fn regional_document(regional: &RegionalReport) -> crate::Result<String> {
    let svg = draw_regional_chart(regional)?;

    let rows = regional
        .ranking
        .iter()
        .enumerate()
        .map(|(rank, r)| {
            vec![
                (rank + 1).to_string(),
                escape_html(r.region.name()),
                format_money(r.revenue),
                format_money(r.profit),
                format_percent(r.margin),
            ]
        })
        .collect();
    let summary = match &regional.gap {
        Some(gap) => format!(
            "Best region: <strong>{}</strong> ({} margin). Needs attention: <strong>{}</strong> ({} margin). Gap: <strong>{} percentage points</strong>.",
            escape_html(gap.top.name()),
            format_percent(Some(gap.top_margin)),
            escape_html(gap.bottom.name()),
            format_percent(Some(gap.bottom_margin)),
            format_points(gap.gap_points),
        ),
        None => "No region recorded revenue.".to_string(),
    };
    let ranking = html_table(&["Rank", "Region", "Revenue", "Profit", "Margin"], rows);

    let cell_rows = regional
        .cells
        .iter()
        .map(|c| {
            vec![
                escape_html(c.region.name()),
                escape_html(c.category.name()),
                format_money(c.revenue),
                format_money(c.profit),
                format_percent(c.margin),
            ]
        })
        .collect();
    let cells = html_table(&["Region", "Category", "Revenue", "Profit", "Margin"], cell_rows);

    html_document(
        "Regional Performance - Profit Margins",
        &svg,
        &summary,
        &format!("{}\n<h2>Region by category</h2>\n{}", ranking, cells),
        regional,
    )
}

fn category_document(category: &CategoryReport) -> crate::Result<String> {
    let svg = draw_category_chart(category)?;

    let rows = category
        .categories
        .iter()
        .map(|c| {
            vec![
                escape_html(c.category.name()),
                format_money(c.revenue),
                format_money(c.profit),
                format_percent(c.margin),
                format_percent(c.revenue_share),
                c.quantity.to_string(),
            ]
        })
        .collect();
    let summary = match category.most_profitable() {
        Some(top) => format!(
            "Top category: <strong>{}</strong> ({} profit). Total revenue {}.",
            escape_html(top.category.name()),
            format_money(top.profit),
            format_money(category.total_revenue),
        ),
        None => "No categories recorded.".to_string(),
    };
    let table = html_table(
        &["Category", "Revenue", "Profit", "Margin", "Revenue share", "Units"],
        rows,
    );

    html_document("Category Profit Distribution", &svg, &summary, &table, category)
}

fn segments_document(segmentation: &SegmentationReport) -> crate::Result<String> {
    let svg = draw_segments_chart(segmentation)?;

    let rows = [&segmentation.power_users, &segmentation.standard_users]
        .into_iter()
        .map(|s| {
            vec![
                s.segment.label().to_string(),
                s.customers.to_string(),
                format_money(s.revenue),
                format_percent(s.revenue_share),
                format_percent(s.customer_share),
                format_optional_money(s.average_revenue),
                s.average_orders
                    .map(format_points)
                    .unwrap_or_else(|| "n/a".to_string()),
                format_percent(s.margin),
            ]
        })
        .collect();
    let top_share = Decimal::ONE - segmentation.percentile;
    let summary = format!(
        "Power users (top {} of customers by revenue) drive <strong>{}</strong> of revenue.",
        format_percent(Some(top_share)),
        format_percent(segmentation.power_users.revenue_share),
    );
    let table = html_table(
        &[
            "Segment",
            "Customers",
            "Revenue",
            "Revenue share",
            "Customer share",
            "Avg revenue / customer",
            "Avg orders",
            "Margin",
        ],
        rows,
    );

    html_document(
        "Customer Segmentation Analysis Dashboard",
        &svg,
        &summary,
        &table,
        segmentation,
    )
}

fn draw_trend_chart(trend: &MonthlyTrend) -> crate::Result<String> {
    let labels: Vec<String> = trend.points.iter().map(|p| p.month.to_string()).collect();
    let values: Vec<(i32, f64)> = trend
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| (i as i32, to_f64(p.revenue)))
        .collect();
    let max_x = (values.len() as i32 - 1).max(1);
    let (y_min, y_max) = value_bounds(values.iter().map(|(_, v)| *v));
    let label_step = values.len().div_ceil(MAX_POINT_LABELS).max(1);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Monthly Revenue", ("sans-serif", 26))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(0i32..max_x, y_min..y_max)?;

        chart
            .configure_mesh()
            .x_desc("Month")
            .y_desc("Revenue ($)")
            .x_labels(labels.len().min(12))
            .x_label_formatter(&|x| labels.get(*x as usize).cloned().unwrap_or_default())
            .y_label_formatter(&|y| format!("{:.0}", y))
            .axis_desc_style(("sans-serif", 15))
            .draw()?;

        chart.draw_series(LineSeries::new(values.iter().copied(), BLUE_500.stroke_width(3)))?;
        chart.draw_series(
            values
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 4, BLUE_500.filled())),
        )?;
        chart.draw_series(
            trend
                .points
                .iter()
                .zip(&values)
                .step_by(label_step)
                .map(|(point, &(x, y))| {
                    Text::new(format_money(point.revenue), (x, y), value_label_style(y))
                }),
        )?;

        root.present()?;
    }
    Ok(svg)
}

/// One bar of a categorical chart; `None` values are listed but not drawn
struct Bar {
    label: String,
    value: Option<f64>,
    text: String,
}

fn draw_regional_chart(regional: &RegionalReport) -> crate::Result<String> {
    let bars: Vec<Bar> = regional
        .ranking
        .iter()
        .map(|r| Bar {
            label: r.region.name().to_string(),
            value: r.margin.map(percent_f64),
            text: format_percent(r.margin),
        })
        .collect();
    draw_bar_chart(
        "Profit Margin by Region",
        "Region",
        "Profit Margin (%)",
        &bars,
        VIOLET_500,
    )
}

fn draw_category_chart(category: &CategoryReport) -> crate::Result<String> {
    let bars: Vec<Bar> = category
        .categories
        .iter()
        .map(|c| Bar {
            label: format!("{} ({})", c.category.name(), format_percent(c.revenue_share)),
            value: Some(to_f64(c.profit)),
            text: format_money(c.profit),
        })
        .collect();
    draw_bar_chart(
        "Profit by Category (revenue share)",
        "Category",
        "Profit ($)",
        &bars,
        PINK_500,
    )
}

/// Vertical bars on a categorical axis; negative values hang below zero
fn draw_bar_chart(
    caption: &str,
    x_desc: &str,
    y_desc: &str,
    bars: &[Bar],
    color: RGBColor,
) -> crate::Result<String> {
    let count = bars.len().max(1) as u32;
    let (y_min, y_max) = value_bounds(bars.iter().filter_map(|bar| bar.value));

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(caption, ("sans-serif", 26))
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d((0u32..count).into_segmented(), y_min..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .x_labels(bars.len())
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => bars
                    .get(*i as usize)
                    .map(|bar| match bar.value {
                        Some(_) => bar.label.clone(),
                        None => format!("{} (n/a)", bar.label),
                    })
                    .unwrap_or_default(),
                _ => String::new(),
            })
            .y_label_formatter(&|y| format!("{:.1}", y))
            .axis_desc_style(("sans-serif", 15))
            .draw()?;

        let defined: Vec<(u32, &Bar, f64)> = bars
            .iter()
            .enumerate()
            .filter_map(|(i, bar)| bar.value.map(|value| (i as u32, bar, value)))
            .collect();

        chart.draw_series(defined.iter().map(|&(i, _, value)| {
            let x0 = SegmentValue::Exact(i);
            let x1 = SegmentValue::Exact(i + 1);
            let mut rect = Rectangle::new([(x0, 0.0), (x1, value)], color.filled());
            rect.set_margin(0, 0, 12, 12);
            rect
        }))?;
        chart.draw_series(defined.iter().map(|&(i, bar, value)| {
            Text::new(
                bar.text.clone(),
                (SegmentValue::CenterOf(i), value),
                value_label_style(value),
            )
        }))?;

        root.present()?;
    }
    Ok(svg)
}

fn draw_segments_chart(segmentation: &SegmentationReport) -> crate::Result<String> {
    let buckets = [&segmentation.power_users, &segmentation.standard_users];
    let points: Vec<(f64, f64, Segment)> = segmentation
        .customers
        .iter()
        .map(|c| (c.orders as f64, to_f64(c.revenue), c.segment))
        .collect();
    let max_orders = points.iter().map(|p| p.0).fold(1.0, f64::max);
    let max_revenue = points.iter().map(|p| p.1).fold(1.0, f64::max);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE)?;
        let panels = root.split_evenly((1, 2));

        let mut share_chart = ChartBuilder::on(&panels[0])
            .caption("Revenue Share by Segment", ("sans-serif", 22))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d((0u32..2u32).into_segmented(), 0f64..110f64)?;
        share_chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(2)
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => buckets
                    .get(*i as usize)
                    .map(|s| match s.revenue_share {
                        Some(_) => s.segment.label().to_string(),
                        None => format!("{} (n/a)", s.segment.label()),
                    })
                    .unwrap_or_default(),
                _ => String::new(),
            })
            .y_desc("Revenue (%)")
            .draw()?;

        let shares: Vec<(u32, f64, String)> = buckets
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.revenue_share
                    .map(|share| (i as u32, percent_f64(share), format_percent(Some(share))))
            })
            .collect();
        share_chart.draw_series(shares.iter().map(|(i, share, _)| {
            let x0 = SegmentValue::Exact(*i);
            let x1 = SegmentValue::Exact(*i + 1);
            let mut rect =
                Rectangle::new([(x0, 0.0), (x1, *share)], PALETTE[*i as usize].filled());
            rect.set_margin(0, 0, 20, 20);
            rect
        }))?;
        share_chart.draw_series(shares.iter().map(|(i, share, text)| {
            Text::new(
                text.clone(),
                (SegmentValue::CenterOf(*i), *share),
                value_label_style(*share),
            )
        }))?;

        let mut scatter = ChartBuilder::on(&panels[1])
            .caption("Order Frequency vs Revenue", ("sans-serif", 22))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(0f64..max_orders * 1.1, 0f64..max_revenue * 1.1)?;
        scatter
            .configure_mesh()
            .x_desc("Orders")
            .y_desc("Revenue ($)")
            .y_label_formatter(&|y| format!("{:.0}", y))
            .draw()?;

        for (segment, color) in [(Segment::PowerUser, BLUE_500), (Segment::Standard, VIOLET_500)] {
            scatter
                .draw_series(
                    points
                        .iter()
                        .filter(|p| p.2 == segment)
                        .map(|p| Circle::new((p.0, p.1), 3, color.mix(0.7).filled())),
                )?
                .label(segment.label())
                .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
        }
        scatter
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
    }
    Ok(svg)
}

/// Value label sitting just outside the end of a bar or above a point
fn value_label_style(value: f64) -> TextStyle<'static> {
    let anchor = if value < 0.0 {
        Pos::new(HPos::Center, VPos::Top)
    } else {
        Pos::new(HPos::Center, VPos::Bottom)
    };
    ("sans-serif", 13).into_font().color(&BLACK).pos(anchor)
}

/// Padded y-axis bounds that always include zero
fn value_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = (max - min).max(1.0);
    let pad = span * 0.1;
    let low = if min < 0.0 { min - pad } else { 0.0 };
    (low, max + pad)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn percent_f64(ratio: Decimal) -> f64 {
    to_f64(ratio) * 100.0
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A ratio as a percentage with two decimals, `n/a` when undefined
pub fn format_percent(ratio: Option<Decimal>) -> String {
    match ratio.and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED)) {
        Some(percent) => format!("{}%", format_points(percent)),
        None => "n/a".to_string(),
    }
}

/// Two decimals, rounded half away from zero
pub fn format_points(value: Decimal) -> String {
    format!("{:.2}", round2(value))
}

/// Whole dollars with thousands separators
pub fn format_money(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

fn format_optional_money(value: Option<Decimal>) -> String {
    value.map(format_money).unwrap_or_else(|| "n/a".to_string())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Cells must already be escaped
fn html_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut html = String::from("<table class=\"sortable\">\n<thead><tr>");
    for header in headers {
        html.push_str(&format!("<th>{}</th>", escape_html(header)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", cell));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>");
    html
}

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem auto;max-width:1000px;color:#1f2937}\
h1{font-size:1.5rem}svg{max-width:100%;height:auto}\
table{border-collapse:collapse;width:100%;margin-top:1rem}\
th,td{padding:.4rem .6rem;border-bottom:1px solid #e5e7eb;text-align:right}\
th:first-child,td:first-child{text-align:left}\
th{cursor:pointer;background:#f9fafb}tbody tr:hover{background:#eff6ff}";

// Click a header to sort its table.
const SCRIPT: &str = "document.querySelectorAll('table.sortable th').forEach(function(th,col){\
th.addEventListener('click',function(){var body=th.closest('table').tBodies[0];\
var rows=Array.from(body.rows);var asc=th.dataset.asc!=='1';th.dataset.asc=asc?'1':'0';\
var key=function(r){var t=r.cells[col].textContent.replace(/[$,%]/g,'');var n=parseFloat(t);return isNaN(n)?t:n;};\
rows.sort(function(a,b){var x=key(a),y=key(b);return (x>y?1:x<y?-1:0)*(asc?1:-1);});\
rows.forEach(function(r){body.appendChild(r);});});});";

fn html_document<T: Serialize>(
    title: &str,
    svg: &str,
    summary: &str,
    tables: &str,
    data: &T,
) -> crate::Result<String> {
    // Markup characters are escaped so the payload cannot break out of its script element.
    let json = serde_json::to_string(data)?
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026");
    Ok(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>{title}</h1>\n<figure>\n{svg}\n</figure>\n<p>{summary}</p>\n{tables}\n\
         <script type=\"application/json\" id=\"report-data\">{json}</script>\n\
         <script>{SCRIPT}</script>\n</body>\n</html>\n",
        title = escape_html(title),
    ))
}
