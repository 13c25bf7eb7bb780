// Coefficient report: a ranked printout plus a bar chart.
use std::path::Path;

use plotters::prelude::*;

use crate::error::{BattleError, Result};

/// Print `(feature, coefficient)` pairs, one per line.
pub fn print_importances(results: &[(String, f64)], intercept: f64) {
    println!("\nFeature importances:");
    for (name, coef) in results {
        println!("{:<40} {:>8.4}", name, coef);
    }
    println!("{:<40} {:>8.4}", "(intercept)", intercept);
}

/// Draw a horizontal bar chart of the first `top` coefficients and save it as a PNG.
pub fn plot_importances(results: &[(String, f64)], top: usize, path: &Path) -> Result<()> {
    let shown = &results[..results.len().min(top)];
    if shown.is_empty() {
        log::warn!("No coefficients to plot");
        return Ok(());
    }
    draw(shown, path).map_err(|e| BattleError::Plot(e.to_string()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn draw(results: &[(String, f64)], path: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
    let coefs: Vec<f64> = results.iter().map(|(_, c)| *c).collect();
    let count = results.len();

    // keep zero on the axis and pad both ends
    let min_x = coefs.iter().cloned().fold(0.0_f64, f64::min);
    let max_x = coefs.iter().cloned().fold(0.0_f64, f64::max);
    let pad = ((max_x - min_x) * 0.1).max(1e-3);
    let x_range = (min_x - pad)..(max_x + pad);

    let height = (40 + 24 * count as u32).max(300);
    let root = BitMapBackend::new(path, (1000, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Feature Importances", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(260)
        .build_cartesian_2d(x_range, 0..count)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .y_labels(count)
        .y_label_formatter(&|idx| names.get(*idx).map(|n| n.to_string()).unwrap_or_default())
        .x_desc("Coefficient")
        .y_desc("Feature")
        .draw()?;

    chart.draw_series(coefs.iter().enumerate().map(|(i, &coef)| {
        let start = 0.0_f64.min(coef);
        let end = 0.0_f64.max(coef);
        let color = if coef >= 0.0 { BLUE } else { RED };
        Rectangle::new([(start, i), (end, i + 1)], color.mix(0.5).filled())
    }))?;

    root.present()?;
    Ok(())
}
