//! Scatter plot of the calibration.
use crate::calibration::CalibrationError;
use crate::regression::LinearFit;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use std::path::Path;

const PLOT_SIZE: (u32, u32) = (640, 480);
const GRAY: RGBColor = RGBColor(128, 128, 128);

fn plot_error<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> CalibrationError + '_ {
    move |why| CalibrationError::Plot {
        path: path.to_path_buf(),
        message: why.to_string(),
    }
}

fn range<I: Iterator<Item = f64>>(xs: I) -> (f64, f64) {
    xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), x| {
        (min.min(x), max.max(x))
    })
}

/// Draw (mean q-score, empirical q-score) pairs, the fitted line, and `y=x`.
/// The format follows the extension of `path`: SVG for `.svg`, a bitmap (e.g., PNG) otherwise.
pub fn plot_calibration<P: AsRef<Path>>(
    path: P,
    points: &[(f64, f64)],
    fit: &LinearFit,
    title: Option<&str>,
) -> Result<(), CalibrationError> {
    let path = path.as_ref();
    if points.is_empty() {
        return Err(plot_error(path)("no points to plot"));
    }
    let is_svg = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("svg"));
    debug!("PLOT	{}	SVG	{}", path.display(), is_svg);
    if is_svg {
        let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
        draw_calibration(root, points, fit, title).map_err(plot_error(path))
    } else {
        let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
        draw_calibration(root, points, fit, title).map_err(plot_error(path))
    }
}

fn draw_calibration<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    points: &[(f64, f64)],
    fit: &LinearFit,
    title: Option<&str>,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (x_min, x_max) = range(points.iter().map(|p| p.0));
    let (y_min, y_max) = range(points.iter().map(|p| p.1));
    let ends = [x_min, x_max];
    let fitted: Vec<_> = ends.iter().map(|&x| (x, fit.predict(x))).collect();
    let identity: Vec<_> = ends.iter().map(|&x| (x, x)).collect();
    let (lo, hi) = range(
        [y_min, y_max, x_min, x_max]
            .into_iter()
            .chain(fitted.iter().map(|p| p.1)),
    );
    root.fill(&WHITE)?;
    let mut builder = ChartBuilder::on(&root);
    builder.margin(20).x_label_area_size(45).y_label_area_size(50);
    if let Some(title) = title {
        builder.caption(title, ("sans-serif", 22));
    }
    let mut chart =
        builder.build_cartesian_2d((x_min - 1f64)..(x_max + 1f64), (lo - 1f64)..(hi + 1f64))?;
    chart
        .configure_mesh()
        .x_desc("Fastq q score")
        .y_desc("Alignment accuracy score")
        .draw()?;
    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 2, BLUE.mix(0.6).filled())),
    )?;
    let label = format!("slope={:3.2} intercept={:3.2}", fit.slope, fit.intercept);
    chart
        .draw_series(LineSeries::new(fitted, BLACK.mix(0.7).stroke_width(2)))?
        .label(label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.mix(0.7).stroke_width(2)));
    chart
        .draw_series(DashedLineSeries::new(identity, 2, 4, GRAY.stroke_width(1)))?
        .label("y=x")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GRAY.stroke_width(1)));
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.9))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}
