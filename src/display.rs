//! # Tabular rendering of adjustment results
//!
//! Display adaptors used by the driver to print parameter vectors, standard
//! deviations and covariance matrices. The adaptors **borrow** the numeric
//! data (the engine only hands over plain slices plus row/column counts and
//! a decimal precision) and render when formatted with `{}`.

use std::fmt;

use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};
use itertools::Itertools;

use crate::adjustment::precision::ParameterPrecision;
use crate::ellipsoid::EllipsoidParams;

/// Render a flat row-major slice as a bordered numeric table.
///
/// Arguments
/// -----------------
/// * `data`: Row-major matrix entries, `rows × cols` long.
/// * `rows`, `cols`: Dimensions.
///
/// Use [`MatrixDisplay::with_precision`] to pick the number of decimal digits
/// (default 4) and [`MatrixDisplay::with_title`] for a heading line.
pub struct MatrixDisplay<'a> {
    data: &'a [f64],
    rows: usize,
    cols: usize,
    precision: usize,
    title: Option<&'a str>,
}

impl<'a> MatrixDisplay<'a> {
    pub fn new(data: &'a [f64], rows: usize, cols: usize) -> Self {
        debug_assert_eq!(data.len(), rows * cols, "shape mismatch");
        MatrixDisplay {
            data,
            rows,
            cols,
            precision: 4,
            title: None,
        }
    }

    /// Number of decimal digits to print.
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Heading printed above the table.
    pub fn with_title(mut self, title: &'a str) -> Self {
        self.title = Some(title);
        self
    }
}

impl fmt::Display for MatrixDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(title) = self.title {
            writeln!(f, "{title} =")?;
        }
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        let rows = self.data.iter().take(self.rows * self.cols).chunks(self.cols);
        for row in &rows {
            table.add_row(
                row.map(|v| {
                    Cell::new(format!("{v:.prec$}", prec = self.precision))
                        .set_alignment(CellAlignment::Right)
                }),
            );
        }
        write!(f, "{table}")
    }
}

/// Render adjusted parameters with their standard deviations as
/// `name = value ± σ [unit]` lines, angles in degrees.
pub struct ParameterReport<'a> {
    params: &'a EllipsoidParams,
    precision: &'a ParameterPrecision,
}

impl<'a> ParameterReport<'a> {
    pub fn new(params: &'a EllipsoidParams, precision: &'a ParameterPrecision) -> Self {
        ParameterReport { params, precision }
    }
}

impl fmt::Display for ParameterReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (dx, dy, dz) = self.params.angles_in_degrees();
        let values = [
            ("tx", self.params.tx, "m"),
            ("ty", self.params.ty, "m"),
            ("tz", self.params.tz, "m"),
            ("ax", self.params.ax, "m"),
            ("ay", self.params.ay, "m"),
            ("az", self.params.az, "m"),
            ("theta_x", dx, "deg"),
            ("theta_y", dy, "deg"),
            ("theta_z", dz, "deg"),
        ];
        let sigmas = self.precision.reporting_units();
        for (i, (name, value, unit)) in values.iter().enumerate() {
            writeln!(f, "{name} = {value:.4} +/- {:.5} [{unit}]", sigmas[i])?;
        }
        Ok(())
    }
}
