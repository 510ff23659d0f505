//! Feature scaling

use crate::error::{AutoMlError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Standard scaler (zero mean, unit variance) over a subset of matrix columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<usize>,
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit on the given columns using only the listed rows
    pub fn fit(x: &Array2<f64>, columns: &[usize], rows: &[usize]) -> Result<Self> {
        if rows.is_empty() {
            return Err(AutoMlError::PreprocessingError(
                "Cannot fit scaler on zero rows".to_string(),
            ));
        }
        let n = rows.len() as f64;
        let mut means = Vec::with_capacity(columns.len());
        let mut stds = Vec::with_capacity(columns.len());

        for &col in columns {
            let mean = rows.iter().map(|&r| x[[r, col]]).sum::<f64>() / n;
            let var = rows.iter().map(|&r| (x[[r, col]] - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            means.push(mean);
            // Constant columns are centred but not rescaled
            stds.push(if std > f64::EPSILON { std } else { 1.0 });
        }

        Ok(Self {
            columns: columns.to_vec(),
            means,
            stds,
        })
    }

    /// Scale the fitted columns in place
    pub fn transform_inplace(&self, x: &mut Array2<f64>) -> Result<()> {
        if let Some(&max_col) = self.columns.iter().max() {
            if max_col >= x.ncols() {
                return Err(AutoMlError::ShapeError {
                    expected: format!("at least {} columns", max_col + 1),
                    actual: x.ncols().to_string(),
                });
            }
        }
        for (k, &col) in self.columns.iter().enumerate() {
            let (mean, std) = (self.means[k], self.stds[k]);
            x.column_mut(col).mapv_inplace(|v| (v - mean) / std);
        }
        Ok(())
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scales_selected_columns() {
        let mut x = array![[1.0, 10.0], [3.0, 20.0], [5.0, 30.0]];
        let scaler = StandardScaler::fit(&x, &[0], &[0, 1, 2]).unwrap();
        scaler.transform_inplace(&mut x).unwrap();

        let col: Vec<f64> = x.column(0).to_vec();
        assert!((col.iter().sum::<f64>()).abs() < 1e-12);
        assert_eq!(x[[1, 1]], 20.0);
    }

    #[test]
    fn test_constant_column() {
        let mut x = array![[2.0], [2.0]];
        let scaler = StandardScaler::fit(&x, &[0], &[0, 1]).unwrap();
        scaler.transform_inplace(&mut x).unwrap();
        assert_eq!(x[[0, 0]], 0.0);
    }

    #[test]
    fn test_fit_on_subset_of_rows() {
        let mut x = array![[0.0], [2.0], [100.0]];
        let scaler = StandardScaler::fit(&x, &[0], &[0, 1]).unwrap();
        assert_eq!(scaler.means(), &[1.0]);
        scaler.transform_inplace(&mut x).unwrap();
        assert_eq!(x[[2, 0]], 99.0);
    }
}
