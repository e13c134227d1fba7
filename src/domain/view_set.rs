//! Aggregation of encoded views into the P, Q and Omega matrices.

use crate::domain::error::LittermanError;
use crate::domain::universe::AssetUniverse;
use crate::domain::view::{encode_view, EncodedView, View, ViewOutcome};
use nalgebra::{DMatrix, DVector};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewMatrices {
    /// Selection matrix, views x assets.
    pub p: DMatrix<f64>,
    /// Targets, one per view.
    pub q: DVector<f64>,
    /// Diagonal view uncertainty, views x views.
    pub omega: DMatrix<f64>,
}

impl ViewMatrices {
    pub fn count(&self) -> usize {
        self.p.nrows()
    }
}

/// Either no usable views, or the stacked view matrices. There is no
/// zero-row matrix state.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewSet {
    Empty,
    Views(ViewMatrices),
}

impl ViewSet {
    pub fn is_empty(&self) -> bool {
        matches!(self, ViewSet::Empty)
    }

    pub fn count(&self) -> usize {
        match self {
            ViewSet::Empty => 0,
            ViewSet::Views(m) => m.count(),
        }
    }

    pub fn from_encoded(encoded: &[EncodedView], n_assets: usize) -> Self {
        if encoded.is_empty() {
            return ViewSet::Empty;
        }
        let k = encoded.len();
        let p = DMatrix::from_fn(k, n_assets, |i, j| encoded[i].row[j]);
        let q = DVector::from_iterator(k, encoded.iter().map(|v| v.target));
        let omega = DMatrix::from_diagonal(&DVector::from_iterator(
            k,
            encoded.iter().map(|v| v.uncertainty),
        ));
        ViewSet::Views(ViewMatrices { p, q, omega })
    }
}

pub fn aggregate_views(
    views: &[View],
    universe: &AssetUniverse,
    pi: &DVector<f64>,
) -> Result<ViewSet, LittermanError> {
    let mut encoded = Vec::with_capacity(views.len());
    for (i, view) in views.iter().enumerate() {
        match encode_view(view, universe, pi)? {
            ViewOutcome::Encoded(v) => encoded.push(v),
            ViewOutcome::Skip(reason) => {
                tracing::debug!(view = i, ?reason, "skipping view");
            }
        }
    }
    Ok(ViewSet::from_encoded(&encoded, universe.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn universe() -> AssetUniverse {
        AssetUniverse::new(vec!["A".into(), "B".into(), "C".into()]).unwrap()
    }

    fn pi() -> DVector<f64> {
        DVector::from_vec(vec![0.05, 0.07, 0.03])
    }

    #[test]
    fn no_views_is_empty() {
        assert_eq!(aggregate_views(&[], &universe(), &pi()).unwrap(), ViewSet::Empty);
    }

    #[test]
    fn only_noop_views_is_empty() {
        let views = vec![View::default(), View::on(""), View::on_list::<&str>(&[])];
        let set = aggregate_views(&views, &universe(), &pi()).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.count(), 0);
    }

    #[test]
    fn stacks_surviving_views() {
        let views = vec![
            View::on("A").with_excess_return(0.01).with_confidence(0.002),
            View::default(),
            View::on("B,C").with_confidence(0.005),
        ];
        let set = aggregate_views(&views, &universe(), &pi()).unwrap();
        let m = match set {
            ViewSet::Views(m) => m,
            ViewSet::Empty => panic!("expected views"),
        };
        assert_eq!(m.count(), 2);
        assert_eq!(m.p.shape(), (2, 3));
        assert_relative_eq!(m.p[(0, 0)], 1.0);
        assert_relative_eq!(m.p[(1, 1)], 0.5);
        assert_relative_eq!(m.p[(1, 2)], 0.5);
        assert_relative_eq!(m.q[0], 0.06, epsilon = 1e-15);
        assert_relative_eq!(m.q[1], 0.05, epsilon = 1e-15);
        assert_eq!(m.omega.shape(), (2, 2));
        assert_relative_eq!(m.omega[(0, 0)], 0.002);
        assert_relative_eq!(m.omega[(1, 1)], 0.005);
        assert_eq!(m.omega[(0, 1)], 0.0);
        assert_eq!(m.omega[(1, 0)], 0.0);
    }

    #[test]
    fn invalid_view_aborts_aggregation() {
        let views = vec![View::on("A"), View::on("Z")];
        assert!(matches!(
            aggregate_views(&views, &universe(), &pi()),
            Err(LittermanError::InvalidView { .. })
        ));
    }
}
