//! Principal component analysis of point clouds

use std::cmp::Ordering;

use nalgebra::SymmetricEigen;

use crate::foundation::math::{any_perpendicular, centroid, Mat3, Point3, Vec3, EPSILON};

/// Mean and principal directions of a point cloud
#[derive(Debug, Clone, Copy)]
pub struct PrincipalAxes {
    /// Mean of the points
    pub mean: Point3,
    /// Orthonormal right-handed axes sorted by decreasing variance
    pub axes: [Vec3; 3],
    /// Variance along each axis
    pub variances: [f64; 3],
}

/// Compute the principal axes of `points`, `None` for an empty input
pub fn principal_axes(points: &[Point3]) -> Option<PrincipalAxes> {
    let mean = centroid(points)?;

    let mut covariance = Mat3::zeros();
    for p in points {
        let d = p - mean;
        covariance += d * d.transpose();
    }
    if points.len() > 1 {
        covariance /= (points.len() - 1) as f64;
    }

    let eigen = SymmetricEigen::new(covariance);
    let mut order = [0_usize, 1, 2];
    order.sort_by(|&i, &j| {
        eigen.eigenvalues[j]
            .partial_cmp(&eigen.eigenvalues[i])
            .unwrap_or(Ordering::Equal)
    });

    let xaxis = eigen
        .eigenvectors
        .column(order[0])
        .into_owned()
        .try_normalize(EPSILON)
        .unwrap_or_else(Vec3::x);
    let candidate = eigen.eigenvectors.column(order[1]).into_owned();
    let yaxis = (candidate - xaxis * xaxis.dot(&candidate))
        .try_normalize(EPSILON)
        .unwrap_or_else(|| any_perpendicular(&xaxis));
    let zaxis = xaxis.cross(&yaxis);

    Some(PrincipalAxes {
        mean,
        axes: [xaxis, yaxis, zaxis],
        variances: [
            eigen.eigenvalues[order[0]].max(0.0),
            eigen.eigenvalues[order[1]].max(0.0),
            eigen.eigenvalues[order[2]].max(0.0),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_major_axis_follows_spread() {
        let points: Vec<Point3> = (0..20)
            .map(|i| {
                let t = f64::from(i);
                Point3::new(t, t, 0.1 * (t * 1.7).sin())
            })
            .collect();
        let pca = principal_axes(&points).unwrap();
        let diagonal = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert_relative_eq!(pca.axes[0].dot(&diagonal).abs(), 1.0, epsilon = 1e-3);
        assert!(pca.variances[0] >= pca.variances[1]);
        assert!(pca.variances[1] >= pca.variances[2]);
    }

    #[test]
    fn test_axes_are_orthonormal_and_right_handed() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.2, 0.1),
            Point3::new(0.5, 2.0, -0.3),
            Point3::new(1.0, 1.0, 1.0),
        ];
        let pca = principal_axes(&points).unwrap();
        let [x, y, z] = pca.axes;
        assert_relative_eq!(x.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(y.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(x.dot(&y), 0.0, epsilon = 1e-12);
        assert_relative_eq!(x.cross(&y), z, epsilon = 1e-12);
    }

    #[test]
    fn test_single_point() {
        let pca = principal_axes(&[Point3::new(1.0, 2.0, 3.0)]).unwrap();
        assert_eq!(pca.mean, Point3::new(1.0, 2.0, 3.0));
        assert!(principal_axes(&[]).is_none());
    }
}
