//! Turns loaded datasets into storm and track records.

pub mod ecmwf;
pub mod ibtracs;
pub mod nhc;

use crate::{
    model::{QuadrantRadii, TrackPoint},
    reading::Quadrant,
};

/// Wind thresholds carrying quadrant radii.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    Kt34,
    Kt50,
    Kt64,
}

impl Threshold {
    pub fn from_knots(knots: u32) -> Option<Self> {
        match knots {
            34 => Some(Threshold::Kt34),
            50 => Some(Threshold::Kt50),
            64 => Some(Threshold::Kt64),
            _ => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            Threshold::Kt34 => 0,
            Threshold::Kt50 => 1,
            Threshold::Kt64 => 2,
        }
    }
}

/// Quadrant radii of one point, pivoted from long-format rows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindRadii {
    slots: [QuadrantRadii; 3],
}

impl WindRadii {
    pub fn set(&mut self, threshold: Threshold, quadrant: Quadrant, value: Option<f64>) {
        if value.is_some() {
            self.slots[threshold.index()][quadrant.index()] = value;
        }
    }

    pub fn set_all(&mut self, threshold: Threshold, radii: QuadrantRadii) {
        for quadrant in Quadrant::ALL {
            self.set(threshold, quadrant, radii[quadrant.index()]);
        }
    }

    /// `None` when no quadrant has a value for the threshold.
    pub fn get(&self, threshold: Threshold) -> Option<QuadrantRadii> {
        let radii = self.slots[threshold.index()];
        radii.iter().any(Option::is_some).then_some(radii)
    }

    pub fn apply(&self, point: &mut TrackPoint) {
        point.quadrant_radius_34 = self.get(Threshold::Kt34);
        point.quadrant_radius_50 = self.get(Threshold::Kt50);
        point.quadrant_radius_64 = self.get(Threshold::Kt64);
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_pivot_missing_quadrant_to_null_slot() {
        let mut radii = WindRadii::default();

        radii.set(Threshold::Kt34, Quadrant::NE, Some(10.0));
        radii.set(Threshold::Kt34, Quadrant::SE, Some(20.0));
        radii.set(Threshold::Kt34, Quadrant::NW, Some(40.0));

        assert_eq!(
            radii.get(Threshold::Kt34),
            Some([Some(10.0), Some(20.0), None, Some(40.0)])
        );
        assert_eq!(radii.get(Threshold::Kt50), None);
    }

    #[test]
    fn should_map_only_known_thresholds() {
        assert_eq!(Threshold::from_knots(50), Some(Threshold::Kt50));
        assert_eq!(Threshold::from_knots(0), None);
        assert_eq!(Threshold::from_knots(35), None);
    }
}
