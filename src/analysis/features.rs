//! Node features and their plotting ranges

use super::histogram::linspace;

/// Reconstructed particle feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Px,
    Py,
    Pz,
    E,
}

impl Feature {
    /// All features in node-feature column order
    pub const ALL: [Feature; 4] = [Feature::Px, Feature::Py, Feature::Pz, Feature::E];

    /// Column of this feature in the node feature matrix
    pub fn index(self) -> usize {
        match self {
            Feature::Px => 0,
            Feature::Py => 1,
            Feature::Pz => 2,
            Feature::E => 3,
        }
    }

    /// Short name used in file names
    pub fn short_name(self) -> &'static str {
        match self {
            Feature::Px => "px",
            Feature::Py => "py",
            Feature::Pz => "pz",
            Feature::E => "e",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Feature::Px => "p_x",
            Feature::Py => "p_y",
            Feature::Pz => "p_z",
            Feature::E => "E",
        }
    }

    /// Axis label of the distribution plot
    pub fn label(self) -> String {
        format!("{} [GeV]", self.symbol())
    }

    /// Axis label of the relative-difference plot
    pub fn diff_label(self) -> String {
        let s = self.symbol();
        format!("({}^reco - {}^true)/{}^true", s, s, s)
    }

    /// Bin edges for the input/output distributions
    pub fn value_bins(self) -> Vec<f64> {
        match self {
            Feature::E => linspace(-5.0, 35.0, 101),
            _ => linspace(-20.0, 20.0, 101),
        }
    }

    /// Bin edges for the relative difference
    pub fn diff_bins(self) -> Vec<f64> {
        linspace(-2.0, 2.0, 101)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}
