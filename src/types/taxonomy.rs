//! Diagnostic class taxonomy for skin-lesion classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of diagnostic classes the model predicts
pub const NUM_CLASSES: usize = 7;

/// Diagnostic class, in the index order of the model's output layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LesionClass {
    /// Actinic keratoses and intraepithelial carcinoma
    Akiec,
    /// Basal cell carcinoma
    Bcc,
    /// Benign keratosis-like lesions
    Bkl,
    /// Dermatofibroma
    Df,
    /// Melanoma
    Mel,
    /// Melanocytic nevi
    Nv,
    /// Vascular lesions
    Vasc,
}

impl LesionClass {
    /// All classes in model output order
    pub const ALL: [LesionClass; NUM_CLASSES] = [
        LesionClass::Akiec,
        LesionClass::Bcc,
        LesionClass::Bkl,
        LesionClass::Df,
        LesionClass::Mel,
        LesionClass::Nv,
        LesionClass::Vasc,
    ];

    /// Look up a class by its output index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Output index of this class
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short class code (e.g. "MEL")
    pub fn code(self) -> &'static str {
        match self {
            LesionClass::Akiec => "AKIEC",
            LesionClass::Bcc => "BCC",
            LesionClass::Bkl => "BKL",
            LesionClass::Df => "DF",
            LesionClass::Mel => "MEL",
            LesionClass::Nv => "NV",
            LesionClass::Vasc => "VASC",
        }
    }

    /// Long display name shown to users
    pub fn display_name(self) -> &'static str {
        match self {
            LesionClass::Akiec => "Actinic Keratoses and Intraepithelial Carcinoma (AKIEC)",
            LesionClass::Bcc => "Basal Cell Carcinoma (BCC)",
            LesionClass::Bkl => "Benign Keratosis-like Lesions (BKL)",
            LesionClass::Df => "Dermatofibroma (DF)",
            LesionClass::Mel => "Melanoma (MEL)",
            LesionClass::Nv => "Melanocytic Nevi (NV)",
            LesionClass::Vasc => "Vascular Lesions (VASC)",
        }
    }
}

impl fmt::Display for LesionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
