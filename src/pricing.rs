//! Material catalog and the wall-print price formula.
//!
//! `total = round(width * height * price_per_sqm + BASE_FEE)`. The same
//! numbers feed the calculator endpoint and the assistant's persona, so the
//! two can never quote differently.

use crate::locale::Locale;
use serde::Serialize;
use thiserror::Error;

/// Fixed processing fee added to every order, in USD.
pub const BASE_FEE: f64 = 50.0;

/// Smallest wall side the calculator accepts, in meters.
pub const MIN_SIDE_M: f64 = 0.5;

/// Largest wall side the calculator accepts, in meters.
pub const MAX_SIDE_M: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub id: &'static str,
    pub price_per_sqm: f64,
    name_en: &'static str,
    name_ru: &'static str,
    description_en: &'static str,
    description_ru: &'static str,
}

impl Material {
    pub fn name(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => self.name_en,
            Locale::Ru => self.name_ru,
        }
    }

    pub fn description(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => self.description_en,
            Locale::Ru => self.description_ru,
        }
    }
}

pub static MATERIALS: [Material; 4] = [
    Material {
        id: "canvas",
        price_per_sqm: 45.0,
        name_en: "Premium Canvas",
        name_ru: "Премиум Холст",
        description_en: "High-quality textured cotton canvas, perfect for artistic reproductions.",
        description_ru: "Высококачественный текстурный хлопковый холст, идеален для художественных репродукций.",
    },
    Material {
        id: "vinyl",
        price_per_sqm: 30.0,
        name_en: "Self-Adhesive Vinyl",
        name_ru: "Самоклеящийся Винил",
        description_en: "Durable and washable material, ideal for modern interiors and commercial spaces.",
        description_ru: "Прочный и моющийся материал, идеален для современных интерьеров и коммерческих помещений.",
    },
    Material {
        id: "fresco",
        price_per_sqm: 65.0,
        name_en: "Digital Fresco",
        name_ru: "Цифровая Фреска",
        description_en: "Plaster-effect material that mimics traditional wall painting techniques.",
        description_ru: "Материал с эффектом штукатурки, имитирующий традиционную роспись стен.",
    },
    Material {
        id: "non-woven",
        price_per_sqm: 35.0,
        name_en: "Non-Woven Wallpaper",
        name_ru: "Флизелиновые Обои",
        description_en: "Eco-friendly breathable material, easy to apply and remove.",
        description_ru: "Экологичный дышащий материал, легко наносится и снимается.",
    },
];

pub fn find_material(id: &str) -> Option<&'static Material> {
    MATERIALS.iter().find(|m| m.id.eq_ignore_ascii_case(id.trim()))
}

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("Unknown material: '{0}'")]
    UnknownMaterial(String),
    #[error("Invalid {side}: {value} (must be between {min} and {max} m)")]
    InvalidDimension {
        side: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub material: &'static str,
    pub area: f64,
    pub material_cost: f64,
    pub base_fee: f64,
    pub total: f64,
}

fn check_side(side: &'static str, value: f64) -> Result<f64, PricingError> {
    if !value.is_finite() || !(MIN_SIDE_M..=MAX_SIDE_M).contains(&value) {
        return Err(PricingError::InvalidDimension {
            side,
            value,
            min: MIN_SIDE_M,
            max: MAX_SIDE_M,
        });
    }
    Ok(value)
}

/// Raw formula, no validation: `width * height * rate + BASE_FEE`, rounded.
pub fn total_cost(width: f64, height: f64, price_per_sqm: f64) -> f64 {
    (width * height * price_per_sqm + BASE_FEE).round()
}

pub fn estimate(width: f64, height: f64, material_id: &str) -> Result<Quote, PricingError> {
    let width = check_side("width", width)?;
    let height = check_side("height", height)?;
    let material = find_material(material_id).ok_or_else(||
        PricingError::UnknownMaterial(material_id.to_string())
    )?;

    let area = width * height;
    let material_cost = area * material.price_per_sqm;
    Ok(Quote {
        material: material.id,
        area,
        material_cost,
        base_fee: BASE_FEE,
        total: total_cost(width, height, material.price_per_sqm),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_by_three_canvas_is_320() {
        assert_eq!(total_cost(2.0, 3.0, 45.0), 320.0);
        let quote = estimate(2.0, 3.0, "canvas").unwrap();
        assert_eq!(quote.total, 320.0);
        assert_eq!(quote.area, 6.0);
        assert_eq!(quote.material_cost, 270.0);
    }

    #[test]
    fn rounds_to_whole_dollars() {
        // 2.5 * 2.5 * 30 = 187.5, + 50 = 237.5
        assert_eq!(estimate(2.5, 2.5, "vinyl").unwrap().total, 238.0);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            estimate(2.0, 3.0, "marble"),
            Err(PricingError::UnknownMaterial("marble".into()))
        );
        assert!(matches!(
            estimate(0.1, 3.0, "canvas"),
            Err(PricingError::InvalidDimension { side: "width", .. })
        ));
        assert!(estimate(2.0, f64::NAN, "canvas").is_err());
    }

    #[test]
    fn huge_walls_are_rejected_instead_of_overflowing() {
        assert!(matches!(
            estimate(1e200, 1e200, "canvas"),
            Err(PricingError::InvalidDimension { side: "width", .. })
        ));
        assert!(matches!(
            estimate(2.0, 100.5, "canvas"),
            Err(PricingError::InvalidDimension { side: "height", .. })
        ));
        let largest = estimate(MAX_SIDE_M, MAX_SIDE_M, "fresco").unwrap();
        assert!(largest.total.is_finite());
    }

    #[test]
    fn material_lookup_ignores_case() {
        assert_eq!(find_material("Fresco").map(|m| m.price_per_sqm), Some(65.0));
        assert_eq!(find_material("NON-WOVEN").map(|m| m.name(Locale::Ru)), Some("Флизелиновые Обои"));
    }
}
