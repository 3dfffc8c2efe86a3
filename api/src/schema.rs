use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, AppResult};

/// Declared bounds of one numeric form field.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub step: f64,
    pub integral: bool,
}

impl FieldSpec {
    const fn int(name: &'static str, label: &'static str, min: f64, max: f64, default: f64) -> Self {
        FieldSpec {
            name,
            label,
            min,
            max,
            default,
            step: 1.0,
            integral: true,
        }
    }

    const fn float(
        name: &'static str,
        label: &'static str,
        min: f64,
        max: f64,
        default: f64,
        step: f64,
    ) -> Self {
        FieldSpec {
            name,
            label,
            min,
            max,
            default,
            step,
            integral: false,
        }
    }

    /// Missing or NaN input falls back to the default; infinities clamp.
    pub fn accept(&self, value: Option<f64>) -> f64 {
        let value = match value {
            Some(v) if !v.is_nan() => v,
            _ => self.default,
        };
        let value = if self.integral { value.round() } else { value };
        value.clamp(self.min, self.max)
    }
}

pub const ACCOMMODATES: FieldSpec = FieldSpec::int("accommodates", "Capacidad (accommodates)", 1.0, 16.0, 2.0);
pub const BEDROOMS: FieldSpec = FieldSpec::int("bedrooms", "Dormitorios (bedrooms)", 0.0, 10.0, 1.0);
pub const BEDS: FieldSpec = FieldSpec::int("beds", "Camas (beds)", 0.0, 16.0, 1.0);
pub const BATHROOMS: FieldSpec = FieldSpec::float("bathrooms", "Baños (bathrooms)", 0.0, 5.0, 1.0, 0.5);
pub const AVAILABILITY_365: FieldSpec = FieldSpec::int(
    "availability_365",
    "Disponibilidad anual (availability_365)",
    1.0,
    365.0,
    180.0,
);
pub const REVIEW_SCORES_RATING: FieldSpec = FieldSpec::float(
    "review_scores_rating",
    "Puntaje de reviews (review_scores_rating)",
    1.0,
    5.0,
    4.5,
    0.1,
);
pub const REVIEWS_PER_MONTH: FieldSpec = FieldSpec::float(
    "reviews_per_month",
    "Reviews por mes (reviews_per_month)",
    0.0,
    15.0,
    1.0,
    0.1,
);
pub const DIST_OBELISCO_KM: FieldSpec = FieldSpec::float(
    "dist_obelisco_km",
    "Distancia al Obelisco (km)",
    0.0,
    30.0,
    5.0,
    0.1,
);
pub const NUMBER_OF_REVIEWS: FieldSpec =
    FieldSpec::int("number_of_reviews", "Número total de reviews", 0.0, 5000.0, 10.0);

/// Numeric fields in the order they are shown on the form.
pub const NUMERIC_FIELDS: [FieldSpec; 9] = [
    ACCOMMODATES,
    BEDROOMS,
    BEDS,
    BATHROOMS,
    AVAILABILITY_365,
    REVIEW_SCORES_RATING,
    REVIEWS_PER_MONTH,
    DIST_OBELISCO_KM,
    NUMBER_OF_REVIEWS,
];

pub const BARRIO_LABEL: &str = "Barrio";

/// Raw submission, from either the HTML form or the JSON API.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct PredictionRequest {
    #[serde(default, deserialize_with = "lenient_number")]
    pub accommodates: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub bedrooms: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub beds: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub bathrooms: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub availability_365: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub review_scores_rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub reviews_per_month: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub dist_obelisco_km: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub number_of_reviews: Option<f64>,
    #[serde(default)]
    pub barrio: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

// Form posts send every value as text; blank means "use the default".
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(value)) => Ok(Some(value)),
        Some(NumberOrText::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<f64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("'{text}' is not a number")))
        }
    }
}

/// Current form values, every number inside its declared bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormValues {
    pub accommodates: u32,
    pub bedrooms: u32,
    pub beds: u32,
    pub bathrooms: f64,
    pub availability_365: u32,
    pub review_scores_rating: f64,
    pub reviews_per_month: f64,
    pub dist_obelisco_km: f64,
    pub number_of_reviews: u32,
    pub barrio: String,
}

impl Default for FormValues {
    fn default() -> Self {
        FormValues::from_request(&PredictionRequest::default())
    }
}

impl FormValues {
    pub fn from_request(request: &PredictionRequest) -> Self {
        FormValues {
            accommodates: ACCOMMODATES.accept(request.accommodates) as u32,
            bedrooms: BEDROOMS.accept(request.bedrooms) as u32,
            beds: BEDS.accept(request.beds) as u32,
            bathrooms: BATHROOMS.accept(request.bathrooms),
            availability_365: AVAILABILITY_365.accept(request.availability_365) as u32,
            review_scores_rating: REVIEW_SCORES_RATING.accept(request.review_scores_rating),
            reviews_per_month: REVIEWS_PER_MONTH.accept(request.reviews_per_month),
            dist_obelisco_km: DIST_OBELISCO_KM.accept(request.dist_obelisco_km),
            number_of_reviews: NUMBER_OF_REVIEWS.accept(request.number_of_reviews) as u32,
            barrio: request.barrio.clone().unwrap_or_default(),
        }
    }

    /// Value of a numeric field by name, used to pre-fill the form.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        let value = match name {
            "accommodates" => self.accommodates as f64,
            "bedrooms" => self.bedrooms as f64,
            "beds" => self.beds as f64,
            "bathrooms" => self.bathrooms,
            "availability_365" => self.availability_365 as f64,
            "review_scores_rating" => self.review_scores_rating,
            "reviews_per_month" => self.reviews_per_month,
            "dist_obelisco_km" => self.dist_obelisco_km,
            "number_of_reviews" => self.number_of_reviews as f64,
            _ => return None,
        };
        Some(value)
    }

    pub fn barrio_is_blank(&self) -> bool {
        self.barrio.trim().is_empty()
    }

    /// Gate in front of the predict action.
    pub fn validate(&self) -> AppResult<()> {
        if self.barrio_is_blank() {
            return Err(AppError::validation("barrio is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let values = FormValues::default();
        assert_eq!(values.accommodates, 2);
        assert_eq!(values.bedrooms, 1);
        assert_eq!(values.beds, 1);
        assert_eq!(values.bathrooms, 1.0);
        assert_eq!(values.availability_365, 180);
        assert_eq!(values.review_scores_rating, 4.5);
        assert_eq!(values.reviews_per_month, 1.0);
        assert_eq!(values.dist_obelisco_km, 5.0);
        assert_eq!(values.number_of_reviews, 10);
        assert_eq!(values.barrio, "");
    }

    #[test]
    fn test_values_are_clamped_to_bounds() {
        let inputs = [-1e9, -1.0, 0.0, 0.49, 2.5, 17.0, 365.5, 1e9, f64::NAN, f64::INFINITY];
        for spec in NUMERIC_FIELDS {
            for input in inputs {
                let value = spec.accept(Some(input));
                assert!(
                    value >= spec.min && value <= spec.max,
                    "{} accepted {value} for input {input}",
                    spec.name
                );
                if spec.integral {
                    assert_eq!(value.fract(), 0.0);
                }
            }
        }
    }

    #[test]
    fn test_infinite_values_clamp_instead_of_defaulting() {
        assert_eq!(BATHROOMS.accept(Some(f64::INFINITY)), BATHROOMS.max);
        assert_eq!(BATHROOMS.accept(Some(f64::NEG_INFINITY)), BATHROOMS.min);
        assert_eq!(ACCOMMODATES.accept(Some(f64::INFINITY)), 16.0);
        assert_eq!(BATHROOMS.accept(Some(f64::NAN)), BATHROOMS.default);

        // "1e400" overflows to infinity when parsed
        let request: PredictionRequest =
            serde_json::from_str(r#"{"accommodates": "1e400", "bathrooms": "-1e400"}"#).unwrap();
        let values = FormValues::from_request(&request);
        assert_eq!(values.accommodates, 16);
        assert_eq!(values.bathrooms, 0.0);
    }

    #[test]
    fn test_out_of_range_request() {
        let request = PredictionRequest {
            accommodates: Some(40.0),
            bedrooms: Some(-3.0),
            review_scores_rating: Some(90.0),
            ..Default::default()
        };
        let values = FormValues::from_request(&request);
        assert_eq!(values.accommodates, 16);
        assert_eq!(values.bedrooms, 0);
        assert_eq!(values.review_scores_rating, 5.0);
    }

    #[test]
    fn test_blank_barrio_fails_validation() {
        for barrio in ["", "   ", "\t\n"] {
            let request = PredictionRequest {
                barrio: Some(barrio.to_string()),
                ..Default::default()
            };
            let err = FormValues::from_request(&request).validate().unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[test]
    fn test_barrio_is_kept_verbatim() {
        let request = PredictionRequest {
            barrio: Some(" Palermo ".to_string()),
            ..Default::default()
        };
        let values = FormValues::from_request(&request);
        assert!(values.validate().is_ok());
        assert_eq!(values.barrio, " Palermo ");
    }

    #[test]
    fn test_json_accepts_numbers_and_text() {
        let request: PredictionRequest = serde_json::from_str(
            r#"{"accommodates": 3, "bathrooms": "1.5", "beds": "", "barrio": "Palermo"}"#,
        )
        .unwrap();
        assert_eq!(request.accommodates, Some(3.0));
        assert_eq!(request.bathrooms, Some(1.5));
        assert_eq!(request.beds, None);
        assert_eq!(request.bedrooms, None);
    }

    #[test]
    fn test_non_numeric_text_is_rejected() {
        let result = serde_json::from_str::<PredictionRequest>(r#"{"beds": "many"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_lookup() {
        let values = FormValues::default();
        assert_eq!(values.numeric("availability_365"), Some(180.0));
        assert_eq!(values.numeric("barrio"), None);
    }
}
