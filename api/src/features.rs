use serde::Serialize;

use crate::encoder::Encoded;
use crate::error::{AppError, AppResult};
use crate::schema::FormValues;

// training column order; to_vector is the only positional layout
pub const FEATURES: [&str; 10] = [
    "accommodates",
    "bedrooms",
    "beds",
    "bathrooms",
    "availability_365",
    "review_scores_rating",
    "reviews_per_month",
    "dist_obelisco_km",
    "number_of_reviews",
    "barrio_encoded",
];

pub fn matches_schema(names: &[String]) -> bool {
    names.iter().map(String::as_str).eq(FEATURES)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureRow {
    pub accommodates: u32,
    pub bedrooms: u32,
    pub beds: u32,
    pub bathrooms: f64,
    pub availability_365: u32,
    pub review_scores_rating: f64,
    pub reviews_per_month: f64,
    pub dist_obelisco_km: f64,
    pub number_of_reviews: u32,
    pub barrio_encoded: i64,
}

impl FeatureRow {
    pub fn to_vector(&self) -> [f64; FEATURES.len()] {
        [
            self.accommodates as f64,
            self.bedrooms as f64,
            self.beds as f64,
            self.bathrooms,
            self.availability_365 as f64,
            self.review_scores_rating,
            self.reviews_per_month,
            self.dist_obelisco_km,
            self.number_of_reviews as f64,
            self.barrio_encoded as f64,
        ]
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURES.into_iter().zip(self.to_vector())
    }
}

/// `encoded` is `None` until a non-blank neighborhood went through the encoder.
pub fn assemble(values: &FormValues, encoded: Option<Encoded>) -> AppResult<FeatureRow> {
    let encoded =
        encoded.ok_or_else(|| AppError::validation("barrio must be encoded before assembling"))?;

    Ok(FeatureRow {
        accommodates: values.accommodates,
        bedrooms: values.bedrooms,
        beds: values.beds,
        bathrooms: values.bathrooms,
        availability_365: values.availability_365,
        review_scores_rating: values.review_scores_rating,
        reviews_per_month: values.reviews_per_month,
        dist_obelisco_km: values.dist_obelisco_km,
        number_of_reviews: values.number_of_reviews,
        barrio_encoded: encoded.code(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PredictionRequest;

    fn values(barrio: &str) -> FormValues {
        FormValues::from_request(&PredictionRequest {
            barrio: Some(barrio.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_entries_follow_feature_order() {
        let extremes = [
            PredictionRequest::default(),
            PredictionRequest {
                accommodates: Some(16.0),
                bathrooms: Some(5.0),
                number_of_reviews: Some(5000.0),
                ..Default::default()
            },
        ];
        for request in extremes {
            let values = FormValues::from_request(&request);
            for encoded in [Encoded::Known(3), Encoded::Unknown] {
                let row = assemble(&values, Some(encoded)).unwrap();
                let names: Vec<_> = row.entries().map(|(name, _)| name).collect();
                assert_eq!(names, FEATURES);
            }
        }
    }

    #[test]
    fn test_known_category() {
        let row = assemble(&values("Palermo"), Some(Encoded::Known(3))).unwrap();
        assert_eq!(row.barrio_encoded, 3);
        assert_eq!(
            row.to_vector(),
            [2.0, 1.0, 1.0, 1.0, 180.0, 4.5, 1.0, 5.0, 10.0, 3.0]
        );
    }

    #[test]
    fn test_unknown_category_uses_sentinel() {
        let row = assemble(&values("Marte"), Some(Encoded::Unknown)).unwrap();
        assert_eq!(row.barrio_encoded, -1);
        assert_eq!(row.to_vector()[9], -1.0);
    }

    #[test]
    fn test_missing_category_is_rejected() {
        let err = assemble(&values(""), None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_matches_schema() {
        let names: Vec<String> = FEATURES.iter().map(|name| name.to_string()).collect();
        assert!(matches_schema(&names));

        let mut swapped = names.clone();
        swapped.swap(0, 1);
        assert!(!matches_schema(&swapped));
        assert!(!matches_schema(&names[..9]));
    }
}
